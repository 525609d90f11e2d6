use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    collect_pages, decode_records, warn_truncated, Label, Provider, RawRecord, MAX_PAGES, PER_PAGE,
};
use crate::error::Result as NormalizeResult;
use crate::model::work_item::{SourceKind, WorkItem};
use crate::normalize::{record_timestamp, resolve_assignees, url_to_ref};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const REF_MARKERS: &[&str] = &["/issues/", "/pull/"];

pub struct GitHubProvider {
    name: String,
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubProvider {
    pub fn new(name: String, api_base: Option<String>, token: String, client: reqwest::Client) -> Self {
        let api_base = api_base
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            name,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.api_base);
        self.client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("GitHub request to {path} failed"))?
            .error_for_status()
            .with_context(|| format!("GitHub rejected {path}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse GitHub response for {path}"))
    }

    /// Follow `page=` until a short page comes back.
    async fn get_pages<T, F>(&self, path: &str, extract: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(serde_json::Value) -> Result<Vec<T>>,
    {
        let sep = if path.contains('?') { '&' } else { '?' };
        let extract = &extract;
        let (all, truncated) = collect_pages(MAX_PAGES, PER_PAGE, move |page| {
            let url = format!("{path}{sep}per_page={PER_PAGE}&page={page}");
            async move { extract(self.get_json::<serde_json::Value>(&url).await?) }
        })
        .await?;
        if truncated {
            warn_truncated(&self.name, path, all.len());
        }
        Ok(all)
    }
}

/// Issue or pull request as returned by the issues and search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GhIssue {
    pub id: u64,
    pub title: String,
    pub html_url: String,
    pub updated_at: String,
    pub assignees: Option<Vec<GhUser>>,
    pub labels: Option<Vec<GhLabel>>,
    pub milestone: Option<GhMilestone>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhLabel {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhMilestone {
    pub title: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CreatedIssue {
    html_url: String,
}

pub fn normalize(issue: &GhIssue, me: &str) -> NormalizeResult<WorkItem> {
    let id = format!("github-{}", issue.id);
    let updated_at = record_timestamp(&id, &issue.updated_at)?;

    let mut item = WorkItem::new(id, SourceKind::GitHub, issue.title.clone(), updated_at);
    item.assignee_users = resolve_assignees(
        issue.assignees.iter().flatten().map(|u| u.login.clone()),
        me,
    );
    item.labels = issue.labels.iter().flatten().map(|l| l.name.clone()).collect();
    item.milestone_title = issue
        .milestone
        .as_ref()
        .map(|m| m.title.clone())
        .unwrap_or_default();
    // The issue payload only links to pull request details; the URL tells us
    // without another request.
    item.pull = issue.html_url.contains("/pull/");
    item.reference = url_to_ref(&issue.html_url, REF_MARKERS);
    item.web_url = issue.html_url.clone();
    Ok(item)
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::GitHub
    }

    async fn current_user(&self) -> Result<String> {
        let user: GhUser = self.get_json("/user").await?;
        Ok(user.login)
    }

    async fn fetch_assigned(&self, _user: &str) -> Result<Vec<RawRecord>> {
        let issues = self
            .get_pages("/issues?filter=assigned&state=open", |value| {
                serde_json::from_value::<Vec<serde_json::Value>>(value)
                    .context("Failed to parse GitHub issues")
            })
            .await?;
        Ok(decode_records(issues, "github", RawRecord::GitHub))
    }

    async fn fetch_review_requests(&self, user: &str) -> Result<Vec<RawRecord>> {
        let query = format!("is:open is:pr archived:false review-requested:{user}");
        let path = format!("/search/issues?q={}", urlencoding::encode(&query));
        let issues = self
            .get_pages(&path, |value| {
                serde_json::from_value::<SearchResponse>(value)
                    .map(|r| r.items)
                    .context("Failed to parse GitHub search results")
            })
            .await?;
        Ok(decode_records(issues, "github", RawRecord::GitHub))
    }

    async fn list_labels(&self, repo: &str) -> Result<Option<Vec<Label>>> {
        let labels = self
            .get_pages(&format!("/repos/{repo}/labels"), |value| {
                serde_json::from_value::<Vec<GhLabel>>(value).context("Failed to parse GitHub labels")
            })
            .await?;
        Ok(Some(
            labels
                .into_iter()
                .map(|l| Label {
                    name: l.name,
                    color: l.color.map(|c| format!("#{c}")).unwrap_or_default(),
                })
                .collect(),
        ))
    }

    async fn create_item(&self, repo: &str, title: &str, labels: &[String]) -> Result<Option<String>> {
        let login = self.current_user().await?;
        let body = serde_json::json!({
            "title": title,
            "labels": labels,
            "assignees": [login],
        });
        let created: CreatedIssue = self
            .client
            .post(format!("{}/repos/{repo}/issues", self.api_base))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .context("GitHub issue creation failed")?
            .error_for_status()
            .context("GitHub rejected issue creation")?
            .json()
            .await
            .context("Failed to parse created GitHub issue")?;
        Ok(Some(created.html_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(json: &str) -> GhIssue {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn normalizes_assigned_issue() {
        let raw = issue(
            r#"{
                "id": 1001,
                "title": "Crash on start",
                "html_url": "https://github.com/org/repo/issues/42",
                "updated_at": "2024-05-01T10:00:00Z",
                "assignees": [{"login": "me"}, {"login": "bob"}],
                "labels": [{"name": "bug", "color": "d73a4a"}],
                "milestone": {"title": "v1.0"}
            }"#,
        );
        let item = normalize(&raw, "me").unwrap();
        assert_eq!(item.id, "github-1001");
        assert_eq!(item.source, SourceKind::GitHub);
        assert_eq!(item.assignee_users, "Me, bob");
        assert_eq!(item.labels, ["bug"]);
        assert_eq!(item.milestone_title, "v1.0");
        assert_eq!(item.reference, "org/repo#42");
        assert!(!item.pull);
        assert_eq!(item.epic_title, "");
        assert_eq!(item.due_date, "");
    }

    #[test]
    fn pull_requests_are_detected_from_url() {
        let raw = issue(
            r#"{
                "id": 7,
                "title": "Add feature",
                "html_url": "https://github.com/org/repo/pull/8",
                "updated_at": "2024-05-01T10:00:00Z",
                "assignees": [{"login": "me"}],
                "labels": [],
                "milestone": null
            }"#,
        );
        let item = normalize(&raw, "me").unwrap();
        assert!(item.pull);
        assert_eq!(item.reference, "org/repo#8");
        assert_eq!(item.assignee_users, "");
        assert_eq!(item.milestone_title, "");
    }

    #[test]
    fn null_lists_are_empty() {
        let raw = issue(
            r#"{"id": 1, "title": "t", "html_url": "https://github.com/o/r/issues/1",
                "updated_at": "2024-05-01T10:00:00Z", "assignees": null, "labels": null}"#,
        );
        let item = normalize(&raw, "me").unwrap();
        assert!(item.labels.is_empty());
        assert_eq!(item.assignee_users, "");
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let raw = issue(
            r#"{"id": 1, "title": "t", "html_url": "https://github.com/o/r/issues/1",
                "updated_at": "last tuesday"}"#,
        );
        assert!(normalize(&raw, "me").is_err());
    }

    #[test]
    fn api_base_defaults_and_trims() {
        let p = GitHubProvider::new("gh".into(), None, "t".into(), reqwest::Client::new());
        assert_eq!(p.api_base, DEFAULT_API_BASE);
        let p = GitHubProvider::new(
            "ghe".into(),
            Some("https://ghe.example.com/api/v3/".into()),
            "t".into(),
            reqwest::Client::new(),
        );
        assert_eq!(p.api_base, "https://ghe.example.com/api/v3");
    }
}
