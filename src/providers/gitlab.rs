use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    collect_pages, decode_records, warn_truncated, Label, Provider, RawRecord, MAX_PAGES, PER_PAGE,
};
use crate::error::Result as NormalizeResult;
use crate::model::work_item::{SourceKind, WorkItem};
use crate::normalize::{due_date, record_timestamp, resolve_assignees, url_to_ref};

const REF_MARKERS: &[&str] = &["/-/issues/", "/-/merge_requests/"];

pub struct GitLabProvider {
    name: String,
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl GitLabProvider {
    pub fn new(name: String, url: String, token: String, client: reqwest::Client) -> Self {
        Self {
            name,
            api_base: format!("{}/api/v4", url.trim_end_matches('/')),
            token,
            client,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.client
            .get(format!("{}{path}", self.api_base))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .with_context(|| format!("GitLab request to {path} failed"))?
            .error_for_status()
            .with_context(|| format!("GitLab rejected {path}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse GitLab response for {path}"))
    }

    async fn get_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        let (all, truncated) = collect_pages(MAX_PAGES, PER_PAGE, move |page| {
            let url = format!("{path}{sep}per_page={PER_PAGE}&page={page}");
            async move { self.get_json::<Vec<T>>(&url).await }
        })
        .await?;
        if truncated {
            warn_truncated(&self.name, path, all.len());
        }
        Ok(all)
    }

    async fn me(&self) -> Result<GlUser> {
        self.get_json("/user").await
    }
}

/// Issue or merge request as returned by the v4 API.
#[derive(Debug, Clone, Deserialize)]
pub struct GlRecord {
    pub id: u64,
    pub title: String,
    pub web_url: String,
    pub updated_at: String,
    pub assignees: Option<Vec<GlUser>>,
    pub labels: Option<Vec<String>>,
    pub milestone: Option<GlTitled>,
    pub epic: Option<GlTitled>,
    pub due_date: Option<String>,
    /// Only merge requests carry a merge status.
    pub merge_status: Option<String>,
}

impl GlRecord {
    pub fn is_merge_request(&self) -> bool {
        self.merge_status.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlUser {
    #[serde(default)]
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlTitled {
    pub title: String,
}

#[derive(Deserialize)]
struct GlLabel {
    name: String,
    #[serde(default)]
    color: String,
}

#[derive(Deserialize)]
struct CreatedIssue {
    web_url: String,
}

pub fn normalize(record: &GlRecord, me: &str) -> NormalizeResult<WorkItem> {
    // Issues and merge requests are numbered independently.
    let id = if record.is_merge_request() {
        format!("gitlab-mr-{}", record.id)
    } else {
        format!("gitlab-{}", record.id)
    };
    let updated_at = record_timestamp(&id, &record.updated_at)?;
    let due = due_date(&id, record.due_date.as_deref())?;

    let mut item = WorkItem::new(id, SourceKind::GitLab, record.title.clone(), updated_at);
    item.assignee_users = resolve_assignees(
        record.assignees.iter().flatten().map(|u| u.username.clone()),
        me,
    );
    item.labels = record.labels.clone().unwrap_or_default();
    item.milestone_title = record.milestone.as_ref().map(|m| m.title.clone()).unwrap_or_default();
    item.epic_title = record.epic.as_ref().map(|e| e.title.clone()).unwrap_or_default();
    item.due_date = due;
    item.pull = record.is_merge_request();
    item.reference = url_to_ref(&record.web_url, REF_MARKERS);
    item.web_url = record.web_url.clone();
    Ok(item)
}

#[async_trait]
impl Provider for GitLabProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::GitLab
    }

    async fn current_user(&self) -> Result<String> {
        Ok(self.me().await?.username)
    }

    async fn fetch_assigned(&self, user: &str) -> Result<Vec<RawRecord>> {
        let user = urlencoding::encode(user);
        let mut records: Vec<serde_json::Value> = self
            .get_pages(&format!("/issues?scope=all&state=opened&assignee_username={user}"))
            .await?;
        records.extend(
            self.get_pages::<serde_json::Value>(&format!(
                "/merge_requests?scope=all&state=opened&assignee_username={user}"
            ))
            .await?,
        );
        Ok(decode_records(records, "gitlab", RawRecord::GitLab))
    }

    async fn fetch_review_requests(&self, user: &str) -> Result<Vec<RawRecord>> {
        let user = urlencoding::encode(user);
        let records: Vec<serde_json::Value> = self
            .get_pages(&format!("/merge_requests?scope=all&state=opened&reviewer_username={user}"))
            .await?;
        Ok(decode_records(records, "gitlab", RawRecord::GitLab))
    }

    async fn list_labels(&self, repo: &str) -> Result<Option<Vec<Label>>> {
        let labels: Vec<GlLabel> = self
            .get_pages(&format!("/projects/{}/labels", urlencoding::encode(repo)))
            .await?;
        Ok(Some(
            labels
                .into_iter()
                .map(|l| Label {
                    name: l.name,
                    color: l.color,
                })
                .collect(),
        ))
    }

    async fn create_item(&self, repo: &str, title: &str, labels: &[String]) -> Result<Option<String>> {
        let me = self.me().await?;
        let body = serde_json::json!({
            "title": title,
            "labels": labels.join(","),
            "assignee_ids": [me.id],
        });
        let created: CreatedIssue = self
            .client
            .post(format!("{}/projects/{}/issues", self.api_base, urlencoding::encode(repo)))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&body)
            .send()
            .await
            .context("GitLab issue creation failed")?
            .error_for_status()
            .context("GitLab rejected issue creation")?
            .json()
            .await
            .context("Failed to parse created GitLab issue")?;
        Ok(Some(created.web_url))
    }
}
