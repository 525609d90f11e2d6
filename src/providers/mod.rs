pub mod github;
pub mod gitlab;
pub mod planner;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{AppConfig, ServiceConfig};
use crate::model::work_item::SourceKind;

/// A record exactly as one tracker reported it, before normalization.
#[derive(Debug, Clone)]
pub enum RawRecord {
    GitHub(github::GhIssue),
    GitLab(gitlab::GlRecord),
    Planner(planner::PlannerTask),
    /// An element of a response that did not decode into the source's shape.
    Malformed { record: String, reason: String },
}

impl RawRecord {
    /// Best-effort identifier for log lines about this record.
    pub fn describe(&self) -> String {
        match self {
            RawRecord::GitHub(issue) => format!("github-{}", issue.id),
            RawRecord::GitLab(record) if record.is_merge_request() => format!("gitlab-mr-{}", record.id),
            RawRecord::GitLab(record) => format!("gitlab-{}", record.id),
            RawRecord::Planner(task) => format!("msplanner-{}", task.id),
            RawRecord::Malformed { record, .. } => record.clone(),
        }
    }
}

pub(crate) const PER_PAGE: usize = 100;
pub(crate) const MAX_PAGES: u32 = 10;

/// Walk a paged listing until a short page comes back. The flag is set when
/// the page cap ended the walk first.
pub(crate) async fn collect_pages<T, F, Fut>(
    max_pages: u32,
    per_page: usize,
    mut fetch_page: F,
) -> Result<(Vec<T>, bool)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut all = Vec::new();
    for page in 1..=max_pages {
        let batch = fetch_page(page).await?;
        let done = batch.len() < per_page;
        all.extend(batch);
        if done {
            return Ok((all, false));
        }
    }
    Ok((all, true))
}

pub(crate) fn warn_truncated(source: &str, path: &str, count: usize) {
    tracing::warn!(
        "{source}: stopped after {MAX_PAGES} pages of {path}, results are truncated at {count} records"
    );
}

/// Decode each element on its own, so one bad record does not take the rest
/// of its page down with it.
pub(crate) fn decode_records<T: DeserializeOwned>(
    values: Vec<Value>,
    tag: &str,
    wrap: fn(T) -> RawRecord,
) -> Vec<RawRecord> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let record = match value.get("id") {
                Some(Value::String(id)) => format!("{tag}-{id}"),
                Some(Value::Number(id)) => format!("{tag}-{id}"),
                _ => format!("{tag} record #{index}"),
            };
            match serde_json::from_value::<T>(value) {
                Ok(decoded) => wrap(decoded),
                Err(e) => RawRecord::Malformed {
                    record,
                    reason: e.to_string(),
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub name: String,
    /// Hex color such as `#d73a4a`, empty when the tracker has none.
    pub color: String,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Name of the config table this provider was built from.
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;
    /// Handle of the authenticated user, used to resolve assignees.
    async fn current_user(&self) -> Result<String>;
    async fn fetch_assigned(&self, user: &str) -> Result<Vec<RawRecord>>;
    async fn fetch_review_requests(&self, _user: &str) -> Result<Vec<RawRecord>> {
        Ok(vec![])
    }
    /// Labels of a repository. Returns None if the provider has no labels.
    async fn list_labels(&self, _repo: &str) -> Result<Option<Vec<Label>>> {
        Ok(None)
    }
    /// Create an issue assigned to the current user and return its web URL.
    /// Returns None if the provider doesn't support creation.
    async fn create_item(
        &self,
        _repo: &str,
        _title: &str,
        _labels: &[String],
    ) -> Result<Option<String>> {
        Ok(None)
    }
}


fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("todo-merger/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

fn build_provider(
    name: &str,
    kind: SourceKind,
    cfg: &ServiceConfig,
    timeout: Duration,
) -> Box<dyn Provider> {
    let token = cfg.token.clone().unwrap_or_default();
    match kind {
        SourceKind::GitHub => Box::new(github::GitHubProvider::new(
            name.to_string(),
            cfg.url.clone(),
            token,
            http_client(timeout),
        )),
        SourceKind::GitLab => Box::new(gitlab::GitLabProvider::new(
            name.to_string(),
            cfg.url.clone().unwrap_or_default(),
            token,
            http_client(timeout),
        )),
        SourceKind::Planner => Box::new(planner::PlannerFileProvider::new(
            name.to_string(),
            cfg.path.clone().unwrap_or_default(),
            cfg.user.clone().unwrap_or_default(),
        )),
    }
}

/// Build one provider per configured service. Unknown service types are
/// skipped and returned as warnings.
pub fn create_providers(config: &AppConfig) -> (Vec<Box<dyn Provider>>, Vec<String>) {
    let mut providers: Vec<Box<dyn Provider>> = Vec::new();
    let mut warnings = Vec::new();
    let timeout = config.fetch_timeout();

    for (name, cfg) in &config.services {
        match SourceKind::from_service(&cfg.service) {
            Some(kind) => providers.push(build_provider(name, kind, cfg, timeout)),
            None => {
                let msg = format!("{name}: service type '{}' is not supported", cfg.service);
                tracing::warn!("{msg}, skipping");
                warnings.push(msg);
            }
        }
    }

    (providers, warnings)
}
