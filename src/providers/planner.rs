use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{decode_records, Provider, RawRecord};
use crate::error::Result as NormalizeResult;
use crate::model::work_item::{SourceKind, WorkItem};
use crate::normalize::{due_date, record_timestamp, resolve_assignees};

/// Reads tasks from a JSON export of a task planner.
pub struct PlannerFileProvider {
    name: String,
    path: PathBuf,
    user: String,
}

impl PlannerFileProvider {
    pub fn new(name: String, path: PathBuf, user: String) -> Self {
        Self { name, path, user }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerTask {
    pub id: String,
    pub title: String,
    #[serde(alias = "lastModifiedDateTime", alias = "updated_at")]
    pub updated_at: String,
    #[serde(default, alias = "dueDateTime", alias = "due_date")]
    pub due_date: Option<String>,
    #[serde(default, alias = "planTitle")]
    pub plan: Option<String>,
    #[serde(default, alias = "bucketName")]
    pub bucket: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub assignees: Option<Vec<String>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default, alias = "percent_complete")]
    pub percent_complete: Option<u8>,
}

impl PlannerTask {
    fn is_completed(&self) -> bool {
        self.percent_complete.is_some_and(|p| p >= 100)
    }
}

pub fn normalize(task: &PlannerTask, me: &str) -> NormalizeResult<WorkItem> {
    let id = format!("msplanner-{}", task.id);
    let updated_at = record_timestamp(&id, &task.updated_at)?;
    let due = due_date(&id, task.due_date.as_deref())?;

    let mut item = WorkItem::new(id, SourceKind::Planner, task.title.clone(), updated_at);
    item.assignee_users = resolve_assignees(task.assignees.iter().flatten().cloned(), me);
    item.labels = task.labels.clone().unwrap_or_default();
    item.milestone_title = task.bucket.clone().unwrap_or_default();
    item.epic_title = task.plan.clone().unwrap_or_default();
    item.reference = task.plan.clone().unwrap_or_default();
    item.web_url = task.url.clone().unwrap_or_default();
    item.due_date = due;
    Ok(item)
}

#[async_trait]
impl Provider for PlannerFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Planner
    }

    async fn current_user(&self) -> Result<String> {
        Ok(self.user.clone())
    }

    async fn fetch_assigned(&self, _user: &str) -> Result<Vec<RawRecord>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read planner export {}", self.path.display()))?;
        let tasks: Vec<serde_json::Value> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse planner export {}", self.path.display()))?;
        Ok(decode_records(tasks, "msplanner", RawRecord::Planner)
            .into_iter()
            .filter(|r| !matches!(r, RawRecord::Planner(t) if t.is_completed()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"[
        {
            "id": "AbC123",
            "title": "Prepare workshop",
            "lastModifiedDateTime": "2024-04-02T08:30:00",
            "dueDateTime": "2024-04-10T22:00:00Z",
            "planTitle": "Team plan",
            "bucketName": "This week",
            "assignees": ["Jane Doe", "Max"],
            "percentComplete": 50
        },
        {
            "id": "Done1",
            "title": "Old task",
            "lastModifiedDateTime": "2024-01-01T00:00:00Z",
            "percentComplete": 100
        }
    ]"#;

    #[test]
    fn normalizes_task() {
        let tasks: Vec<PlannerTask> = serde_json::from_str(EXPORT).unwrap();
        let item = normalize(&tasks[0], "Jane Doe").unwrap();
        assert_eq!(item.id, "msplanner-AbC123");
        assert_eq!(item.source, SourceKind::Planner);
        assert!(!item.pull);
        assert_eq!(item.assignee_users, "Me, Max");
        assert_eq!(item.due_date, "2024-04-10");
        assert_eq!(item.milestone_title, "This week");
        assert_eq!(item.epic_title, "Team plan");
        assert_eq!(item.updated_at.to_rfc3339(), "2024-04-02T08:30:00+00:00");
    }

    #[tokio::test]
    async fn fetch_skips_completed_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.json");
        std::fs::write(&path, EXPORT).unwrap();

        let provider = PlannerFileProvider::new("planner".into(), path, "Jane Doe".into());
        let records = provider.fetch_assigned("Jane Doe").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].describe(), "msplanner-AbC123");
    }

    #[tokio::test]
    async fn bad_task_is_dropped_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "Good", "title": "Ok", "lastModifiedDateTime": "2024-04-02T08:30:00Z"},
                {"id": "NoTime", "title": "Missing timestamp"}
            ]"#,
        )
        .unwrap();

        let provider = PlannerFileProvider::new("planner".into(), path, "me".into());
        let records = provider.fetch_assigned("me").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].describe(), "msplanner-NoTime");

        let now = chrono::Utc::now();
        assert!(crate::normalize::normalize(&records[0], "me", now).is_ok());
        let err = crate::normalize::normalize(&records[1], "me", now).unwrap_err();
        assert!(matches!(err, crate::error::Error::MalformedRecord { ref record, .. } if record == "msplanner-NoTime"));
    }

    #[tokio::test]
    async fn missing_export_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            PlannerFileProvider::new("planner".into(), dir.path().join("absent.json"), "me".into());
        let err = provider.fetch_assigned("me").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read planner export"));
    }
}
