use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The tracker type an item was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    GitHub,
    GitLab,
    #[serde(rename = "msplanner")]
    Planner,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::GitHub, SourceKind::GitLab, SourceKind::Planner];

    /// Tag used as the id prefix and in persisted files.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "github",
            SourceKind::GitLab => "gitlab",
            SourceKind::Planner => "msplanner",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "GitHub",
            SourceKind::GitLab => "GitLab",
            SourceKind::Planner => "Planner",
        }
    }

    /// Maps the `service` value of a config table. Unknown types yield `None`.
    pub fn from_service(service: &str) -> Option<Self> {
        match service {
            "github" => Some(SourceKind::GitHub),
            "gitlab" => Some(SourceKind::GitLab),
            "msplanner-file" => Some(SourceKind::Planner),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User priority. Lower values sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Pin,
    High,
    Normal,
    Low,
}

impl Rank {
    pub const ALL: [Rank; 4] = [Rank::Pin, Rank::High, Rank::Normal, Rank::Low];

    pub fn value(&self) -> i32 {
        match self {
            Rank::Pin => -1,
            Rank::High => 1,
            Rank::Normal => 5,
            Rank::Low => 99,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Pin => "pin",
            Rank::High => "high",
            Rank::Normal => "normal",
            Rank::Low => "low",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Rank::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::UnknownRank(name.to_string()))
    }

    /// Reverse lookup for display. Values set by hand in the override file
    /// may not match any symbolic rank.
    pub fn from_value(value: i32) -> Option<Self> {
        Rank::ALL.into_iter().find(|r| r.value() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// `<source tag>-<native id>`, unique across all sources.
    pub id: String,
    pub source: SourceKind,
    pub title: String,
    pub web_url: String,
    /// Short reference such as `org/repo#42`.
    #[serde(default)]
    pub reference: String,
    /// Pull request, merge request or review request.
    #[serde(default)]
    pub pull: bool,
    /// Other assignees rendered as `Me, alice, bob`; empty when the
    /// requesting user is the only assignee.
    #[serde(default)]
    pub assignee_users: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone_title: String,
    #[serde(default)]
    pub epic_title: String,
    /// `YYYY-MM-DD` or empty.
    #[serde(default)]
    pub due_date: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at_display: String,
    #[serde(default = "default_rank")]
    pub rank: i32,
    #[serde(default)]
    pub todolist: bool,
}

fn default_rank() -> i32 {
    Rank::Normal.value()
}

impl WorkItem {
    pub fn new(id: String, source: SourceKind, title: String, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            source,
            title,
            web_url: String::new(),
            reference: String::new(),
            pull: false,
            assignee_users: String::new(),
            labels: Vec::new(),
            milestone_title: String::new(),
            epic_title: String::new(),
            due_date: String::new(),
            updated_at,
            updated_at_display: String::new(),
            rank: default_rank(),
            todolist: false,
        }
    }

    pub fn rank_name(&self) -> Option<&'static str> {
        Rank::from_value(self.rank).map(|r| r.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rank_names_map_to_values() {
        assert_eq!(Rank::parse("pin").unwrap().value(), -1);
        assert_eq!(Rank::parse("High").unwrap().value(), 1);
        assert_eq!(Rank::parse("normal").unwrap().value(), 5);
        assert_eq!(Rank::parse("low").unwrap().value(), 99);
        assert!(matches!(Rank::parse("urgent"), Err(Error::UnknownRank(_))));
    }

    #[test]
    fn service_types_map_to_source_kinds() {
        assert_eq!(SourceKind::from_service("github"), Some(SourceKind::GitHub));
        assert_eq!(SourceKind::from_service("msplanner-file"), Some(SourceKind::Planner));
        assert_eq!(SourceKind::from_service("jira"), None);
    }

    #[test]
    fn serialization_preserves_every_field() {
        let mut item = WorkItem::new(
            "gitlab-7".into(),
            SourceKind::GitLab,
            "Fix CI".into(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap(),
        );
        item.web_url = "https://gitlab.example.com/g/p/-/merge_requests/7".into();
        item.reference = "g/p#7".into();
        item.pull = true;
        item.assignee_users = "Me, alice".into();
        item.labels = vec!["ci".into()];
        item.milestone_title = "v2".into();
        item.epic_title = "Platform".into();
        item.due_date = "2024-04-01".into();
        item.updated_at_display = "2 days ago".into();
        item.rank = Rank::Pin.value();
        item.todolist = true;

        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"source\":\"gitlab\""));
        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn deserialization_fills_defaults() {
        let json = r#"{"id":"github-1","source":"github","title":"T","web_url":"","updated_at":"2024-01-01T00:00:00Z"}"#;
        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.rank, Rank::Normal.value());
        assert!(!item.todolist);
        assert_eq!(item.due_date, "");
    }
}
