//! Ordering of work items.
//!
//! [`rank`] computes the tie-break order from a [`SortSpec`]; [`order_by_priority`]
//! then groups that order by the user-assigned rank. Both sorts are stable.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::work_item::WorkItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    DueDate,
    Milestone,
    Epic,
    UpdatedAt,
    Title,
    Reference,
    Source,
    Assignees,
}

impl SortField {
    pub const ALL: [SortField; 8] = [
        SortField::DueDate,
        SortField::Milestone,
        SortField::Epic,
        SortField::UpdatedAt,
        SortField::Title,
        SortField::Reference,
        SortField::Source,
        SortField::Assignees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::DueDate => "due_date",
            SortField::Milestone => "milestone_title",
            SortField::Epic => "epic_title",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
            SortField::Reference => "reference",
            SortField::Source => "source",
            SortField::Assignees => "assignee_users",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        SortField::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// Comparable key, or `None` when the item has no value for this field.
    fn key(&self, item: &WorkItem) -> Option<SortValue> {
        let text = match self {
            SortField::UpdatedAt => return Some(SortValue::Number(item.updated_at.timestamp())),
            SortField::DueDate => &item.due_date,
            SortField::Milestone => &item.milestone_title,
            SortField::Epic => &item.epic_title,
            SortField::Title => &item.title,
            SortField::Reference => &item.reference,
            SortField::Source => item.source.as_str(),
            SortField::Assignees => &item.assignee_users,
        };
        if text.is_empty() {
            None
        } else {
            Some(SortValue::Text(text.to_lowercase()))
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// Empty values go last whatever the direction.
    fn compare(&self, a: &WorkItem, b: &WorkItem) -> Ordering {
        match (self.field.key(a), self.field.key(b)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = x.cmp(&y);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        f.write_str(self.field.as_str())
    }
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            keys: vec![
                SortKey::asc(SortField::DueDate),
                SortKey::desc(SortField::Milestone),
                SortKey::desc(SortField::Epic),
                SortKey::desc(SortField::UpdatedAt),
            ],
        }
    }
}

impl SortSpec {
    /// Parse keys such as `due_date` or `-updated_at` (descending).
    pub fn parse<S: AsRef<str>>(keys: &[S]) -> Result<Self> {
        let keys = keys
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                let (name, descending) = match raw.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (raw.strip_prefix('+').unwrap_or(raw), false),
                };
                SortField::parse(name)
                    .map(|field| SortKey { field, descending })
                    .ok_or_else(|| Error::Config(format!("unknown sort field '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn compare(&self, a: &WorkItem, b: &WorkItem) -> Ordering {
        self.keys
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        f.write_str(&keys.join(", "))
    }
}

/// Stable sort by the keys of `spec`.
pub fn rank(mut items: Vec<WorkItem>, spec: &SortSpec) -> Vec<WorkItem> {
    tracing::debug!("sorting {} items by {spec}", items.len());
    items.sort_by(|a, b| spec.compare(a, b));
    items
}

/// Stable sort by user rank, keeping the computed order within equal rank.
pub fn order_by_priority(mut items: Vec<WorkItem>) -> Vec<WorkItem> {
    items.sort_by_key(|item| item.rank);
    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    TodoList,
}

impl Filter {
    pub fn toggle(self) -> Self {
        match self {
            Filter::All => Filter::TodoList,
            Filter::TodoList => Filter::All,
        }
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        match self {
            Filter::All => true,
            Filter::TodoList => item.todolist,
        }
    }
}

pub fn apply_filter(items: Vec<WorkItem>, filter: Filter) -> Vec<WorkItem> {
    items.into_iter().filter(|item| filter.matches(item)).collect()
}
