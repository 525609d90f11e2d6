use std::collections::BTreeMap;

use serde::Serialize;

use super::work_item::{SourceKind, WorkItem};

/// Summary counters over a list of work items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub per_source: BTreeMap<SourceKind, usize>,
    pub pulls: usize,
    pub issues: usize,
    pub due_dates_total: usize,
    pub milestones_total: usize,
    pub epics_total: usize,
}

impl Stats {
    pub fn compute(items: &[WorkItem]) -> Self {
        let mut stats = Stats::default();
        for item in items {
            stats.total += 1;
            *stats.per_source.entry(item.source).or_insert(0) += 1;
            if item.pull {
                stats.pulls += 1;
            } else {
                stats.issues += 1;
            }
            if !item.due_date.is_empty() {
                stats.due_dates_total += 1;
            }
            if !item.milestone_title.is_empty() {
                stats.milestones_total += 1;
            }
            if !item.epic_title.is_empty() {
                stats.epics_total += 1;
            }
        }
        stats
    }

    pub fn source_count(&self, source: SourceKind) -> usize {
        self.per_source.get(&source).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, source: SourceKind, pull: bool) -> WorkItem {
        let mut item = WorkItem::new(id.into(), source, id.into(), Utc::now());
        item.pull = pull;
        item
    }

    #[test]
    fn empty_list_has_zero_counts() {
        let stats = Stats::compute(&[]);
        assert_eq!(stats, Stats::default());
        assert_eq!(stats.source_count(SourceKind::GitHub), 0);
    }

    #[test]
    fn counts_sources_kinds_and_populated_fields() {
        let mut a = item("github-1", SourceKind::GitHub, false);
        a.due_date = "2024-01-01".into();
        let mut b = item("github-2", SourceKind::GitHub, true);
        b.milestone_title = "v1".into();
        let mut c = item("gitlab-3", SourceKind::GitLab, false);
        c.epic_title = "Epic".into();
        c.milestone_title = "v2".into();

        let stats = Stats::compute(&[a, b, c]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.source_count(SourceKind::GitHub), 2);
        assert_eq!(stats.source_count(SourceKind::GitLab), 1);
        assert_eq!(stats.source_count(SourceKind::Planner), 0);
        assert_eq!(stats.pulls, 1);
        assert_eq!(stats.issues, 2);
        assert_eq!(stats.due_dates_total, 1);
        assert_eq!(stats.milestones_total, 2);
        assert_eq!(stats.epics_total, 1);
    }
}
