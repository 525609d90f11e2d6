use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use super::{read_json_or_default, write_json};
use crate::error::Result;
use crate::model::work_item::{Rank, WorkItem};

/// User-set values for one item. An item without an entry uses the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub todolist: bool,
}

impl OverrideEntry {
    fn is_default(&self) -> bool {
        self.rank.is_none() && !self.todolist
    }
}

pub type Overrides = BTreeMap<String, OverrideEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankChange {
    Set(Rank),
    /// The same rank was requested again and the override was removed.
    Reset,
}

/// Durable id → override mapping, rewritten whole on every change.
pub struct OverrideStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Overrides {
        read_json_or_default(&self.path)
    }

    /// Set the rank of an item. Requesting the rank that is already stored
    /// removes the override instead.
    pub fn set_rank(&self, id: &str, rank: Rank) -> Result<RankChange> {
        self.update(|overrides| {
            let entry = overrides.entry(id.to_string()).or_default();
            if entry.rank == Some(rank.value()) {
                tracing::info!("resetting rank of '{id}' to default");
                entry.rank = None;
                RankChange::Reset
            } else {
                tracing::info!("setting rank of '{id}' to {} ({})", rank.as_str(), rank.value());
                entry.rank = Some(rank.value());
                RankChange::Set(rank)
            }
        })
    }

    /// Flip the todo-list flag and return its new value.
    pub fn toggle_todo(&self, id: &str) -> Result<bool> {
        self.update(|overrides| {
            let entry = overrides.entry(id.to_string()).or_default();
            entry.todolist = !entry.todolist;
            tracing::info!("todo list flag of '{id}' is now {}", entry.todolist);
            entry.todolist
        })
    }

    fn update<R>(&self, f: impl FnOnce(&mut Overrides) -> R) -> Result<R> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = FileLock::acquire_for(&self.path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut overrides = self.load();
        let result = f(&mut overrides);
        overrides.retain(|_, entry| !entry.is_default());
        write_json(&self.path, &overrides)?;
        Ok(result)
    }
}

/// Copy rank and todo flag from the overrides onto matching items.
pub fn apply(items: &mut [WorkItem], overrides: &Overrides) {
    for item in items.iter_mut() {
        let Some(entry) = overrides.get(&item.id) else {
            continue;
        };
        item.rank = entry.rank.unwrap_or(Rank::Normal.value());
        item.todolist = entry.todolist;
        tracing::debug!(
            "applied rank {} and todo flag {} to {} ({})",
            item.rank,
            item.todolist,
            item.id,
            item.title
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::work_item::SourceKind;
    use chrono::Utc;

    fn store() -> (tempfile::TempDir, OverrideStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = OverrideStore::new(dir.path().join("overrides.json"));
        (dir, store)
    }

    fn item(id: &str) -> WorkItem {
        WorkItem::new(id.into(), SourceKind::GitHub, id.into(), Utc::now())
    }

    #[test]
    fn apply_without_entry_is_noop() {
        let mut items = vec![item("github-1"), item("github-2")];
        items[1].rank = 42;
        let before = items.clone();
        let mut overrides = Overrides::new();
        overrides.insert(
            "github-9".into(),
            OverrideEntry {
                rank: Some(Rank::Pin.value()),
                todolist: true,
            },
        );
        apply(&mut items, &overrides);
        assert_eq!(items, before);
    }

    #[test]
    fn apply_sets_rank_and_todo_flag() {
        let mut items = vec![item("github-1"), item("github-2")];
        let mut overrides = Overrides::new();
        overrides.insert(
            "github-1".into(),
            OverrideEntry {
                rank: Some(Rank::High.value()),
                todolist: false,
            },
        );
        overrides.insert(
            "github-2".into(),
            OverrideEntry {
                rank: None,
                todolist: true,
            },
        );
        apply(&mut items, &overrides);
        assert_eq!(items[0].rank, 1);
        assert!(!items[0].todolist);
        assert_eq!(items[1].rank, Rank::Normal.value());
        assert!(items[1].todolist);
    }

    #[test]
    fn repeating_a_rank_resets_it() {
        let (_dir, store) = store();
        assert_eq!(store.set_rank("github-1", Rank::Pin).unwrap(), RankChange::Set(Rank::Pin));
        assert_eq!(store.load()["github-1"].rank, Some(-1));

        assert_eq!(store.set_rank("github-1", Rank::Pin).unwrap(), RankChange::Reset);
        assert!(!store.load().contains_key("github-1"));
    }

    #[test]
    fn changing_rank_overwrites() {
        let (_dir, store) = store();
        store.set_rank("github-1", Rank::High).unwrap();
        store.set_rank("github-1", Rank::Low).unwrap();
        assert_eq!(store.load()["github-1"].rank, Some(99));
    }

    #[test]
    fn explicit_normal_is_stored_then_toggled_off() {
        let (_dir, store) = store();
        store.set_rank("github-1", Rank::Normal).unwrap();
        assert_eq!(store.load()["github-1"].rank, Some(5));
        store.set_rank("github-1", Rank::Normal).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn rank_reset_keeps_todo_flag() {
        let (_dir, store) = store();
        store.toggle_todo("github-1").unwrap();
        store.set_rank("github-1", Rank::High).unwrap();
        store.set_rank("github-1", Rank::High).unwrap();
        let entry = &store.load()["github-1"];
        assert_eq!(entry.rank, None);
        assert!(entry.todolist);
    }

    #[test]
    fn toggling_todo_twice_removes_entry() {
        let (_dir, store) = store();
        assert!(store.toggle_todo("github-1").unwrap());
        assert!(!store.toggle_todo("github-1").unwrap());
        assert!(store.load().is_empty());
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.set_rank(&format!("github-{i}"), Rank::High).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.load().len(), 8);
    }

    #[test]
    fn hand_deleted_file_reads_as_empty() {
        let (_dir, store) = store();
        store.set_rank("github-1", Rank::High).unwrap();
        std::fs::remove_file(store.path()).unwrap();
        assert!(store.load().is_empty());
    }
}
