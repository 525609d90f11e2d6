use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use super::{read_json_or_default, write_json};
use crate::error::Result;
use crate::model::work_item::WorkItem;

/// Durable set of item ids the user has acknowledged.
pub struct SeenSet {
    path: PathBuf,
    guard: Mutex<()>,
}

impl SeenSet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BTreeSet<String> {
        read_json_or_default(&self.path)
    }

    /// Ids of `items` that were never marked seen, in item order.
    pub fn unseen(&self, items: &[WorkItem]) -> Vec<String> {
        let seen = self.load();
        items
            .iter()
            .filter(|item| !seen.contains(&item.id))
            .map(|item| item.id.clone())
            .collect()
    }

    /// Add ids to the set. Returns how many were not in it yet.
    pub fn mark_seen<I, S>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = FileLock::acquire_for(&self.path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut seen = self.load();
        let before = seen.len();
        seen.extend(
            ids.into_iter()
                .map(|id| id.as_ref().trim().to_string())
                .filter(|id| !id.is_empty()),
        );
        let added = seen.len() - before;
        if added > 0 {
            tracing::info!("marked {added} item(s) as seen");
            write_json(&self.path, &seen)?;
        }
        Ok(added)
    }

    /// Forget every acknowledged id.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = FileLock::acquire_for(&self.path, DEFAULT_LOCK_TIMEOUT_MS)?;
        tracing::info!("resetting seen items");
        write_json(&self.path, &BTreeSet::<String>::new())
    }
}
