//! Cached aggregation results.
//!
//! The manager keeps the last good item list and the instant it was fetched.
//! A lookup within the TTL returns the same shared snapshot without touching
//! the sources; a stale or invalidated cache refetches and replaces the
//! snapshot only when the refetch succeeds.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use super::{read_json_or_default, write_json};
use crate::aggregate::Aggregation;
use crate::error::{Error, Result};
use crate::model::work_item::WorkItem;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSnapshot {
    fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    items: Vec<WorkItem>,
}

struct CacheState {
    last_fetch: Option<DateTime<Utc>>,
    items: Arc<Vec<WorkItem>>,
}

#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub items: Arc<Vec<WorkItem>>,
    pub from_cache: bool,
    /// Problems reported while refreshing.
    pub warnings: Vec<String>,
}

pub struct CacheManager {
    path: PathBuf,
    state: Mutex<CacheState>,
}

impl CacheManager {
    /// Restore the persisted snapshot. Missing or unreadable files start an
    /// empty, stale cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let persisted: PersistedSnapshot = read_json_or_default(&path);
        tracing::debug!(
            "loaded {} cached items from {} (fetched at {:?})",
            persisted.items.len(),
            path.display(),
            persisted.fetched_at
        );
        Self {
            path,
            state: Mutex::new(CacheState {
                last_fetch: persisted.fetched_at,
                items: Arc::new(persisted.items),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A timestamp exists and is younger than `ttl_secs`.
    pub fn is_fresh(last_fetch: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        last_fetch.is_some_and(|last| now.signed_duration_since(last) < ttl)
    }

    /// Return the cached items if fresh, otherwise run `refresh` and cache
    /// its result. A failed refresh returns the previous snapshot and leaves
    /// the cache stale.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        now: DateTime<Utc>,
        ttl_secs: u64,
        refresh: F,
    ) -> CacheLookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Aggregation>>,
    {
        let mut state = self.state.lock().await;

        if Self::is_fresh(state.last_fetch, now, ttl_secs) {
            tracing::debug!("cache hit ({} items)", state.items.len());
            return CacheLookup {
                items: state.items.clone(),
                from_cache: true,
                warnings: Vec::new(),
            };
        }

        tracing::info!("cache is stale, fetching from sources");
        match refresh().await {
            Ok(aggregation) => {
                state.items = Arc::new(aggregation.items);
                state.last_fetch = Some(now);
                if let Err(e) = self.persist(&state).await {
                    tracing::warn!("failed to persist cache to {}: {e}", self.path.display());
                }
                CacheLookup {
                    items: state.items.clone(),
                    from_cache: false,
                    warnings: aggregation.warnings,
                }
            }
            Err(e) => {
                tracing::warn!("refresh failed, keeping previous snapshot: {e}");
                CacheLookup {
                    items: state.items.clone(),
                    from_cache: true,
                    warnings: vec![e.to_string()],
                }
            }
        }
    }

    /// Force the next lookup to refetch. The items stay available.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.last_fetch = None;
        tracing::info!("cache invalidated");
        if let Err(e) = self.persist(&state).await {
            tracing::warn!("failed to persist cache to {}: {e}", self.path.display());
        }
    }

    pub async fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_fetch
    }

    /// The file lock may wait on another process, so it is taken off the
    /// async workers.
    async fn persist(&self, state: &CacheState) -> Result<()> {
        let path = self.path.clone();
        let snapshot = PersistedSnapshot {
            fetched_at: state.last_fetch,
            items: state.items.as_ref().clone(),
        };
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire_for(&path, DEFAULT_LOCK_TIMEOUT_MS)?;
            write_json(&path, &snapshot)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}
