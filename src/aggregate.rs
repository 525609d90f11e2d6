use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::{Error, Result};
use crate::model::work_item::WorkItem;
use crate::normalize::normalize;
use crate::providers::{Provider, RawRecord};

/// Items merged from every source, plus what went wrong on the way.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub items: Vec<WorkItem>,
    pub warnings: Vec<String>,
}

struct SourceResult {
    items: Vec<WorkItem>,
    dropped: Vec<String>,
}

pub struct Aggregator {
    providers: Vec<Box<dyn Provider>>,
    timeout: Duration,
    /// Reported with every aggregation, e.g. unsupported service types.
    config_warnings: Vec<String>,
}

impl Aggregator {
    pub fn new(providers: Vec<Box<dyn Provider>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            config_warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.config_warnings = warnings;
        self
    }

    pub fn provider(&self, name: &str) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Fetch all sources concurrently and merge in source order. A failing
    /// source contributes nothing; only the failure of every source is an error.
    pub async fn aggregate(&self, now: DateTime<Utc>) -> Result<Aggregation> {
        let results = join_all(
            self.providers
                .iter()
                .map(|provider| self.fetch_source(provider.as_ref(), now)),
        )
        .await;

        let mut aggregation = Aggregation {
            items: Vec::new(),
            warnings: self.config_warnings.clone(),
        };
        let mut failures = Vec::new();

        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(source) => {
                    tracing::info!("{}: {} items", provider.name(), source.items.len());
                    aggregation.warnings.extend(source.dropped);
                    aggregation.items.extend(source.items);
                }
                Err(e) => {
                    tracing::warn!("{e}");
                    failures.push(e.to_string());
                }
            }
        }

        if !self.providers.is_empty() && failures.len() == self.providers.len() {
            return Err(Error::AllSourcesFailed(failures));
        }
        aggregation.warnings.extend(failures);
        Ok(aggregation)
    }

    async fn fetch_source(&self, provider: &dyn Provider, now: DateTime<Utc>) -> Result<SourceResult> {
        tracing::info!("getting assigned {} items for {}", provider.kind().display_name(), provider.name());
        let raw = tokio::time::timeout(self.timeout, fetch_raw(provider))
            .await
            .map_err(|_| Error::SourceTimeout {
                source_name: provider.name().to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| Error::SourceFetch {
                source_name: provider.name().to_string(),
                message: format!("{e:#}"),
            })?;

        let (user, records) = raw;
        let mut result = SourceResult {
            items: Vec::with_capacity(records.len()),
            dropped: Vec::new(),
        };
        // An item both assigned and review-requested shows up twice. Ids are
        // only unique within one source, so this must not span providers.
        let mut ids = HashSet::new();
        for record in &records {
            match normalize(record, &user, now) {
                Ok(item) => {
                    if ids.insert(item.id.clone()) {
                        result.items.push(item);
                    }
                }
                Err(e) => {
                    tracing::warn!("{}: dropping record {}: {e}", provider.name(), record.describe());
                    result.dropped.push(format!("{}: {e}", provider.name()));
                }
            }
        }
        Ok(result)
    }
}

async fn fetch_raw(provider: &dyn Provider) -> anyhow::Result<(String, Vec<RawRecord>)> {
    let user = provider.current_user().await?;
    let mut records = provider.fetch_assigned(&user).await?;
    records.extend(provider.fetch_review_requests(&user).await?);
    Ok((user, records))
}
