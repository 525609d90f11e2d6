//! The pipeline behind every view: cache or aggregate, rank, overlay user
//! overrides, count, and flag unseen items.

use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};

use crate::aggregate::Aggregator;
use crate::config::{AppConfig, TodoRepoConfig};
use crate::error::{Error, Result};
use crate::model::stats::Stats;
use crate::model::work_item::{Rank, WorkItem};
use crate::normalize::time_ago;
use crate::providers::{self, Label};
use crate::rank::{order_by_priority, rank, SortSpec};
use crate::store::cache::CacheManager;
use crate::store::overrides::{self, OverrideStore, RankChange};
use crate::store::seen::SeenSet;

#[derive(Debug, Clone)]
pub struct IssuesView {
    /// Ordered by rank first, then by the sort spec.
    pub items: Vec<WorkItem>,
    pub stats: Stats,
    /// Ids of items never marked seen.
    pub new_ids: Vec<String>,
    pub from_cache: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

impl IssuesView {
    pub fn is_new(&self, id: &str) -> bool {
        self.new_ids.iter().any(|n| n == id)
    }
}

pub struct TodoService {
    aggregator: Aggregator,
    cache: CacheManager,
    overrides: OverrideStore,
    seen: SeenSet,
    sort_spec: SortSpec,
    ttl_secs: u64,
    todo_repo: Option<TodoRepoConfig>,
}

impl TodoService {
    pub fn new(aggregator: Aggregator, cache: CacheManager, overrides: OverrideStore, seen: SeenSet) -> Self {
        Self {
            aggregator,
            cache,
            overrides,
            seen,
            sort_spec: SortSpec::default(),
            ttl_secs: crate::config::DEFAULT_CACHE_TIMEOUT_SECS,
            todo_repo: None,
        }
    }

    /// Build providers and open the state files under `data_dir`.
    pub fn from_config(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        let (providers, warnings) = providers::create_providers(config);
        let aggregator = Aggregator::new(providers, config.fetch_timeout()).with_warnings(warnings);
        Ok(Self::new(
            aggregator,
            CacheManager::load(data_dir.join("cache.json")),
            OverrideStore::new(data_dir.join("overrides.json")),
            SeenSet::new(data_dir.join("seen.json")),
        )
        .with_sort_spec(config.sort_spec()?)
        .with_ttl(config.cache.timeout_seconds)
        .with_todo_repo(config.todo_repo.clone()))
    }

    pub fn with_sort_spec(mut self, spec: SortSpec) -> Self {
        self.sort_spec = spec;
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_todo_repo(mut self, todo_repo: Option<TodoRepoConfig>) -> Self {
        self.todo_repo = todo_repo;
        self
    }

    pub fn has_sources(&self) -> bool {
        !self.aggregator.is_empty()
    }

    pub async fn get_issues_and_stats(&self, use_cache: bool) -> IssuesView {
        self.view_at(Utc::now(), use_cache).await
    }

    pub async fn view_at(&self, now: DateTime<Utc>, use_cache: bool) -> IssuesView {
        if !use_cache {
            self.cache.invalidate().await;
        }
        let lookup = self
            .cache
            .get_or_refresh(now, self.ttl_secs, || self.aggregator.aggregate(now))
            .await;

        let mut items = rank(lookup.items.as_ref().clone(), &self.sort_spec);
        for item in &mut items {
            item.updated_at_display = time_ago(now, item.updated_at);
        }
        overrides::apply(&mut items, &self.overrides.load());
        let items = order_by_priority(items);

        let stats = Stats::compute(&items);
        let new_ids = self.seen.unseen(&items);
        IssuesView {
            items,
            stats,
            new_ids,
            from_cache: lookup.from_cache,
            fetched_at: self.cache.last_fetch().await,
            warnings: lookup.warnings,
        }
    }

    /// Set or toggle off a rank. Ranking an item also marks it seen.
    pub fn set_ranking(&self, id: &str, rank_name: &str) -> Result<RankChange> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        let rank = Rank::parse(rank_name)?;
        let change = self.overrides.set_rank(id, rank)?;
        self.seen.mark_seen([id])?;
        Ok(change)
    }

    pub fn toggle_todo(&self, id: &str) -> Result<bool> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        self.overrides.toggle_todo(id)
    }

    pub fn mark_seen<I, S>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.seen.mark_seen(ids)
    }

    pub fn reset_seen(&self) -> Result<()> {
        self.seen.reset()
    }

    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    fn todo_sink(&self) -> anyhow::Result<(&dyn providers::Provider, &str)> {
        let Some(todo) = &self.todo_repo else {
            bail!("No todo_repo configured. Add a [todo_repo] section with 'service' and 'repo'");
        };
        let provider = self
            .aggregator
            .provider(&todo.service)
            .with_context(|| format!("todo_repo service '{}' is not available", todo.service))?;
        Ok((provider, todo.repo.as_str()))
    }

    pub async fn get_labels(&self) -> anyhow::Result<Vec<Label>> {
        let (provider, repo) = self.todo_sink()?;
        match provider.list_labels(repo).await? {
            Some(labels) => Ok(labels),
            None => bail!("{} does not support labels", provider.name()),
        }
    }

    /// Create a personal task and return its web URL. The next view refetches
    /// so the new task shows up.
    pub async fn create_item(&self, title: &str, labels: &[String]) -> anyhow::Result<String> {
        let title = title.trim();
        if title.is_empty() {
            bail!("Task title cannot be empty");
        }
        let (provider, repo) = self.todo_sink()?;
        let url = provider
            .create_item(repo, title, labels)
            .await?
            .with_context(|| format!("{} does not support creating tasks", provider.name()))?;
        tracing::info!("created task '{title}' in {repo}: {url}");
        self.cache.invalidate().await;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::MockProvider;
    use crate::providers::Provider;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn service(dir: &Path, providers: Vec<Box<dyn Provider>>) -> TodoService {
        TodoService::new(
            Aggregator::new(providers, Duration::from_secs(5)),
            CacheManager::load(dir.join("cache.json")),
            OverrideStore::new(dir.join("overrides.json")),
            SeenSet::new(dir.join("seen.json")),
        )
    }

    fn mock() -> MockProvider {
        MockProvider::new("gh")
            .with_issue(1, "2024-05-01T00:00:00Z")
            .with_issue(2, "2024-05-20T00:00:00Z")
            .with_issue(3, "2024-05-10T00:00:00Z")
    }

    fn ids(view: &IssuesView) -> Vec<&str> {
        view.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn default_view_orders_by_recency() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        let view = svc.view_at(now(), true).await;
        assert_eq!(ids(&view), ["github-2", "github-3", "github-1"]);
        assert_eq!(view.stats.total, 3);
        assert_eq!(view.new_ids.len(), 3);
        assert!(!view.from_cache);
        assert_eq!(view.fetched_at, Some(now()));
    }

    #[tokio::test]
    async fn rank_overlay_groups_items() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        svc.set_ranking("github-1", "pin").unwrap();
        svc.set_ranking("github-2", "low").unwrap();

        let view = svc.view_at(now(), true).await;
        assert_eq!(ids(&view), ["github-1", "github-3", "github-2"]);
        assert_eq!(view.items[0].rank, Rank::Pin.value());
        assert_eq!(view.new_ids, ["github-3"]);
    }

    #[tokio::test]
    async fn repeating_a_ranking_restores_default() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        assert_eq!(svc.set_ranking("github-3", "high").unwrap(), RankChange::Set(Rank::High));
        assert_eq!(svc.set_ranking("github-3", "high").unwrap(), RankChange::Reset);

        let view = svc.view_at(now(), true).await;
        let item = view.items.iter().find(|i| i.id == "github-3").unwrap();
        assert_eq!(item.rank, Rank::Normal.value());
    }

    #[tokio::test]
    async fn invalid_rankings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![]);
        assert!(matches!(svc.set_ranking("github-1", "top"), Err(Error::UnknownRank(_))));
        assert!(matches!(svc.set_ranking(" ", "pin"), Err(Error::EmptyId)));
    }

    #[tokio::test]
    async fn cache_is_used_unless_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        assert!(!svc.view_at(now(), true).await.from_cache);
        assert!(svc.view_at(now(), true).await.from_cache);
        assert!(!svc.view_at(now(), false).await.from_cache);
    }

    #[tokio::test]
    async fn ages_are_recomputed_for_cached_items() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]).with_ttl(10 * 365 * 86_400);
        svc.view_at(now(), true).await;
        let later = svc.view_at(now() + chrono::Duration::days(365), true).await;
        assert!(later.from_cache);
        assert!(later.items.iter().all(|i| i.updated_at_display.ends_with("year ago")));
    }

    #[tokio::test]
    async fn marked_items_are_no_longer_new() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        svc.mark_seen(["github-1", "github-2"]).unwrap();
        let view = svc.view_at(now(), true).await;
        assert_eq!(view.new_ids, ["github-3"]);
        assert!(view.is_new("github-3"));
        assert!(!view.is_new("github-1"));
    }

    #[tokio::test]
    async fn todo_flag_is_overlaid() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        assert!(svc.toggle_todo("github-2").unwrap());
        let view = svc.view_at(now(), true).await;
        let flagged: Vec<&str> = view.items.iter().filter(|i| i.todolist).map(|i| i.id.as_str()).collect();
        assert_eq!(flagged, ["github-2"]);
    }

    #[tokio::test]
    async fn failing_sources_show_warnings_not_blank() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(
            dir.path(),
            vec![Box::new(mock()), Box::new(MockProvider::new("down").with_failure())],
        );
        let view = svc.view_at(now(), true).await;
        assert_eq!(view.items.len(), 3);
        assert_eq!(view.warnings.len(), 1);
        assert!(view.warnings[0].starts_with("down"));
    }

    #[tokio::test]
    async fn personal_tasks_go_to_the_configured_sink() {
        let dir = tempfile::tempdir().unwrap();
        let provider = mock();
        let created = provider.created.clone();
        let svc = service(dir.path(), vec![Box::new(provider)]).with_todo_repo(Some(TodoRepoConfig {
            service: "gh".into(),
            repo: "me/todo".into(),
        }));

        svc.view_at(now(), true).await;
        let url = svc.create_item("Buy milk", &["errand".into()]).await.unwrap();
        assert_eq!(url, "https://github.com/me/todo/issues/1");
        assert_eq!(
            created.lock().unwrap().as_slice(),
            &[("me/todo".to_string(), "Buy milk".to_string(), vec!["errand".to_string()])]
        );
        assert!(!svc.view_at(now(), true).await.from_cache);

        let labels = svc.get_labels().await.unwrap();
        assert_eq!(labels[0].name, "bug");
    }

    #[tokio::test]
    async fn personal_tasks_need_a_sink() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Box::new(mock())]);
        let err = svc.create_item("x", &[]).await.unwrap_err();
        assert!(err.to_string().contains("No todo_repo configured"));
    }
}
