use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::model::work_item::SourceKind;
use crate::rank::SortSpec;

pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// One table per configured source, keyed by a user-chosen name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sorting: SortingConfig,
    pub todo_repo: Option<TodoRepoConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: String,
    pub url: Option<String>,
    pub token: Option<String>,
    pub path: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_timeout")]
    pub timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_CACHE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SortingConfig {
    /// Field names, prefixed with `-` for descending order.
    pub keys: Option<Vec<String>>,
}

/// Where personal tasks get created.
#[derive(Debug, Deserialize, Clone)]
pub struct TodoRepoConfig {
    /// Name of one of the `[services]` tables.
    pub service: String,
    pub repo: String,
}

fn default_cache_timeout() -> u64 {
    DEFAULT_CACHE_TIMEOUT_SECS
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl AppConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_seconds.max(1))
    }

    pub fn sort_spec(&self) -> Result<SortSpec, Error> {
        match &self.sorting.keys {
            Some(keys) => SortSpec::parse(keys),
            None => Ok(SortSpec::default()),
        }
    }

    /// Check required settings. Unknown service types pass here; they are
    /// skipped with a warning when providers get built.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, cfg) in &self.services {
            if cfg.service.trim().is_empty() {
                return Err(Error::Config(format!(
                    "the service section '{name}' has no 'service' defined, e.g. 'github' or 'gitlab'"
                )));
            }
            let missing = |field: &str| {
                Error::Config(format!(
                    "the service section '{name}' is a {} service but has no '{field}' defined",
                    cfg.service
                ))
            };
            match SourceKind::from_service(&cfg.service) {
                Some(SourceKind::GitHub) => {
                    if is_blank(&cfg.token) {
                        return Err(missing("token"));
                    }
                }
                Some(SourceKind::GitLab) => {
                    if is_blank(&cfg.url) {
                        return Err(missing("url"));
                    }
                    if is_blank(&cfg.token) {
                        return Err(missing("token"));
                    }
                }
                Some(SourceKind::Planner) => {
                    if cfg.path.is_none() {
                        return Err(missing("path"));
                    }
                }
                None => {}
            }
        }

        if let Some(todo) = &self.todo_repo {
            if !self.services.contains_key(&todo.service) {
                return Err(Error::Config(format!(
                    "todo_repo refers to unknown service section '{}'",
                    todo.service
                )));
            }
            if todo.repo.trim().is_empty() {
                return Err(Error::Config("todo_repo has no 'repo' defined".into()));
            }
        }

        self.sort_spec()?;
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todo-merger")
        .join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todo-merger")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let mut config: AppConfig =
        toml::from_str(contents).with_context(|| "Failed to parse config.toml")?;
    for cfg in config.services.values_mut() {
        if let Some(path) = &cfg.path {
            cfg.path = Some(expand_home(path));
        }
    }
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        tracing::warn!("config file {} not found, no services configured", path.display());
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents)
}
