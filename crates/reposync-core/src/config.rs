use crate::sync_engine::SyncOptions;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_HOST: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub root: Option<PathBuf>,
    pub username: Option<String>,
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,
    #[serde(default = "default_remote_query_timeout_secs")]
    pub remote_query_timeout_secs: u64,
    #[serde(default)]
    pub staleness_workers: Option<usize>,
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: None,
            username: None,
            api_host: default_api_host(),
            clone_timeout_secs: default_clone_timeout_secs(),
            pull_timeout_secs: default_pull_timeout_secs(),
            verify_timeout_secs: default_verify_timeout_secs(),
            remote_query_timeout_secs: default_remote_query_timeout_secs(),
            staleness_workers: None,
            download_workers: default_download_workers(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).context("read config")?;
        let config = serde_json::from_str(&data).context("parse config")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        let defaults = SyncOptions::default();
        SyncOptions {
            clone_timeout: Duration::from_secs(self.clone_timeout_secs.max(1)),
            pull_timeout: Duration::from_secs(self.pull_timeout_secs.max(1)),
            verify_timeout: Duration::from_secs(self.verify_timeout_secs.max(1)),
            remote_query_timeout: Duration::from_secs(self.remote_query_timeout_secs.max(1)),
            staleness_workers: self
                .staleness_workers
                .map(|workers| workers.max(1))
                .unwrap_or(defaults.staleness_workers),
            ..defaults
        }
    }
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_clone_timeout_secs() -> u64 {
    120
}

fn default_pull_timeout_secs() -> u64 {
    120
}

fn default_verify_timeout_secs() -> u64 {
    5
}

fn default_remote_query_timeout_secs() -> u64 {
    15
}

fn default_download_workers() -> usize {
    4
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("com", "reposync", "reposync").context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_cache_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().join("cache.json"))
}
