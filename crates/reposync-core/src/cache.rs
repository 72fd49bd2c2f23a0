use crate::model::{RepositoryDescriptor, SyncIntent};
use crate::sync_engine::SyncReport;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const CACHE_VERSION: u32 = 1;

/// Inventory younger than this is reused instead of paging the API again.
pub const INVENTORY_TTL_SECS: u64 = 15 * 60;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RepoCache {
    pub version: u32,
    #[serde(default)]
    pub inventory: HashMap<String, RepoInventoryEntry>,
    #[serde(default)]
    pub last_runs: HashMap<String, LastRunSnapshot>,
}

impl Default for RepoCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoInventoryEntry {
    pub fetched_at: u64,
    pub repos: Vec<RepositoryDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastRunSnapshot {
    pub run_id: String,
    pub intent: SyncIntent,
    pub finished_at: u64,
    pub selected: usize,
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
    pub total_secs: f64,
    pub cancelled: bool,
    #[serde(default)]
    pub failed_repos: Vec<String>,
}

impl RepoCache {
    pub fn new() -> Self {
        Self {
            version: CACHE_VERSION,
            inventory: HashMap::new(),
            last_runs: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path).context("read cache")?;
        let json: serde_json::Value = serde_json::from_str(&data).context("parse cache")?;
        match json.get("version").and_then(|value| value.as_u64()) {
            Some(1) => Ok(serde_json::from_value(json)?),
            Some(other) => anyhow::bail!("unsupported cache version {other}"),
            None => anyhow::bail!("cache file has no version"),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create cache directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize cache")?;
        fs::write(path, data).context("write cache")?;
        Ok(())
    }

    pub fn record_inventory(&mut self, username: &str, repos: &[RepositoryDescriptor], now: u64) {
        self.inventory.insert(
            username.to_string(),
            RepoInventoryEntry {
                fetched_at: now,
                repos: repos.to_vec(),
            },
        );
    }

    /// Cached inventory for `username` when it is younger than `ttl_secs`.
    pub fn fresh_inventory(
        &self,
        username: &str,
        now: u64,
        ttl_secs: u64,
    ) -> Option<&[RepositoryDescriptor]> {
        let entry = self.inventory.get(username)?;
        if now.saturating_sub(entry.fetched_at) > ttl_secs {
            return None;
        }
        Some(entry.repos.as_slice())
    }

    pub fn record_run(&mut self, username: &str, report: &SyncReport, now: u64) {
        let statistics = &report.statistics;
        self.last_runs.insert(
            username.to_string(),
            LastRunSnapshot {
                run_id: report.run_id.to_string(),
                intent: report.intent,
                finished_at: now,
                selected: report.selected,
                succeeded: statistics.succeeded,
                skipped: statistics.skipped,
                failed: statistics.failed,
                total_secs: statistics.total_duration().as_secs_f64(),
                cancelled: report.cancelled,
                failed_repos: report
                    .failures()
                    .map(|outcome| outcome.name.clone())
                    .collect(),
            },
        );
    }

    pub fn last_run(&self, username: &str) -> Option<&LastRunSnapshot> {
        self.last_runs.get(username)
    }
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
