use anyhow::Context;
use clap::{Parser, ValueEnum};
use reposync_core::batch::CancelFlag;
use reposync_core::cache::{INVENTORY_TTL_SECS, RepoCache, current_timestamp};
use reposync_core::config::{AppConfig, default_cache_path, default_config_path};
use reposync_core::lockfile::{LockFile, read_holder};
use reposync_core::model::{Identity, RepositoryDescriptor, SyncIntent};
use reposync_core::paths::{lock_path, repo_path};
use reposync_core::provider::RepoDirectory;
use reposync_core::repo_status::compute_repo_status;
use reposync_core::staleness::StalenessReport;
use reposync_core::sync_engine::{SyncAction, SyncProgress, SyncReport};
use reposync_core::vcs::GitCommandClient;
use reposync_core::SyncEngine;
use reposync_providers::{GitHubDirectory, SnapshotDownloader, auth};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod app;
mod args;
mod config_cmd;
mod download_cmd;
mod inventory_cmd;
mod shared;
mod shutdown;
mod status_cmd;
mod sync_cmd;
mod token_cmd;

use app::CliPaths;
use args::*;

use config_cmd::handle_config;
use download_cmd::handle_download;
use inventory_cmd::{handle_check, handle_list};
use status_cmd::handle_status;
use sync_cmd::handle_sync;
use token_cmd::handle_token;

pub async fn run() -> anyhow::Result<()> {
    app::run().await
}
