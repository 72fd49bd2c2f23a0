//! GitHub-facing services: the repository directory, ZIP snapshots and token storage.

pub mod auth;
pub mod github;
mod github_models;
mod http;
mod provider_paging;
pub mod snapshot;

pub use github::GitHubDirectory;
pub use snapshot::{DownloadSummary, Snapshot, SnapshotDownloader, SnapshotResult, choose_branch};
