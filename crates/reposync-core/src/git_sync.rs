use crate::error::VcsError;
use crate::model::{ALREADY_UP_TO_DATE, RepositoryDescriptor, SyncOutcome};
use crate::paths::has_git_metadata;
use crate::vcs::{PullReport, VcsClient};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub healthy: bool,
    pub reason: String,
}

impl IntegrityReport {
    fn healthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: true,
            reason: reason.into(),
        }
    }

    fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdapterTimeouts {
    pub clone: Duration,
    pub pull: Duration,
    pub verify: Duration,
}

/// Runs exactly one clone, pull or integrity check against one local path and reports
/// the outcome. Errors from the client never escape: they become failed outcomes.
pub struct VcsAdapter<'a> {
    client: &'a dyn VcsClient,
    timeouts: AdapterTimeouts,
}

impl<'a> VcsAdapter<'a> {
    pub fn new(client: &'a dyn VcsClient, timeouts: AdapterTimeouts) -> Self {
        Self { client, timeouts }
    }

    pub fn clone_repo(&self, repo: &RepositoryDescriptor, destination: &Path) -> SyncOutcome {
        let started = Instant::now();
        let result = self.try_clone(repo, destination);
        finish(&repo.name, started, result)
    }

    pub fn pull(&self, repo: &RepositoryDescriptor, destination: &Path) -> SyncOutcome {
        let started = Instant::now();
        let result = self.try_pull(destination);
        finish(&repo.name, started, result)
    }

    /// Best-effort diagnostic; command failures and timeouts read as unhealthy.
    pub fn verify_integrity(&self, destination: &Path) -> IntegrityReport {
        if !destination.exists() {
            return IntegrityReport::unhealthy("path does not exist");
        }
        if !has_git_metadata(destination) {
            return IntegrityReport::unhealthy("missing .git metadata");
        }
        match self
            .client
            .check_metadata(destination, self.timeouts.verify)
        {
            Ok(output) if output.success() => IntegrityReport::healthy("git metadata valid"),
            Ok(output) => IntegrityReport::unhealthy(format!(
                "rev-parse failed: {}",
                output.stderr.trim()
            )),
            Err(err) => IntegrityReport::unhealthy(err.to_string()),
        }
    }

    fn try_clone(
        &self,
        repo: &RepositoryDescriptor,
        destination: &Path,
    ) -> Result<String, VcsError> {
        let url = repo
            .clone_url()
            .ok_or_else(|| VcsError::NoRemoteUrl(repo.name.clone()))?;
        if has_git_metadata(destination) {
            return Err(VcsError::DestinationExists(destination.to_path_buf()));
        }
        info!(repo = %repo.name, path = %destination.display(), "cloning repo");
        let output = self
            .client
            .clone_repo(url, destination, self.timeouts.clone)?;
        if !output.success() {
            return Err(VcsError::CommandFailed {
                command: "clone".to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(format!("Cloned into {}", destination.display()))
    }

    fn try_pull(&self, destination: &Path) -> Result<String, VcsError> {
        if !has_git_metadata(destination) {
            return Err(VcsError::NotLocal(destination.to_path_buf()));
        }
        match self.client.pull(destination, self.timeouts.pull)? {
            PullReport::UpToDate => Ok(ALREADY_UP_TO_DATE.to_string()),
            PullReport::FastForwarded { branch, commits } => {
                Ok(format!("Fast-forwarded {branch} by {commits} commit(s)"))
            }
        }
    }
}

fn finish(name: &str, started: Instant, result: Result<String, VcsError>) -> SyncOutcome {
    let duration = started.elapsed();
    match result {
        Ok(message) => SyncOutcome::succeeded(name, message, duration),
        Err(err) => {
            warn!(repo = %name, error = %err, "vcs operation failed");
            SyncOutcome::failed(name, err.to_string(), duration)
        }
    }
}
