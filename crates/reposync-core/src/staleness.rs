use crate::batch::{BatchExecutor, CancelFlag};
use crate::model::RepositoryDescriptor;
use crate::paths::{has_git_metadata, repo_dir};
use crate::repo_status::{TipComparison, compare_with_remote_tip, head_is_unborn};
use crate::vcs::VcsClient;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalenessReport {
    pub needs_update: bool,
    pub reason: String,
}

impl StalenessReport {
    fn stale(reason: impl Into<String>) -> Self {
        Self {
            needs_update: true,
            reason: reason.into(),
        }
    }

    fn fresh(reason: impl Into<String>) -> Self {
        Self {
            needs_update: false,
            reason: reason.into(),
        }
    }
}

/// Compares each checkout against the remote tip of its default branch with a
/// refs-only query. Never touches the working tree.
pub struct StalenessChecker<'a> {
    client: &'a dyn VcsClient,
    timeout: Duration,
    workers: usize,
}

impl<'a> StalenessChecker<'a> {
    pub fn new(client: &'a dyn VcsClient, timeout: Duration, workers: usize) -> Self {
        Self {
            client,
            timeout,
            workers: workers.max(1),
        }
    }

    pub fn check_one(&self, repo: &RepositoryDescriptor, path: &Path) -> StalenessReport {
        if !path.exists() {
            return StalenessReport::stale("no local copy");
        }
        if !has_git_metadata(path) {
            return StalenessReport::stale("local folder has no .git metadata");
        }

        let branch = match repo.default_branch.trim() {
            "" => "main",
            branch => branch,
        };
        let remote_tip = match self.client.remote_tip(path, branch, self.timeout) {
            Ok(Some(tip)) => tip,
            Ok(None) if head_is_unborn(path) => {
                return StalenessReport::fresh(format!("origin has no commits on {branch} yet"));
            }
            Ok(None) => return StalenessReport::stale(format!("origin has no branch {branch}")),
            Err(err) => {
                // A failed query must not hide a stale checkout.
                warn!(repo = %repo.name, error = %err, "remote query failed; assuming stale");
                return StalenessReport::stale(format!("remote query failed: {err}"));
            }
        };

        match compare_with_remote_tip(path, branch, &remote_tip) {
            Ok(TipComparison::Equal) => StalenessReport::fresh("up to date"),
            Ok(TipComparison::LocalAhead) => StalenessReport::fresh("local is ahead of origin"),
            Ok(TipComparison::Behind) => StalenessReport::stale(format!("behind origin/{branch}")),
            Err(err) => StalenessReport::stale(format!("local comparison failed: {err}")),
        }
    }

    /// One report per repository name, gathered with a bounded pool of workers.
    pub fn batch_check(
        &self,
        repos: &[RepositoryDescriptor],
        repositories_root: &Path,
        cancel: &CancelFlag,
    ) -> HashMap<String, StalenessReport> {
        let executor = BatchExecutor::with_concurrency(self.workers, cancel.clone());
        let results = executor.execute(
            repos,
            |repo| self.check_one(repo, &repo_dir(repositories_root, &repo.name)),
            |_, _, _| {},
            |_, _| {},
        );
        debug!(
            checked = results.len(),
            workers = self.workers,
            "staleness batch finished"
        );
        results
            .into_iter()
            .map(|(index, report)| (repos[index].name.clone(), report))
            .collect()
    }

    /// Writes `local_exists` and `need_update` back onto the descriptors. Repositories
    /// without a report keep their flags.
    pub fn apply(
        repos: &mut [RepositoryDescriptor],
        reports: &HashMap<String, StalenessReport>,
        repositories_root: &Path,
    ) {
        for repo in repos.iter_mut() {
            let Some(report) = reports.get(&repo.name) else {
                continue;
            };
            repo.local_exists = has_git_metadata(&repo_dir(repositories_root, &repo.name));
            repo.need_update = report.needs_update;
        }
    }
}

/// Available parallelism minus one, never below one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}
