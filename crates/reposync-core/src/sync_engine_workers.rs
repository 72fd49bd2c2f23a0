use crate::git_sync::VcsAdapter;
use crate::model::{SyncOperation, SyncOutcome};
use crate::paths::has_git_metadata;
use crate::sync_engine_types::{RepoResult, RepoWorkItem};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Process one selected repository: optional repair or reclone cleanup, then exactly
/// one of clone, pull or the up-to-date short-circuit.
///
/// `on_cleared` fires once the local copy is gone and before any clone starts.
pub(crate) fn process_item(
    adapter: &VcsAdapter<'_>,
    item: &RepoWorkItem,
    on_cleared: &dyn Fn(),
) -> RepoResult {
    let started = Instant::now();
    let mut local_exists = item.repo.local_exists;

    if item.operation == SyncOperation::VerifyAndRepair {
        let report = adapter.verify_integrity(&item.path);
        if !report.healthy {
            if item.path.exists() {
                warn!(
                    repo = %item.repo.name,
                    path = %item.path.display(),
                    reason = %report.reason,
                    "local copy unhealthy; deleting before re-clone"
                );
                if let Err(err) = remove_checkout(&item.path) {
                    return RepoResult::new(SyncOutcome::failed(
                        &item.repo.name,
                        format!("remove corrupted checkout: {err}"),
                        started.elapsed(),
                    ));
                }
            }
            local_exists = false;
            on_cleared();
        }
    } else if item.reclone {
        if item.path.exists() {
            info!(repo = %item.repo.name, path = %item.path.display(), "removing checkout for reclone");
            if let Err(err) = remove_checkout(&item.path) {
                return RepoResult::new(SyncOutcome::failed(
                    &item.repo.name,
                    format!("remove checkout for reclone: {err}"),
                    started.elapsed(),
                ));
            }
        }
        local_exists = false;
        on_cleared();
    }

    if !local_exists {
        clone_or_detect(adapter, item, started)
    } else if item.repo.need_update {
        let mut result = RepoResult::new(adapter.pull(&item.repo, &item.path));
        result.performed = Some(SyncOperation::Pull);
        result
    } else {
        RepoResult::new(SyncOutcome::up_to_date(&item.repo.name))
    }
}

fn clone_or_detect(adapter: &VcsAdapter<'_>, item: &RepoWorkItem, started: Instant) -> RepoResult {
    if has_git_metadata(&item.path) {
        let mut result = RepoResult::new(SyncOutcome::already_exists(
            &item.repo.name,
            started.elapsed(),
        ));
        result.found_existing = true;
        return result;
    }
    let mut result = RepoResult::new(adapter.clone_repo(&item.repo, &item.path));
    result.performed = Some(SyncOperation::Clone);
    result
}

fn remove_checkout(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
