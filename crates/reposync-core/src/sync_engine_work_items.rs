use crate::model::{RepositoryDescriptor, SyncIntent, SyncOperation};
use crate::paths::repo_dir;
use crate::sync_engine_types::RepoWorkItem;
use std::path::Path;

/// Whether `intent` acts on `repo` at all.
pub(crate) fn is_selected(repo: &RepositoryDescriptor, intent: SyncIntent) -> bool {
    match intent {
        SyncIntent::SyncAll | SyncIntent::SyncWithRepair | SyncIntent::RecloneAll => {
            repo.has_clone_url()
        }
        SyncIntent::UpdateNeeded => repo.needs_action(),
        SyncIntent::CloneMissing => !repo.local_exists,
    }
}

/// Operation planned before the run starts. Repair and reclone may still turn into a
/// clone once the worker has inspected the disk.
pub(crate) fn planned_operation(repo: &RepositoryDescriptor, intent: SyncIntent) -> SyncOperation {
    match intent {
        SyncIntent::SyncWithRepair => SyncOperation::VerifyAndRepair,
        SyncIntent::RecloneAll => SyncOperation::Clone,
        _ if !repo.local_exists => SyncOperation::Clone,
        _ => SyncOperation::Pull,
    }
}

/// Selected repositories in input order.
pub(crate) fn build_work_items(
    repos: &[RepositoryDescriptor],
    intent: SyncIntent,
    repositories_root: &Path,
) -> Vec<RepoWorkItem> {
    repos
        .iter()
        .enumerate()
        .filter(|(_, repo)| is_selected(repo, intent))
        .map(|(index, repo)| RepoWorkItem {
            index,
            repo: repo.clone(),
            path: repo_dir(repositories_root, &repo.name),
            operation: planned_operation(repo, intent),
            reclone: intent == SyncIntent::RecloneAll,
        })
        .collect()
}
