use crate::model::{OutcomeClass, RepositoryDescriptor};
use crate::sync_engine::{BatchStatistics, SyncAction, SyncProgress, SyncProgressReporter};
use crate::sync_engine_types::{RepoResult, RepoWorkItem};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

pub(crate) struct ProgressState<'p> {
    pub(crate) run_id: Uuid,
    pub(crate) reporter: Option<&'p SyncProgressReporter<'p>>,
    pub(crate) total: usize,
    pub(crate) processed: usize,
}

impl ProgressState<'_> {
    pub(crate) fn emit(
        &self,
        action: SyncAction,
        repo_name: Option<&str>,
        message: Option<&str>,
        statistics: &BatchStatistics,
    ) {
        let Some(reporter) = self.reporter else {
            return;
        };
        reporter(SyncProgress {
            run_id: self.run_id,
            action,
            repo_name: repo_name.map(str::to_string),
            message: message.map(str::to_string),
            total: self.total,
            processed: self.processed,
            statistics: statistics.clone(),
        });
    }
}

/// Descriptors shared between the workers and the completion callback.
pub(crate) type SharedDescriptors<'r> = Mutex<&'r mut [RepositoryDescriptor]>;

/// A repair or reclone removed the checkout; readers see it before the clone starts.
pub(crate) fn mark_local_cleared(descriptors: &SharedDescriptors<'_>, index: usize) {
    let mut repos = descriptors.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(repo) = repos.get_mut(index) {
        repo.local_exists = false;
    }
}

/// Fold one finished repository into the caller's descriptor and the run statistics.
pub(crate) fn apply_result(
    repo: &mut RepositoryDescriptor,
    item: &RepoWorkItem,
    result: &RepoResult,
    statistics: &mut BatchStatistics,
    state: &mut ProgressState<'_>,
) {
    if result.found_existing {
        repo.local_exists = true;
    }
    if result.synced() {
        repo.mark_synced();
    }

    statistics.record(&result.outcome);
    state.processed += 1;

    let class = result.outcome.class();
    match class {
        OutcomeClass::Failed => warn!(
            repo = %item.repo.name,
            path = %item.path.display(),
            error = %result.outcome.message,
            "repo sync failed"
        ),
        _ => info!(
            repo = %item.repo.name,
            path = %item.path.display(),
            outcome = class.as_str(),
            message = %result.outcome.message,
            elapsed_ms = result.outcome.duration.as_millis() as u64,
            "repo sync outcome"
        ),
    }

    state.emit(
        SyncAction::from(class),
        Some(&item.repo.name),
        Some(&result.outcome.message),
        statistics,
    );
}
