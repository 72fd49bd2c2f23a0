use crate::model::{RepositoryDescriptor, SyncOperation, SyncOutcome};
use std::path::PathBuf;

pub(crate) struct RepoWorkItem {
    /// Position of the descriptor in the caller's list.
    pub(crate) index: usize,
    pub(crate) repo: RepositoryDescriptor,
    pub(crate) path: PathBuf,
    pub(crate) operation: SyncOperation,
    /// Delete whatever is on disk before cloning.
    pub(crate) reclone: bool,
}

/// What one worker did, so the orchestrator can fold it back into the descriptor.
#[derive(Debug)]
pub(crate) struct RepoResult {
    pub(crate) outcome: SyncOutcome,
    pub(crate) performed: Option<SyncOperation>,
    pub(crate) found_existing: bool,
}

impl RepoResult {
    pub(crate) fn new(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            performed: None,
            found_existing: false,
        }
    }

    /// A clone or pull that ran and succeeded leaves the checkout current.
    pub(crate) fn synced(&self) -> bool {
        self.outcome.success
            && matches!(
                self.performed,
                Some(SyncOperation::Clone) | Some(SyncOperation::Pull)
            )
    }
}
