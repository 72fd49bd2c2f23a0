pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod git_sync;
pub mod lockfile;
pub mod model;
pub mod paths;
pub mod provider;
pub mod repo_status;
pub mod staleness;
pub mod sync_engine;
mod sync_engine_apply;
mod sync_engine_types;
mod sync_engine_work_items;
mod sync_engine_workers;
pub mod vcs;

pub use batch::{BatchExecutor, CancelFlag};
pub use error::{SyncError, VcsError};
pub use model::{Identity, RepositoryDescriptor, SyncIntent, SyncOperation, SyncOutcome};
pub use sync_engine::{BatchStatistics, SyncEngine, SyncHandle, SyncOptions, SyncReport};
