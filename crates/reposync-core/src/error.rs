use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Structurally invalid orchestrator calls. Raised before any per-repository work.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("identity not set; call set_identity before syncing")]
    IdentityNotSet,
    #[error("no repositories supplied")]
    NoRepositories,
    #[error("invalid storage root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Failures of a single VCS operation. These are folded into a failed
/// [`crate::model::SyncOutcome`] at the adapter boundary.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("repository {0} has no clone url")]
    NoRemoteUrl(String),
    #[error("destination already contains a git checkout: {}", .0.display())]
    DestinationExists(PathBuf),
    #[error("no local checkout at {}", .0.display())]
    NotLocal(PathBuf),
    #[error("branch {branch} has diverged from origin ({ahead} ahead, {behind} behind)")]
    DivergedHistory {
        branch: String,
        ahead: usize,
        behind: usize,
    },
    #[error("working tree has uncommitted changes")]
    DirtyWorkTree,
    #[error("git {command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("spawn git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("git: {0}")]
    Git(#[from] git2::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_includes_seconds() {
        let err = VcsError::Timeout {
            command: "clone".into(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "git clone timed out after 120s");
    }

    #[test]
    fn diverged_message_reports_counts() {
        let err = VcsError::DivergedHistory {
            branch: "main".into(),
            ahead: 1,
            behind: 2,
        };
        assert!(err.to_string().contains("1 ahead, 2 behind"));
    }
}
