use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Message a pull reports when the fetch brought nothing new.
pub const ALREADY_UP_TO_DATE: &str = "Already up to date";
/// Message a clone reports when the destination already holds a checkout.
pub const ALREADY_EXISTS: &str = "Already exists";

/// A remote repository as returned by the directory service, plus the local-state
/// flags recomputed on every checkup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub default_branch: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub size_kb: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub local_exists: bool,
    #[serde(default)]
    pub need_update: bool,
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>, clone_url: Option<String>) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            clone_url,
            html_url: String::new(),
            default_branch: "main".to_string(),
            private: false,
            archived: false,
            fork: false,
            size_kb: 0,
            created_at: None,
            updated_at: None,
            local_exists: false,
            need_update: false,
        }
    }

    pub fn clone_url(&self) -> Option<&str> {
        self.clone_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn has_clone_url(&self) -> bool {
        self.clone_url().is_some()
    }

    /// `need_update` only counts when the checkout exists; a missing checkout always
    /// needs action.
    pub fn needs_action(&self) -> bool {
        !self.local_exists || self.need_update
    }

    pub(crate) fn mark_synced(&mut self) {
        self.local_exists = true;
        self.need_update = false;
    }
}

/// Who the run acts for. The credential is kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub credential: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// High-level request a caller makes of the orchestrator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncIntent {
    SyncAll,
    UpdateNeeded,
    CloneMissing,
    SyncWithRepair,
    RecloneAll,
}

impl SyncIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncIntent::SyncAll => "sync_all",
            SyncIntent::UpdateNeeded => "update_needed",
            SyncIntent::CloneMissing => "clone_missing",
            SyncIntent::SyncWithRepair => "sync_with_repair",
            SyncIntent::RecloneAll => "reclone_all",
        }
    }

    /// Label of the primary success bucket in [`crate::sync_engine::BatchStatistics`].
    pub fn success_label(&self) -> &'static str {
        match self {
            SyncIntent::SyncAll | SyncIntent::SyncWithRepair => "synced",
            SyncIntent::UpdateNeeded => "updated",
            SyncIntent::CloneMissing | SyncIntent::RecloneAll => "cloned",
        }
    }
}

impl fmt::Display for SyncIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The adapter primitive chosen for one repository.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOperation {
    Clone,
    Pull,
    VerifyAndRepair,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Clone => "clone",
            SyncOperation::Pull => "pull",
            SyncOperation::VerifyAndRepair => "verify_and_repair",
        }
    }
}

/// Result of processing one repository.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub duration: Duration,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutcomeClass {
    Succeeded,
    Skipped,
    Failed,
}

impl OutcomeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeClass::Succeeded => "succeeded",
            OutcomeClass::Skipped => "skipped",
            OutcomeClass::Failed => "failed",
        }
    }
}

impl SyncOutcome {
    pub fn succeeded(name: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            success: true,
            message: message.into(),
            duration,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            success: false,
            message: message.into(),
            duration,
        }
    }

    pub fn up_to_date(name: impl Into<String>) -> Self {
        Self::succeeded(name, ALREADY_UP_TO_DATE, Duration::ZERO)
    }

    pub fn already_exists(name: impl Into<String>, duration: Duration) -> Self {
        Self::succeeded(name, ALREADY_EXISTS, duration)
    }

    /// Sentinel messages are matched exactly.
    pub fn class(&self) -> OutcomeClass {
        if !self.success {
            OutcomeClass::Failed
        } else if self.message == ALREADY_UP_TO_DATE || self.message == ALREADY_EXISTS {
            OutcomeClass::Skipped
        } else {
            OutcomeClass::Succeeded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinel_messages_classify_as_skipped() {
        assert_eq!(SyncOutcome::up_to_date("a").class(), OutcomeClass::Skipped);
        assert_eq!(
            SyncOutcome::already_exists("a", Duration::ZERO).class(),
            OutcomeClass::Skipped
        );
        let near_miss = SyncOutcome::succeeded("a", "already up to date", Duration::ZERO);
        assert_eq!(near_miss.class(), OutcomeClass::Succeeded);
        let failed = SyncOutcome::failed("a", ALREADY_UP_TO_DATE, Duration::ZERO);
        assert_eq!(failed.class(), OutcomeClass::Failed);
    }

    #[test]
    fn needs_action_ignores_stale_flag_for_missing_checkout() {
        let mut repo = RepositoryDescriptor::new("a", Some("git@x/a".into()));
        assert!(repo.needs_action());
        repo.local_exists = true;
        assert!(!repo.needs_action());
        repo.need_update = true;
        assert!(repo.needs_action());
    }

    #[test]
    fn blank_clone_url_counts_as_missing() {
        let repo = RepositoryDescriptor::new("a", Some("  ".into()));
        assert!(!repo.has_clone_url());
    }

    #[test]
    fn descriptor_deserializes_without_local_flags() {
        let value = json!({
            "name": "repo",
            "full_name": "me/repo",
            "clone_url": "git@github.com:me/repo.git",
            "default_branch": "main",
            "private": true
        });
        let repo: RepositoryDescriptor = serde_json::from_value(value).unwrap();
        assert!(repo.private);
        assert!(!repo.local_exists);
        assert!(!repo.need_update);
    }

    #[test]
    fn identity_debug_redacts_credential() {
        let identity = Identity::new("me", "ghp_secret");
        let printed = format!("{identity:?}");
        assert!(printed.contains("me"));
        assert!(!printed.contains("ghp_secret"));
    }
}
