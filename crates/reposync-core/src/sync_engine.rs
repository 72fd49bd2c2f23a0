use crate::batch::{BatchExecutor, CancelFlag};
use crate::error::SyncError;
use crate::git_sync::{AdapterTimeouts, VcsAdapter};
use crate::model::{Identity, OutcomeClass, RepositoryDescriptor, SyncIntent, SyncOutcome};
use crate::paths::repositories_root;
use crate::staleness::{StalenessChecker, StalenessReport, default_worker_count};
use crate::sync_engine_apply::{
    ProgressState, SharedDescriptors, apply_result, mark_local_cleared,
};
use crate::sync_engine_work_items::build_work_items;
use crate::sync_engine_workers::process_item;
use crate::vcs::VcsClient;
use anyhow::anyhow;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub type SyncProgressReporter<'a> = dyn Fn(SyncProgress) + 'a;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncAction {
    Starting,
    Syncing,
    Succeeded,
    Skipped,
    Failed,
    Done,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Starting => "starting",
            SyncAction::Syncing => "syncing",
            SyncAction::Succeeded => "succeeded",
            SyncAction::Skipped => "skipped",
            SyncAction::Failed => "failed",
            SyncAction::Done => "done",
        }
    }
}

impl From<OutcomeClass> for SyncAction {
    fn from(class: OutcomeClass) -> Self {
        match class {
            OutcomeClass::Succeeded => SyncAction::Succeeded,
            OutcomeClass::Skipped => SyncAction::Skipped,
            OutcomeClass::Failed => SyncAction::Failed,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncProgress {
    pub run_id: Uuid,
    pub action: SyncAction,
    pub repo_name: Option<String>,
    pub message: Option<String>,
    pub total: usize,
    pub processed: usize,
    pub statistics: BatchStatistics,
}

/// Aggregate over the outcomes of one run. `succeeded` is the intent's primary bucket,
/// named by [`BatchStatistics::label`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub intent: SyncIntent,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub durations: Vec<Duration>,
}

impl BatchStatistics {
    pub fn new(intent: SyncIntent) -> Self {
        Self {
            intent,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            durations: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &SyncOutcome) {
        match outcome.class() {
            OutcomeClass::Succeeded => self.succeeded += 1,
            OutcomeClass::Skipped => self.skipped += 1,
            OutcomeClass::Failed => self.failed += 1,
        }
        self.durations.push(outcome.duration);
    }

    pub fn label(&self) -> &'static str {
        self.intent.success_label()
    }

    pub fn total(&self) -> usize {
        (self.succeeded + self.failed + self.skipped) as usize
    }

    pub fn total_duration(&self) -> Duration {
        self.durations.iter().sum()
    }

    pub fn average_duration(&self) -> Option<Duration> {
        let count = u32::try_from(self.durations.len()).ok().filter(|count| *count > 0)?;
        Some(self.total_duration() / count)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub intent: SyncIntent,
    pub selected: usize,
    pub statistics: BatchStatistics,
    /// Input order, one entry per processed repository.
    pub outcomes: Vec<SyncOutcome>,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }
}

#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub clone_timeout: Duration,
    pub pull_timeout: Duration,
    pub verify_timeout: Duration,
    pub remote_query_timeout: Duration,
    pub staleness_workers: usize,
    /// Concurrent clone/pull operations. One keeps the remote host and progress calm.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            clone_timeout: Duration::from_secs(120),
            pull_timeout: Duration::from_secs(120),
            verify_timeout: Duration::from_secs(5),
            remote_query_timeout: Duration::from_secs(15),
            staleness_workers: default_worker_count(),
            concurrency: 1,
        }
    }
}

impl SyncOptions {
    fn adapter_timeouts(&self) -> AdapterTimeouts {
        AdapterTimeouts {
            clone: self.clone_timeout,
            pull: self.pull_timeout,
            verify: self.verify_timeout,
        }
    }
}

/// Descriptors and report handed back by a background run.
#[derive(Debug)]
pub struct SyncRun {
    pub repositories: Vec<RepositoryDescriptor>,
    pub report: SyncReport,
}

/// A sync running on its own thread.
pub struct SyncHandle {
    cancel: CancelFlag,
    events: mpsc::Receiver<SyncProgress>,
    handle: thread::JoinHandle<(Vec<RepositoryDescriptor>, Result<SyncReport, SyncError>)>,
}

impl SyncHandle {
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn events(&self) -> &mpsc::Receiver<SyncProgress> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> anyhow::Result<SyncRun> {
        let (repositories, result) = self
            .handle
            .join()
            .map_err(|_| anyhow!("sync worker thread panicked"))?;
        Ok(SyncRun {
            repositories,
            report: result?,
        })
    }
}

/// Sync orchestrator for one user's local repositories root.
#[derive(Clone)]
pub struct SyncEngine {
    vcs: Arc<dyn VcsClient>,
    root: PathBuf,
    identity: Option<Identity>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(vcs: Arc<dyn VcsClient>, root: impl Into<PathBuf>, options: SyncOptions) -> Self {
        Self {
            vcs,
            root: root.into(),
            identity: None,
            options,
        }
    }

    pub fn set_identity(&mut self, username: impl Into<String>, credential: impl Into<String>) {
        self.identity = Some(Identity::new(username, credential));
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// `<root>/<username>/repositories`; fails when no identity is set.
    pub fn repositories_root(&self) -> Result<PathBuf, SyncError> {
        let identity = self.identity.as_ref().ok_or(SyncError::IdentityNotSet)?;
        if self.root.as_os_str().is_empty() || (self.root.exists() && !self.root.is_dir()) {
            return Err(SyncError::InvalidRoot {
                path: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(repositories_root(&self.root, &identity.username))
    }

    /// Annotate `repos` in place with `local_exists` and `need_update`.
    pub fn check_staleness(
        &self,
        repos: &mut [RepositoryDescriptor],
        cancel: &CancelFlag,
    ) -> Result<HashMap<String, StalenessReport>, SyncError> {
        let base = self.repositories_root()?;
        let checker = StalenessChecker::new(
            self.vcs.as_ref(),
            self.options.remote_query_timeout,
            self.options.staleness_workers,
        );
        let reports = checker.batch_check(repos, &base, cancel);
        StalenessChecker::apply(repos, &reports, &base);
        let stale = reports.values().filter(|report| report.needs_update).count();
        info!(checked = reports.len(), stale, "staleness check finished");
        Ok(reports)
    }

    /// Run `intent` over `repos`, mutating the descriptors as outcomes arrive.
    ///
    /// Per-repository failures land in the report; only a missing identity, an empty
    /// list or a bad root return an error, and they do so before touching anything.
    pub fn run_sync(
        &self,
        repos: &mut [RepositoryDescriptor],
        intent: SyncIntent,
        cancel: &CancelFlag,
        progress: Option<&SyncProgressReporter<'_>>,
    ) -> Result<SyncReport, SyncError> {
        let base = self.repositories_root()?;
        if repos.is_empty() {
            return Err(SyncError::NoRepositories);
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", run_id = %run_id, intent = %intent);
        let _guard = span.enter();

        let items = build_work_items(repos, intent, &base);
        info!(
            repositories = repos.len(),
            selected = items.len(),
            root = %base.display(),
            "starting sync run"
        );

        let statistics = RefCell::new(BatchStatistics::new(intent));
        let state = RefCell::new(ProgressState {
            run_id,
            reporter: progress,
            total: items.len(),
            processed: 0,
        });
        state
            .borrow()
            .emit(SyncAction::Starting, None, None, &statistics.borrow());

        let adapter = VcsAdapter::new(self.vcs.as_ref(), self.options.adapter_timeouts());
        let executor = BatchExecutor::with_concurrency(self.options.concurrency, cancel.clone());
        let descriptors: SharedDescriptors<'_> = Mutex::new(repos);
        let mut results = executor.execute(
            &items,
            |item| {
                process_item(&adapter, item, &|| {
                    mark_local_cleared(&descriptors, item.index)
                })
            },
            |_, _, item| {
                state.borrow().emit(
                    SyncAction::Syncing,
                    Some(&item.repo.name),
                    Some(item.operation.as_str()),
                    &statistics.borrow(),
                )
            },
            |position, result| {
                let item = &items[position];
                let mut repos = descriptors.lock().unwrap_or_else(PoisonError::into_inner);
                apply_result(
                    &mut repos[item.index],
                    item,
                    result,
                    &mut statistics.borrow_mut(),
                    &mut state.borrow_mut(),
                );
            },
        );
        results.sort_by_key(|(position, _)| *position);
        let statistics = statistics.into_inner();
        let state = state.into_inner();

        let cancelled = results.len() < items.len();
        if cancelled {
            warn!(
                completed = results.len(),
                selected = items.len(),
                "sync run cancelled"
            );
        }
        state.emit(SyncAction::Done, None, None, &statistics);
        info!(
            label = statistics.label(),
            succeeded = statistics.succeeded,
            skipped = statistics.skipped,
            failed = statistics.failed,
            elapsed_ms = statistics.total_duration().as_millis() as u64,
            "sync run finished"
        );

        Ok(SyncReport {
            run_id,
            intent,
            selected: items.len(),
            statistics,
            outcomes: results.into_iter().map(|(_, result)| result.outcome).collect(),
            cancelled,
        })
    }

    /// Run on a dedicated thread, streaming progress over a channel.
    pub fn spawn_sync(&self, repos: Vec<RepositoryDescriptor>, intent: SyncIntent) -> SyncHandle {
        self.spawn_sync_with_cancel(repos, intent, CancelFlag::new())
    }

    pub fn spawn_sync_with_cancel(
        &self,
        mut repos: Vec<RepositoryDescriptor>,
        intent: SyncIntent,
        cancel: CancelFlag,
    ) -> SyncHandle {
        let engine = self.clone();
        let (tx, rx) = mpsc::channel();
        let run_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let reporter = move |event: SyncProgress| {
                let _ = tx.send(event);
            };
            let result = engine.run_sync(&mut repos, intent, &run_cancel, Some(&reporter));
            (repos, result)
        });
        SyncHandle {
            cancel,
            events: rx,
            handle,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
