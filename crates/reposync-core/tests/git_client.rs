use reposync_core::model::ALREADY_UP_TO_DATE;
use reposync_core::paths::repo_path;
use reposync_core::vcs::{GitCommandClient, PullReport, VcsClient};
use reposync_core::{
    CancelFlag, RepositoryDescriptor, SyncEngine, SyncIntent, SyncOptions, VcsError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(30);

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=reposync",
            "-c",
            "user.email=reposync@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit(dir: &Path, file: &str, contents: &str) {
    fs::write(dir.join(file), contents).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "-q", "-m", &format!("update {file}")]);
}

/// A bare `origin.git` plus a working `seed` clone that pushes to it.
struct Origin {
    _tmp: TempDir,
    bare: PathBuf,
    seed: PathBuf,
}

impl Origin {
    fn empty() -> Self {
        let tmp = TempDir::new().unwrap();
        git(tmp.path(), &["init", "-q", "--bare", "-b", "main", "origin.git"]);
        git(tmp.path(), &["init", "-q", "-b", "main", "seed"]);
        let bare = tmp.path().join("origin.git");
        let seed = tmp.path().join("seed");
        git(&seed, &["remote", "add", "origin", &bare.to_string_lossy()]);
        Self {
            _tmp: tmp,
            bare,
            seed,
        }
    }

    fn with_commit() -> Self {
        let origin = Self::empty();
        origin.push("README.md", "# hello\n");
        origin
    }

    fn push(&self, file: &str, contents: &str) {
        commit(&self.seed, file, contents);
        git(&self.seed, &["push", "-q", "origin", "main"]);
    }

    fn url(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    fn descriptor(&self, name: &str) -> RepositoryDescriptor {
        let mut repo = RepositoryDescriptor::new(name, Some(self.url()));
        repo.default_branch = "main".to_string();
        repo
    }
}

fn engine(root: &Path) -> SyncEngine {
    let mut engine = SyncEngine::new(
        Arc::new(GitCommandClient::default()),
        root,
        SyncOptions::default(),
    );
    engine.set_identity("octocat", "");
    engine
}

#[test]
fn clone_check_and_fast_forward_against_real_origin() {
    let origin = Origin::with_commit();
    let store = TempDir::new().unwrap();
    let engine = engine(store.path());
    let mut repos = vec![origin.descriptor("hello")];
    let cancel = CancelFlag::new();

    let reports = engine.check_staleness(&mut repos, &cancel).unwrap();
    assert!(reports["hello"].needs_update);
    let report = engine
        .run_sync(&mut repos, SyncIntent::UpdateNeeded, &cancel, None)
        .unwrap();
    assert!(report.outcomes[0].success, "{}", report.outcomes[0].message);
    assert!(report.outcomes[0].message.starts_with("Cloned into"));
    assert!(repos[0].local_exists);

    let reports = engine.check_staleness(&mut repos, &cancel).unwrap();
    assert!(!reports["hello"].needs_update, "{}", reports["hello"].reason);
    assert_eq!(reports["hello"].reason, "up to date");

    origin.push("CHANGELOG.md", "- one\n");
    let reports = engine.check_staleness(&mut repos, &cancel).unwrap();
    assert!(reports["hello"].needs_update);
    assert_eq!(reports["hello"].reason, "behind origin/main");

    let report = engine
        .run_sync(&mut repos, SyncIntent::UpdateNeeded, &cancel, None)
        .unwrap();
    assert_eq!(
        report.outcomes[0].message,
        "Fast-forwarded main by 1 commit(s)"
    );
    let checkout = repo_path(store.path(), "octocat", "hello");
    assert!(checkout.join("CHANGELOG.md").exists());
    assert!(!repos[0].need_update);

    let reports = engine.check_staleness(&mut repos, &cancel).unwrap();
    assert!(!reports["hello"].needs_update);
    let report = engine
        .run_sync(&mut repos, SyncIntent::SyncAll, &cancel, None)
        .unwrap();
    assert_eq!(report.outcomes[0].message, ALREADY_UP_TO_DATE);
    assert_eq!(report.statistics.failed, 0);
}

#[test]
fn local_commits_that_diverge_are_refused() {
    let origin = Origin::with_commit();
    let tmp = TempDir::new().unwrap();
    let checkout = tmp.path().join("hello");
    let client = GitCommandClient::default();
    let output = client.clone_repo(&origin.url(), &checkout, TIMEOUT).unwrap();
    assert!(output.success(), "{}", output.stderr);

    commit(&checkout, "local.txt", "mine\n");
    let local_head = git(&checkout, &["rev-parse", "HEAD"]);
    origin.push("remote.txt", "theirs\n");

    let err = client.pull(&checkout, TIMEOUT).unwrap_err();
    assert!(
        matches!(
            err,
            VcsError::DivergedHistory {
                ahead: 1,
                behind: 1,
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(git(&checkout, &["rev-parse", "HEAD"]), local_head);
}

#[test]
fn dirty_checkout_is_not_pulled() {
    let origin = Origin::with_commit();
    let tmp = TempDir::new().unwrap();
    let checkout = tmp.path().join("hello");
    let client = GitCommandClient::default();
    client.clone_repo(&origin.url(), &checkout, TIMEOUT).unwrap();

    fs::write(checkout.join("scratch.txt"), "wip").unwrap();
    origin.push("remote.txt", "theirs\n");
    let err = client.pull(&checkout, TIMEOUT).unwrap_err();
    assert!(matches!(err, VcsError::DirtyWorkTree), "{err}");
    assert!(!checkout.join("remote.txt").exists());
}

#[test]
fn remote_tip_reads_origin_without_fetching() {
    let origin = Origin::with_commit();
    let tmp = TempDir::new().unwrap();
    let checkout = tmp.path().join("hello");
    let client = GitCommandClient::default();
    client.clone_repo(&origin.url(), &checkout, TIMEOUT).unwrap();

    origin.push("remote.txt", "theirs\n");
    let pushed = git(&origin.seed, &["rev-parse", "HEAD"]);
    let tip = client.remote_tip(&checkout, "main", TIMEOUT).unwrap();
    assert_eq!(tip.as_deref(), Some(pushed.as_str()));
    assert_eq!(client.remote_tip(&checkout, "develop", TIMEOUT).unwrap(), None);
    assert!(!checkout.join("remote.txt").exists());
}

#[test]
fn empty_origin_settles_after_first_clone() {
    let origin = Origin::empty();
    let store = TempDir::new().unwrap();
    let engine = engine(store.path());
    let mut repos = vec![origin.descriptor("empty")];
    let cancel = CancelFlag::new();

    engine.check_staleness(&mut repos, &cancel).unwrap();
    let first = engine
        .run_sync(&mut repos, SyncIntent::UpdateNeeded, &cancel, None)
        .unwrap();
    assert!(first.outcomes[0].success, "{}", first.outcomes[0].message);

    for _ in 0..2 {
        let reports = engine.check_staleness(&mut repos, &cancel).unwrap();
        assert!(!reports["empty"].needs_update, "{}", reports["empty"].reason);
        let report = engine
            .run_sync(&mut repos, SyncIntent::UpdateNeeded, &cancel, None)
            .unwrap();
        assert_eq!(report.statistics.failed, 0);
        assert_eq!(report.statistics.succeeded, 0);
    }

    let checkout = repo_path(store.path(), "octocat", "empty");
    let pulled = GitCommandClient::default().pull(&checkout, TIMEOUT).unwrap();
    assert_eq!(pulled, PullReport::UpToDate);
}
