use crate::cache::current_timestamp;
use git2::{BranchType, ErrorCode, Oid, Repository, StatusOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RepoLocalStatus {
    pub checked_at: u64,
    pub is_checkout: bool,
    pub head_branch: Option<String>,
    pub head_commit_time: Option<u64>,
    pub upstream: Option<String>,
    pub ahead: Option<u32>,
    pub behind: Option<u32>,
    pub clean: Option<bool>,
}

/// Snapshot of a checkout for display. A folder git2 cannot open yields
/// `is_checkout == false` rather than an error.
pub fn compute_repo_status(path: &Path) -> anyhow::Result<RepoLocalStatus> {
    let mut status = RepoLocalStatus {
        checked_at: current_timestamp(),
        ..RepoLocalStatus::default()
    };
    let Ok(repo) = Repository::open(path) else {
        return Ok(status);
    };
    status.is_checkout = true;
    status.clean = is_working_tree_clean(&repo).ok();

    let Some(head_oid) = repo.head().ok().and_then(|head| head.target()) else {
        return Ok(status);
    };
    status.head_commit_time = repo
        .find_commit(head_oid)
        .ok()
        .and_then(|commit| u64::try_from(commit.time().seconds()).ok());
    status.head_branch = head_branch(&repo);

    let Some(branch) = status.head_branch.as_deref() else {
        return Ok(status);
    };
    let upstream = repo
        .find_branch(branch, BranchType::Local)
        .and_then(|local| local.upstream());
    if let Ok(upstream) = upstream {
        let reference = upstream.get();
        status.upstream = reference.name().map(str::to_string);
        if let Some(upstream_oid) = reference.target() {
            let (ahead, behind) = repo.graph_ahead_behind(head_oid, upstream_oid)?;
            status.ahead = u32::try_from(ahead).ok();
            status.behind = u32::try_from(behind).ok();
        }
    }
    Ok(status)
}

pub fn is_working_tree_clean(repo: &Repository) -> Result<bool, git2::Error> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut options))?;
    Ok(statuses.is_empty())
}

pub fn head_branch(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand().map(|name| name.to_string())
}

/// Branch HEAD points at while it has no commits yet, as in a fresh clone of an
/// empty repository.
pub fn unborn_head_branch(repo: &Repository) -> Option<String> {
    match repo.head() {
        Err(err) if err.code() == ErrorCode::UnbornBranch => {}
        _ => return None,
    }
    let head = repo.find_reference("HEAD").ok()?;
    head.symbolic_target()?
        .strip_prefix("refs/heads/")
        .map(str::to_string)
}

pub fn head_is_unborn(path: &Path) -> bool {
    Repository::open(path).is_ok_and(|repo| unborn_head_branch(&repo).is_some())
}

/// Commits `local_ref` has that `remote_ref` lacks, and the reverse.
pub fn ahead_behind(
    repo: &Repository,
    local_ref: &str,
    remote_ref: &str,
) -> Result<(usize, usize), git2::Error> {
    let local_oid = repo.refname_to_id(local_ref)?;
    let remote_oid = repo.refname_to_id(remote_ref)?;
    repo.graph_ahead_behind(local_oid, remote_oid)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipComparison {
    Equal,
    LocalAhead,
    Behind,
}

/// Compare the local tip of `branch` (falling back to HEAD) against a commit id the
/// remote advertised. A remote commit unknown locally means the checkout is behind.
pub fn compare_with_remote_tip(
    path: &Path,
    branch: &str,
    remote_tip: &str,
) -> Result<TipComparison, git2::Error> {
    let repo = Repository::open(path)?;
    let remote_oid = Oid::from_str(remote_tip)?;
    let Some(local_oid) = local_tip(&repo, branch) else {
        return Ok(TipComparison::Behind);
    };
    if local_oid == remote_oid {
        return Ok(TipComparison::Equal);
    }
    if repo.find_commit(remote_oid).is_ok() && repo.graph_descendant_of(local_oid, remote_oid)? {
        return Ok(TipComparison::LocalAhead);
    }
    Ok(TipComparison::Behind)
}

fn local_tip(repo: &Repository, branch: &str) -> Option<Oid> {
    repo.refname_to_id(&format!("refs/heads/{branch}"))
        .ok()
        .or_else(|| repo.head().ok().and_then(|head| head.target()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Commit, Signature};
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, contents: &str, parents: &[&Commit<'_>]) -> Oid {
        let repo_dir = repo.workdir().unwrap();
        std::fs::write(repo_dir.join(name), contents).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("tester", "tester@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, parents)
            .unwrap()
    }

    #[test]
    fn compute_repo_status_reports_branch_and_ahead() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        let first = commit_file(&repo, "a.txt", "a", &[]);
        let first_commit = repo.find_commit(first).unwrap();
        repo.branch("main", &first_commit, true).unwrap();
        repo.set_head("refs/heads/main").unwrap();

        repo.remote("origin", "git@example.com:me/repo.git")
            .unwrap();
        repo.reference("refs/remotes/origin/main", first, true, "origin main")
            .unwrap();

        let mut branch = repo.find_branch("main", BranchType::Local).unwrap();
        branch.set_upstream(Some("origin/main")).unwrap();

        let status = compute_repo_status(temp.path()).unwrap();
        assert!(status.is_checkout);
        assert_eq!(status.head_branch.as_deref(), Some("main"));
        assert_eq!(status.ahead, Some(0));
        assert_eq!(status.behind, Some(0));
        assert_eq!(status.clean, Some(true));
        assert!(status.head_commit_time.is_some());

        let _ = commit_file(&repo, "b.txt", "b", &[&first_commit]);
        let status = compute_repo_status(temp.path()).unwrap();
        assert_eq!(status.ahead, Some(1));
        assert_eq!(status.behind, Some(0));
    }

    #[test]
    fn compute_repo_status_on_plain_folder() {
        let temp = TempDir::new().unwrap();
        let status = compute_repo_status(temp.path()).unwrap();
        assert!(!status.is_checkout);
        assert_eq!(status.head_branch, None);
    }

    #[test]
    fn clean_repo_detects_dirty() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        assert!(is_working_tree_clean(&repo).unwrap());

        std::fs::write(tmp.path().join("file.txt"), "data").unwrap();
        assert!(!is_working_tree_clean(&repo).unwrap());
    }

    #[test]
    fn ahead_behind_counts_both_sides() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let base = commit_file(&repo, "base.txt", "base", &[]);
        let base_commit = repo.find_commit(base).unwrap();
        let local = commit_file(&repo, "local.txt", "local", &[&base_commit]);
        repo.reference("refs/heads/main", local, true, "local main")
            .unwrap();
        repo.reference("refs/remotes/origin/main", base, true, "remote main")
            .unwrap();

        let (ahead, behind) =
            ahead_behind(&repo, "refs/heads/main", "refs/remotes/origin/main").unwrap();
        assert_eq!((ahead, behind), (1, 0));
    }

    #[test]
    fn compare_with_remote_tip_classifies_relation() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let base = commit_file(&repo, "base.txt", "base", &[]);
        let base_commit = repo.find_commit(base).unwrap();
        let next = commit_file(&repo, "next.txt", "next", &[&base_commit]);
        repo.reference("refs/heads/main", next, true, "local main")
            .unwrap();

        let equal = compare_with_remote_tip(tmp.path(), "main", &next.to_string()).unwrap();
        assert_eq!(equal, TipComparison::Equal);

        let ahead = compare_with_remote_tip(tmp.path(), "main", &base.to_string()).unwrap();
        assert_eq!(ahead, TipComparison::LocalAhead);

        let unknown = "0123456789abcdef0123456789abcdef01234567";
        let behind = compare_with_remote_tip(tmp.path(), "main", unknown).unwrap();
        assert_eq!(behind, TipComparison::Behind);
    }

    #[test]
    fn unborn_head_names_branch_until_first_commit() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        repo.set_head("refs/heads/trunk").unwrap();
        assert_eq!(unborn_head_branch(&repo).as_deref(), Some("trunk"));
        assert_eq!(head_branch(&repo), None);
        assert!(head_is_unborn(temp.path()));

        commit_file(&repo, "a.txt", "a", &[]);
        assert_eq!(unborn_head_branch(&repo), None);
        assert_eq!(head_branch(&repo).as_deref(), Some("trunk"));
        assert!(!head_is_unborn(temp.path()));
        assert!(!head_is_unborn(&temp.path().join("missing")));
    }
}
