use crate::error::VcsError;
use crate::repo_status::{ahead_behind, head_branch, is_working_tree_clean, unborn_head_branch};
use git2::Repository;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status and captured output of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullReport {
    UpToDate,
    FastForwarded { branch: String, commits: usize },
}

/// The primitive git operations the sync core needs. Every call takes a timeout and
/// must return once it elapses.
pub trait VcsClient: Send + Sync {
    fn clone_repo(
        &self,
        url: &str,
        destination: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError>;

    /// Fetch `origin` and fast-forward the current branch. Never resets.
    fn pull(&self, destination: &Path, timeout: Duration) -> Result<PullReport, VcsError>;

    /// Lightweight metadata probe, `git rev-parse --git-dir`.
    fn check_metadata(&self, destination: &Path, timeout: Duration)
    -> Result<ProcessOutput, VcsError>;

    /// Tip of `branch` on `origin` without fetching objects. `None` when the branch
    /// does not exist remotely.
    fn remote_tip(
        &self,
        destination: &Path,
        branch: &str,
        timeout: Duration,
    ) -> Result<Option<String>, VcsError>;
}

/// [`VcsClient`] backed by the `git` executable. Local ref inspection goes through git2.
#[derive(Debug, Clone)]
pub struct GitCommandClient {
    program: PathBuf,
}

impl Default for GitCommandClient {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCommandClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(
        &self,
        label: &str,
        args: &[OsString],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError> {
        let mut command = Command::new(&self.program);
        if let Some(cwd) = cwd {
            command.arg("-C").arg(cwd);
        }
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if std::env::var_os("GIT_SSH_COMMAND").is_none() {
            command.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        }
        debug!(command = label, cwd = ?cwd, "running git");
        block_on_git(command, label, timeout)
    }

    fn run_checked(
        &self,
        label: &str,
        args: &[OsString],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError> {
        let output = self.run(label, args, cwd, timeout)?;
        if !output.success() {
            return Err(VcsError::CommandFailed {
                command: label.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl VcsClient for GitCommandClient {
    fn clone_repo(
        &self,
        url: &str,
        destination: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let existed = destination.exists();
        let args = [
            OsString::from("clone"),
            OsString::from("--quiet"),
            OsString::from(url),
            destination.as_os_str().to_os_string(),
        ];
        let result = self.run("clone", &args, None, timeout);
        if matches!(result, Err(VcsError::Timeout { .. })) && !existed && destination.exists() {
            warn!(path = %destination.display(), "removing partial clone after timeout");
            if let Err(err) = fs::remove_dir_all(destination) {
                warn!(path = %destination.display(), error = %err, "failed to remove partial clone");
            }
        }
        result
    }

    fn pull(&self, destination: &Path, timeout: Duration) -> Result<PullReport, VcsError> {
        let (branch, unborn) = {
            let repo = Repository::open(destination)?;
            if !is_working_tree_clean(&repo)? {
                return Err(VcsError::DirtyWorkTree);
            }
            match head_branch(&repo) {
                Some(branch) => (branch, false),
                None => {
                    let branch =
                        unborn_head_branch(&repo).ok_or_else(|| VcsError::CommandFailed {
                            command: "pull".to_string(),
                            stderr: "HEAD is not on a branch".to_string(),
                        })?;
                    (branch, true)
                }
            }
        };

        let fetch = [
            OsString::from("fetch"),
            OsString::from("--quiet"),
            OsString::from("origin"),
        ];
        self.run_checked("fetch", &fetch, Some(destination), timeout)?;

        let repo = Repository::open(destination)?;
        let local_ref = format!("refs/heads/{branch}");
        let remote_ref = format!("refs/remotes/origin/{branch}");
        if repo.refname_to_id(&remote_ref).is_err() {
            // Empty origin and empty checkout: nothing to pull yet.
            if unborn && !has_origin_branches(&repo)? {
                return Ok(PullReport::UpToDate);
            }
            return Err(VcsError::CommandFailed {
                command: "pull".to_string(),
                stderr: format!("origin has no branch {branch}"),
            });
        }
        let (ahead, behind) = if unborn {
            (0, commits_reachable(&repo, &remote_ref)?)
        } else {
            ahead_behind(&repo, &local_ref, &remote_ref)?
        };
        let report = classify_pull(&branch, ahead, behind)?;
        if matches!(report, PullReport::FastForwarded { .. }) {
            let merge = [
                OsString::from("merge"),
                OsString::from("--ff-only"),
                OsString::from("--quiet"),
                OsString::from(format!("origin/{branch}")),
            ];
            self.run_checked("merge", &merge, Some(destination), timeout)?;
        }
        Ok(report)
    }

    fn check_metadata(
        &self,
        destination: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, VcsError> {
        let args = [OsString::from("rev-parse"), OsString::from("--git-dir")];
        self.run("rev-parse", &args, Some(destination), timeout)
    }

    fn remote_tip(
        &self,
        destination: &Path,
        branch: &str,
        timeout: Duration,
    ) -> Result<Option<String>, VcsError> {
        let args = [
            OsString::from("ls-remote"),
            OsString::from("--heads"),
            OsString::from("origin"),
            OsString::from(branch),
        ];
        let output = self.run_checked("ls-remote", &args, Some(destination), timeout)?;
        Ok(parse_ls_remote(&output.stdout, branch))
    }
}

/// Ahead-only counts as up to date: there is nothing to pull.
pub(crate) fn classify_pull(
    branch: &str,
    ahead: usize,
    behind: usize,
) -> Result<PullReport, VcsError> {
    if behind == 0 {
        return Ok(PullReport::UpToDate);
    }
    if ahead > 0 {
        return Err(VcsError::DivergedHistory {
            branch: branch.to_string(),
            ahead,
            behind,
        });
    }
    Ok(PullReport::FastForwarded {
        branch: branch.to_string(),
        commits: behind,
    })
}

fn has_origin_branches(repo: &Repository) -> Result<bool, git2::Error> {
    Ok(repo
        .references_glob("refs/remotes/origin/*")?
        .filter_map(Result::ok)
        .any(|reference| reference.name() != Some("refs/remotes/origin/HEAD")))
}

fn commits_reachable(repo: &Repository, refname: &str) -> Result<usize, git2::Error> {
    let mut walk = repo.revwalk()?;
    walk.push(repo.refname_to_id(refname)?)?;
    Ok(walk.count())
}

pub(crate) fn parse_ls_remote(stdout: &str, branch: &str) -> Option<String> {
    let wanted = format!("refs/heads/{branch}");
    stdout.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let oid = parts.next()?;
        let name = parts.next()?;
        (name == wanted).then(|| oid.to_string())
    })
}

/// Drives one git invocation on a private current-thread runtime. Callers are
/// blocking worker threads, never async tasks.
fn block_on_git(
    command: Command,
    label: &str,
    timeout: Duration,
) -> Result<ProcessOutput, VcsError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_with_timeout(command, label, timeout))
}

async fn run_with_timeout(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> Result<ProcessOutput, VcsError> {
    let mut child = command.spawn().map_err(VcsError::Spawn)?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let finished = tokio::time::timeout(timeout, async {
        tokio::try_join!(read_pipe(stdout), read_pipe(stderr), child.wait())
    })
    .await;
    match finished {
        Ok(output) => {
            let (stdout, stderr, status) = output?;
            Ok(ProcessOutput {
                status: status.code(),
                stdout,
                stderr,
            })
        }
        Err(_) => {
            warn!(command = label, timeout_secs = timeout.as_secs(), "git timed out");
            if let Err(err) = child.kill().await {
                warn!(command = label, error = %err, "failed to kill timed out git");
            }
            Err(VcsError::Timeout {
                command: label.to_string(),
                timeout,
            })
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).await?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
