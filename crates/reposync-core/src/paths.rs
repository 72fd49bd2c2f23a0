use std::path::{Path, PathBuf};

const REPOSITORIES_DIR: &str = "repositories";
const DOWNLOADS_DIR: &str = "downloads";
const LOCK_FILE: &str = ".reposync.lock";

pub fn user_root(root: &Path, username: &str) -> PathBuf {
    root.join(sanitize_component(username))
}

/// `<root>/<username>/repositories`
pub fn repositories_root(root: &Path, username: &str) -> PathBuf {
    user_root(root, username).join(REPOSITORIES_DIR)
}

/// `<root>/<username>/repositories/<repo>`
pub fn repo_path(root: &Path, username: &str, repo: &str) -> PathBuf {
    repo_dir(&repositories_root(root, username), repo)
}

/// Checkout directory for `repo` under an already resolved repositories root.
pub fn repo_dir(repositories_root: &Path, repo: &str) -> PathBuf {
    repositories_root.join(sanitize_component(repo))
}

/// `<root>/<username>/downloads/<repo>`
pub fn downloads_path(root: &Path, username: &str, repo: &str) -> PathBuf {
    user_root(root, username)
        .join(DOWNLOADS_DIR)
        .join(sanitize_component(repo))
}

pub fn lock_path(root: &Path, username: &str) -> PathBuf {
    user_root(root, username).join(LOCK_FILE)
}

/// A directory only counts as a checkout when its git metadata is present.
pub fn has_git_metadata(path: &Path) -> bool {
    path.join(".git").exists()
}

fn sanitize_component(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();
    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
