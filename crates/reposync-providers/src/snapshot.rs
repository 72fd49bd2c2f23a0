use crate::http::{build_client, send_with_retry_allow_statuses};
use anyhow::{Context, bail};
use futures::{StreamExt, future, stream};
use reposync_core::batch::CancelFlag;
use reposync_core::model::{Identity, RepositoryDescriptor};
use reposync_core::paths::downloads_path;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const FALLBACK_BRANCH: &str = "master";

/// A downloaded and validated repository archive.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub repo: String,
    pub branch: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
    pub private: bool,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResult {
    pub repo: String,
    pub snapshot: Option<Snapshot>,
    pub error: Option<String>,
}

impl SnapshotResult {
    pub fn is_success(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadSummary {
    pub successful: usize,
    pub failed: usize,
    /// In input order; repositories skipped by cancellation are absent.
    pub results: Vec<SnapshotResult>,
}

/// Branch archived for a repository: its default when that is `main` or `master`, else `main`.
pub fn choose_branch(repo: &RepositoryDescriptor) -> &str {
    match repo.default_branch.as_str() {
        "main" | "master" => repo.default_branch.as_str(),
        _ => "main",
    }
}

/// Fetches `zipball` archives from the GitHub API into the downloads tree.
pub struct SnapshotDownloader {
    client: Client,
    api_base: String,
    root: PathBuf,
}

impl SnapshotDownloader {
    pub fn new(api_base: impl Into<String>, root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(300))?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            root: root.into(),
        })
    }

    pub async fn download(
        &self,
        repo: &RepositoryDescriptor,
        identity: &Identity,
        dest_dir: Option<&Path>,
        branch: &str,
    ) -> anyhow::Result<Snapshot> {
        let token = identity.credential.trim();
        if repo.private && token.is_empty() {
            bail!("Token required for private repository");
        }
        let dir = match dest_dir {
            Some(dir) => dir.to_path_buf(),
            None => downloads_path(&self.root, &identity.username, &repo.name),
        };

        let mut branch = branch.to_string();
        loop {
            match self.fetch(repo, token, &dir, &branch).await {
                Err(FetchError::BranchNotFound) if branch == "main" => {
                    debug!(repo = %repo.name, "main not found; trying master");
                    branch = FALLBACK_BRANCH.to_string();
                }
                Err(FetchError::BranchNotFound) => {
                    bail!("Branch '{branch}' not found or not accessible")
                }
                Err(FetchError::Other(err)) => return Err(err),
                Ok(snapshot) => return Ok(snapshot),
            }
        }
    }

    /// Downloads every repository with at most `workers` transfers in flight.
    /// A failure never stops the others; cancellation stops new downloads from starting.
    pub async fn download_all(
        &self,
        repos: &[RepositoryDescriptor],
        identity: &Identity,
        dest_dir: Option<&Path>,
        workers: usize,
        cancel: &CancelFlag,
    ) -> DownloadSummary {
        let mut results: Vec<(usize, SnapshotResult)> = stream::iter(repos.iter().enumerate())
            .map(|(index, repo)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let branch = choose_branch(repo);
                let result = match self.download(repo, identity, dest_dir, branch).await {
                    Ok(snapshot) => SnapshotResult {
                        repo: repo.name.clone(),
                        snapshot: Some(snapshot),
                        error: None,
                    },
                    Err(err) => {
                        warn!(repo = %repo.name, error = %err, "snapshot download failed");
                        SnapshotResult {
                            repo: repo.name.clone(),
                            snapshot: None,
                            error: Some(format!("{err:#}")),
                        }
                    }
                };
                Some((index, result))
            })
            .buffer_unordered(workers.max(1))
            .filter_map(future::ready)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let successful = results.iter().filter(|(_, result)| result.is_success()).count();
        DownloadSummary {
            successful,
            failed: results.len() - successful,
            results: results.into_iter().map(|(_, result)| result).collect(),
        }
    }

    fn request(&self, url: &str, token: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if token.is_empty() {
            builder
        } else {
            builder.bearer_auth(token)
        }
    }

    async fn fetch(
        &self,
        repo: &RepositoryDescriptor,
        token: &str,
        dir: &Path,
        branch: &str,
    ) -> Result<Snapshot, FetchError> {
        let url = format!("{}/repos/{}/zipball/{branch}", self.api_base, repo.full_name);
        let allowed = [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ];
        let sent =
            send_with_retry_allow_statuses(|| Ok(self.request(&url, token)), &allowed).await;
        let mut response = match sent {
            Ok(response) => response,
            Err(err) => {
                let status = err
                    .downcast_ref::<reqwest::Error>()
                    .and_then(reqwest::Error::status);
                return Err(match status {
                    Some(status) => anyhow::anyhow!("HTTP {}", status.as_u16()).into(),
                    None => err.context("download snapshot").into(),
                });
            }
        };
        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(anyhow::anyhow!("Invalid or expired token").into());
            }
            StatusCode::FORBIDDEN => {
                let exhausted = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .is_some_and(|value| value == "0");
                let body = response.text().await.unwrap_or_default().to_lowercase();
                let message = if exhausted || body.contains("rate limit") {
                    "Rate limit exceeded; wait before trying again"
                } else {
                    "Insufficient permissions; the token may need the repo scope"
                };
                return Err(anyhow::anyhow!(message).into());
            }
            StatusCode::NOT_FOUND => return Err(FetchError::BranchNotFound),
            _ => {}
        }

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(snapshot_file_name(branch, repo.private, OffsetDateTime::now_utc()));
        let (size_bytes, sha256) = match write_body(&mut response, &path).await {
            Ok(written) => written,
            Err(err) => {
                warn!(
                    repo = %repo.name,
                    path = %path.display(),
                    error = %err,
                    "snapshot stream failed"
                );
                discard(&path).await;
                return Err(err.into());
            }
        };
        if size_bytes == 0 {
            discard(&path).await;
            return Err(anyhow::anyhow!("Download failed: empty file").into());
        }
        let check_path = path.clone();
        let validated = tokio::task::spawn_blocking(move || validate_zip(&check_path))
            .await
            .context("join zip validation")?;
        let entries = match validated {
            Ok(entries) => entries,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "zip validation failed");
                discard(&path).await;
                return Err(anyhow::anyhow!("Downloaded file is not a valid ZIP archive").into());
            }
        };

        info!(repo = %repo.name, branch, size_bytes, path = %path.display(), "snapshot downloaded");
        Ok(Snapshot {
            repo: repo.name.clone(),
            branch: branch.to_string(),
            path,
            size_bytes,
            sha256,
            private: repo.private,
            entries,
        })
    }
}

enum FetchError {
    BranchNotFound,
    Other(anyhow::Error),
}

impl From<anyhow::Error> for FetchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err)
    }
}

/// Streams the body into `path`, returning its size and hex sha256.
async fn write_body(
    response: &mut reqwest::Response,
    path: &Path,
) -> anyhow::Result<(u64, String)> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut size_bytes = 0u64;
    while let Some(chunk) = response.chunk().await.context("read snapshot body")? {
        hasher.update(&chunk);
        size_bytes += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("write {}", path.display()))?;
    }
    file.flush().await.context("flush snapshot")?;
    Ok((size_bytes, hex::encode(hasher.finalize())))
}

async fn discard(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "failed to remove rejected snapshot");
    }
}

fn snapshot_file_name(branch: &str, private: bool, now: OffsetDateTime) -> String {
    let visibility = if private { "private" } else { "public" };
    format!(
        "{}_{visibility}_{:04}{:02}{:02}_{:02}{:02}{:02}.zip",
        branch.replace('/', "-"),
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Reads every entry to the end so the zip reader verifies its CRC.
fn validate_zip(path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("open zip archive")?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).context("read zip entry")?;
        std::io::copy(&mut entry, &mut std::io::sink())
            .with_context(|| format!("check entry {}", entry.name()))?;
    }
    Ok(archive.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;

    fn zip_bytes() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("hello-main/README.md", options).unwrap();
        writer.write_all(b"# hello\n").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn repo(name: &str, default_branch: &str, private: bool) -> RepositoryDescriptor {
        let mut repo = RepositoryDescriptor::new(name, None);
        repo.full_name = format!("octocat/{name}");
        repo.default_branch = default_branch.to_string();
        repo.private = private;
        repo
    }

    fn zips_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|ext| ext == "zip"))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn branch_choice_prefers_main_or_master() {
        assert_eq!(choose_branch(&repo("a", "master", false)), "master");
        assert_eq!(choose_branch(&repo("a", "main", false)), "main");
        assert_eq!(choose_branch(&repo("a", "develop", false)), "main");
    }

    #[test]
    fn file_name_carries_branch_visibility_and_time() {
        let now = OffsetDateTime::from_unix_timestamp(1_709_622_489).unwrap();
        assert_eq!(
            snapshot_file_name("main", false, now),
            "main_public_20240305_070809.zip"
        );
        assert_eq!(
            snapshot_file_name("release/1.0", true, now),
            "release-1.0_private_20240305_070809.zip"
        );
    }

    #[tokio::test]
    async fn downloads_and_hashes_public_snapshot() {
        let server = MockServer::start().await;
        let body = zip_bytes();
        Mock::given(method("GET"))
            .and(path("/repos/octocat/hello/zipball/main"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/zip")
                    .set_body_bytes(body.clone()),
            )
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new(server.uri(), root.path()).unwrap();
        let identity = Identity::new("octocat", "");
        let snapshot = downloader
            .download(&repo("hello", "main", false), &identity, None, "main")
            .await
            .unwrap();

        let expected_dir = downloads_path(root.path(), "octocat", "hello");
        assert_eq!(snapshot.path.parent(), Some(expected_dir.as_path()));
        let file_name = snapshot.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("main_public_"));
        assert_eq!(snapshot.size_bytes, body.len() as u64);
        assert_eq!(snapshot.sha256, hex::encode(Sha256::digest(&body)));
        assert_eq!(snapshot.entries, 1);
        assert!(snapshot.path.exists());
    }

    #[tokio::test]
    async fn missing_main_falls_back_to_master() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/old/zipball/main"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/old/zipball/master"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes()))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new(server.uri(), root.path()).unwrap();
        let snapshot = downloader
            .download(
                &repo("old", "main", true),
                &Identity::new("octocat", "secret"),
                Some(root.path()),
                "main",
            )
            .await
            .unwrap();
        assert_eq!(snapshot.branch, "master");
        assert!(snapshot.private);
        assert_eq!(snapshot.path.parent(), Some(root.path()));
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_no_partial_file() {
        // Promise more bytes than are sent, then hang up mid-body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/zip\r\n\
                      content-length: 65536\r\n\r\nPK\x03\x04partial archive bytes",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new(format!("http://{addr}"), root.path()).unwrap();
        let result = downloader
            .download(
                &repo("cut", "main", false),
                &Identity::new("octocat", ""),
                Some(root.path()),
                "main",
            )
            .await;
        server.await.unwrap();

        assert!(result.is_err());
        assert!(zips_in(root.path()).is_empty());
    }

    #[tokio::test]
    async fn invalid_archive_is_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/broken/zipball/main"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a zip</html>"))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new(server.uri(), root.path()).unwrap();
        let err = downloader
            .download(
                &repo("broken", "main", false),
                &Identity::new("octocat", ""),
                Some(root.path()),
                "main",
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a valid ZIP archive"));
        assert!(zips_in(root.path()).is_empty());
    }

    async fn failure_message(downloader: &SnapshotDownloader, name: &str) -> String {
        downloader
            .download(
                &repo(name, "main", false),
                &Identity::new("octocat", "secret"),
                None,
                "main",
            )
            .await
            .unwrap_err()
            .to_string()
    }

    #[tokio::test]
    async fn status_codes_map_to_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/denied/zipball/main"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/limited/zipball/main"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("API rate limit exceeded for user"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/teapot/zipball/main"))
            .respond_with(ResponseTemplate::new(418))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new(server.uri(), root.path()).unwrap();
        assert!(failure_message(&downloader, "denied").await.contains("Invalid or expired token"));
        assert!(failure_message(&downloader, "limited").await.contains("Rate limit exceeded"));
        assert_eq!(failure_message(&downloader, "teapot").await, "HTTP 418");
    }

    #[tokio::test]
    async fn private_repo_requires_token() {
        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new("http://127.0.0.1:9", root.path()).unwrap();
        let err = downloader
            .download(
                &repo("secret", "main", true),
                &Identity::new("octocat", "  "),
                None,
                "main",
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Token required"));
    }

    #[tokio::test]
    async fn download_all_aggregates_and_honours_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/good/zipball/master"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/bad/zipball/main"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let downloader = SnapshotDownloader::new(server.uri(), root.path()).unwrap();
        let identity = Identity::new("octocat", "");
        let repos = vec![repo("good", "master", false), repo("bad", "develop", false)];

        let summary = downloader
            .download_all(&repos, &identity, None, 2, &CancelFlag::new())
            .await;
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[0].repo, "good");
        assert!(summary.results[0].is_success());
        assert_eq!(summary.results[1].error.as_deref(), Some("HTTP 500"));

        let cancel = CancelFlag::new();
        cancel.cancel();
        let summary = downloader
            .download_all(&repos, &identity, None, 2, &cancel)
            .await;
        assert!(summary.results.is_empty());
    }
}
