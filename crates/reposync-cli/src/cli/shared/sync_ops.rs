use super::*;

/// Everything a GitHub-facing command needs: config, storage root and identity.
pub(in crate::cli) struct Session {
    pub(in crate::cli) config: AppConfig,
    pub(in crate::cli) root: PathBuf,
    pub(in crate::cli) identity: Identity,
    pub(in crate::cli) cache_path: PathBuf,
}

impl Session {
    pub(in crate::cli) fn open(paths: &CliPaths, account: &AccountArgs) -> anyhow::Result<Self> {
        let (config, root, username) = load_root_and_user(paths, account.username.as_deref())?;
        let token = auth::resolve_token(&username, account.token.as_deref())?;
        Ok(Self {
            config,
            root,
            identity: Identity::new(username, token),
            cache_path: paths.cache.clone(),
        })
    }

    pub(in crate::cli) fn directory(&self) -> anyhow::Result<GitHubDirectory> {
        GitHubDirectory::new(self.config.api_host.clone())
    }

    /// Engine over the configured timeouts; `jobs` overrides clone/pull concurrency.
    pub(in crate::cli) fn engine(&self, jobs: Option<usize>) -> SyncEngine {
        let mut options = self.config.sync_options();
        if let Some(jobs) = jobs {
            options.concurrency = jobs.max(1);
        }
        let mut engine = SyncEngine::new(
            Arc::new(GitCommandClient::default()),
            self.root.clone(),
            options,
        );
        engine.set_identity(
            self.identity.username.clone(),
            self.identity.credential.clone(),
        );
        engine
    }

    /// Repository inventory, from the cache while it is fresh, filtered by `account`.
    pub(in crate::cli) async fn inventory(
        &self,
        account: &AccountArgs,
    ) -> anyhow::Result<Vec<RepositoryDescriptor>> {
        let username = &self.identity.username;
        let now = current_timestamp();
        let mut cache = RepoCache::load(&self.cache_path).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring unreadable cache");
            RepoCache::default()
        });

        let cached = if account.refresh {
            None
        } else {
            cache
                .fresh_inventory(username, now, INVENTORY_TTL_SECS)
                .map(<[RepositoryDescriptor]>::to_vec)
        };
        let repos = match cached {
            Some(repos) => {
                info!(user = %username, count = repos.len(), "using cached inventory");
                repos
            }
            None => {
                let directory = self.directory()?;
                let repos = directory
                    .list_repositories(&self.identity)
                    .await
                    .with_context(|| format!("list repositories for {username}"))?;
                cache.record_inventory(username, &repos, now);
                if let Err(err) = cache.save(&self.cache_path) {
                    warn!(error = %err, "failed to save inventory cache");
                }
                repos
            }
        };
        Ok(select_repos(repos, account.include_archived, &account.repos))
    }
}

/// Config plus the storage root and username, without touching the keyring.
pub(in crate::cli) fn load_root_and_user(
    paths: &CliPaths,
    username: Option<&str>,
) -> anyhow::Result<(AppConfig, PathBuf, String)> {
    let config = AppConfig::load(&paths.config)?;
    let root = config
        .root
        .clone()
        .context("config missing root; run `reposync config init`")?;
    let username = username
        .map(str::to_string)
        .or_else(|| config.username.clone())
        .filter(|name| !name.trim().is_empty())
        .context("no GitHub username; pass --username or run `reposync config init`")?;
    Ok((config, root, username))
}

/// Drops archived repositories unless asked for, then narrows to `names` when any are given.
pub(in crate::cli) fn select_repos(
    repos: Vec<RepositoryDescriptor>,
    include_archived: bool,
    names: &[String],
) -> Vec<RepositoryDescriptor> {
    for name in names {
        if !repos.iter().any(|repo| repo.name.eq_ignore_ascii_case(name)) {
            warn!(repo = %name, "repository not found in inventory");
        }
    }
    repos
        .into_iter()
        .filter(|repo| include_archived || !repo.archived || is_named(repo, names))
        .filter(|repo| names.is_empty() || is_named(repo, names))
        .collect()
}

fn is_named(repo: &RepositoryDescriptor, names: &[String]) -> bool {
    names.iter().any(|name| repo.name.eq_ignore_ascii_case(name))
}

/// Runs the staleness check off the async runtime; git subprocesses block.
pub(in crate::cli) async fn annotate_staleness(
    engine: &SyncEngine,
    repos: Vec<RepositoryDescriptor>,
    cancel: &CancelFlag,
) -> anyhow::Result<(Vec<RepositoryDescriptor>, HashMap<String, StalenessReport>)> {
    let engine = engine.clone();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut repos = repos;
        let reports = engine.check_staleness(&mut repos, &cancel)?;
        Ok((repos, reports))
    })
    .await
    .context("join staleness check")?
}

/// Holds the per-user run lock; errors naming the holder when another run owns it.
pub(in crate::cli) fn acquire_run_lock(root: &Path, username: &str) -> anyhow::Result<LockFile> {
    match LockFile::try_acquire_for(root, username)? {
        Some(lock) => Ok(lock),
        None => {
            let path = lock_path(root, username);
            let holder = read_holder(&path).unwrap_or_else(|| "unknown holder".to_string());
            anyhow::bail!(
                "another reposync run holds {} ({holder})",
                path.display()
            )
        }
    }
}
