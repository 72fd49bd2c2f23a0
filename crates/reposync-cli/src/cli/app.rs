use super::*;
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(command = command_label(&cli.command), "Running command");
    let paths = CliPaths::resolve(cli.config, cli.cache)?;

    match cli.command {
        Commands::Config(args) => handle_config(args, &paths),
        Commands::Token(args) => handle_token(args, &paths).await,
        Commands::List(args) => handle_list(args, &paths).await,
        Commands::Check(args) => handle_check(args, &paths).await,
        Commands::Sync(args) => handle_sync(args, &paths).await,
        Commands::Download(args) => handle_download(args, &paths).await,
        Commands::Status(args) => handle_status(args, &paths),
    }
}

/// Config and cache file locations, from flags or the platform dirs.
pub(super) struct CliPaths {
    pub(super) config: PathBuf,
    pub(super) cache: PathBuf,
}

impl CliPaths {
    fn resolve(config: Option<PathBuf>, cache: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let cache = match cache {
            Some(path) => path,
            None => default_cache_path()?,
        };
        Ok(Self { config, cache })
    }
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Config(_) => "config",
        Commands::Token(_) => "token",
        Commands::List(_) => "list",
        Commands::Check(_) => "check",
        Commands::Sync(_) => "sync",
        Commands::Download(_) => "download",
        Commands::Status(_) => "status",
    }
}
