use super::*;
#[derive(Parser)]
#[command(author, version, about)]
pub(super) struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to the platform config dir)")]
    pub(super) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Cache file (defaults to the platform cache dir)")]
    pub(super) cache: Option<PathBuf>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Manage config")]
    Config(ConfigArgs),
    #[command(about = "Manage the GitHub token")]
    Token(TokenArgs),
    #[command(about = "List remote repositories with their local state")]
    List(ListArgs),
    #[command(about = "Check which local copies are behind origin")]
    Check(CheckArgs),
    #[command(about = "Clone or update local copies")]
    Sync(SyncArgs),
    #[command(about = "Download ZIP snapshots of repositories")]
    Download(DownloadArgs),
    #[command(about = "Show the last run and local checkout status")]
    Status(StatusArgs),
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Initialize config with a storage root and GitHub username")]
    Init(InitArgs),
    #[command(about = "Print the effective config")]
    Show,
}

#[derive(Parser)]
pub(super) struct InitArgs {
    #[arg(long)]
    pub(super) root: PathBuf,
    #[arg(long)]
    pub(super) username: String,
    #[arg(long, help = "GitHub API base URL")]
    pub(super) api_host: Option<String>,
}

#[derive(Parser)]
pub(super) struct TokenArgs {
    #[command(subcommand)]
    pub(super) command: TokenCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum TokenCommands {
    #[command(about = "Store a GitHub token in the system keyring")]
    Set(SetTokenArgs),
    #[command(about = "Check the stored token against the GitHub API")]
    Validate(ValidateTokenArgs),
}

#[derive(Parser)]
pub(super) struct SetTokenArgs {
    #[arg(long)]
    pub(super) username: Option<String>,
    #[arg(long)]
    pub(super) token: String,
    #[arg(long, help = "Store without asking GitHub whether the token works")]
    pub(super) no_validate: bool,
}

#[derive(Parser)]
pub(super) struct ValidateTokenArgs {
    #[arg(long)]
    pub(super) username: Option<String>,
}

/// Identity and inventory options shared by the commands that talk to GitHub.
#[derive(clap::Args, Clone, Default)]
pub(super) struct AccountArgs {
    #[arg(long, help = "Override the configured GitHub username")]
    pub(super) username: Option<String>,
    #[arg(long, env = "REPOSYNC_TOKEN", hide_env_values = true)]
    pub(super) token: Option<String>,
    #[arg(long, help = "Ignore the cached repository inventory")]
    pub(super) refresh: bool,
    #[arg(long, help = "Include archived repositories")]
    pub(super) include_archived: bool,
    #[arg(long = "repo", help = "Limit to these repository names")]
    pub(super) repos: Vec<String>,
}

#[derive(Parser)]
pub(super) struct ListArgs {
    #[command(flatten)]
    pub(super) account: AccountArgs,
    #[arg(long)]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct CheckArgs {
    #[command(flatten)]
    pub(super) account: AccountArgs,
    #[arg(long)]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct SyncArgs {
    #[command(flatten)]
    pub(super) account: AccountArgs,
    #[arg(long, value_enum, default_value_t = IntentValue::SyncAll)]
    pub(super) intent: IntentValue,
    #[arg(long, help = "Concurrent clone/pull operations")]
    pub(super) jobs: Option<usize>,
    #[arg(long, help = "Print the report as JSON")]
    pub(super) json: bool,
    #[arg(long, help = "Hide the progress line")]
    pub(super) quiet: bool,
}

#[derive(Parser)]
pub(super) struct DownloadArgs {
    #[command(flatten)]
    pub(super) account: AccountArgs,
    #[arg(long)]
    pub(super) workers: Option<usize>,
    #[arg(long, help = "Write archives here instead of the downloads tree")]
    pub(super) dest: Option<PathBuf>,
    #[arg(long)]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct StatusArgs {
    #[arg(long)]
    pub(super) username: Option<String>,
    #[arg(long)]
    pub(super) json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum IntentValue {
    SyncAll,
    UpdateNeeded,
    CloneMissing,
    Repair,
    RecloneAll,
}

impl From<IntentValue> for SyncIntent {
    fn from(value: IntentValue) -> Self {
        match value {
            IntentValue::SyncAll => SyncIntent::SyncAll,
            IntentValue::UpdateNeeded => SyncIntent::UpdateNeeded,
            IntentValue::CloneMissing => SyncIntent::CloneMissing,
            IntentValue::Repair => SyncIntent::SyncWithRepair,
            IntentValue::RecloneAll => SyncIntent::RecloneAll,
        }
    }
}
