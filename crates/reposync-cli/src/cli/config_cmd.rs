use super::*;
pub(super) fn handle_config(args: ConfigArgs, paths: &CliPaths) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Init(args) => handle_init(args, paths),
        ConfigCommands::Show => handle_show(paths),
    }
}

pub(super) fn handle_init(args: InitArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let username = args.username.trim();
    if username.is_empty() {
        anyhow::bail!("username must not be empty");
    }
    if args.root.exists() && !args.root.is_dir() {
        anyhow::bail!("root {} is not a directory", args.root.display());
    }
    let mut config = AppConfig::load(&paths.config)?;
    config.root = Some(args.root);
    config.username = Some(username.to_string());
    if let Some(api_host) = args.api_host {
        config.api_host = api_host;
    }
    config.save(&paths.config)?;
    info!(path = %paths.config.display(), "config saved");
    println!("Config saved to {}", paths.config.display());
    Ok(())
}

fn handle_show(paths: &CliPaths) -> anyhow::Result<()> {
    let config = AppConfig::load(&paths.config)?;
    println!("config: {}", paths.config.display());
    println!("cache:  {}", paths.cache.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("serialize config")?
    );
    Ok(())
}
