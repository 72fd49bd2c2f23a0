use super::*;

pub(super) async fn handle_token(args: TokenArgs, paths: &CliPaths) -> anyhow::Result<()> {
    match args.command {
        TokenCommands::Set(args) => handle_set_token(args, paths).await,
        TokenCommands::Validate(args) => handle_validate_token(args, paths).await,
    }
}

async fn handle_set_token(args: SetTokenArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let config = AppConfig::load(&paths.config)?;
    let username = token_username(args.username.as_deref(), &config)?;
    let token = args.token.trim();
    if !args.no_validate {
        let identity = Identity::new(username.clone(), token);
        GitHubDirectory::new(config.api_host.clone())?
            .validate_identity(&identity)
            .await
            .context("token validation failed; nothing stored")?;
    }
    auth::set_token(&username, token)?;
    auth::get_token(&username).context("read token from keyring after write")?;
    info!(user = %username, "token stored");
    println!("Token stored for {username}");
    Ok(())
}

async fn handle_validate_token(args: ValidateTokenArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let config = AppConfig::load(&paths.config)?;
    let username = token_username(args.username.as_deref(), &config)?;
    let token = auth::get_token(&username)?;
    GitHubDirectory::new(config.api_host.clone())?
        .validate_identity(&Identity::new(username.clone(), token))
        .await?;
    println!("Token for {username} is valid");
    Ok(())
}

fn token_username(explicit: Option<&str>, config: &AppConfig) -> anyhow::Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| config.username.clone())
        .filter(|name| !name.trim().is_empty())
        .context("no GitHub username; pass --username or run `reposync config init`")
}
