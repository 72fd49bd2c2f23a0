use anyhow::Context;
use keyring::Entry;

const SERVICE: &str = "reposync";

/// Token stored for `username` in the platform keyring.
pub fn get_token(username: &str) -> anyhow::Result<String> {
    let entry = Entry::new(SERVICE, username).context("open keyring entry")?;
    entry.get_password().context("read token from keyring")
}

pub fn set_token(username: &str, token: &str) -> anyhow::Result<()> {
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("refusing to store an empty token for {username}");
    }
    let entry = Entry::new(SERVICE, username).context("open keyring entry")?;
    entry
        .set_password(token)
        .context("write token to keyring")
}

pub fn delete_token(username: &str) -> anyhow::Result<()> {
    let entry = Entry::new(SERVICE, username).context("open keyring entry")?;
    entry
        .delete_credential()
        .context("delete token from keyring")
}

/// Prefers an explicit token; falls back to the keyring.
pub fn resolve_token(username: &str, explicit: Option<&str>) -> anyhow::Result<String> {
    match explicit.map(str::trim).filter(|token| !token.is_empty()) {
        Some(token) => Ok(token.to_string()),
        None => get_token(username).with_context(|| {
            format!("no token for {username}; run `reposync token set` or pass --token")
        }),
    }
}
