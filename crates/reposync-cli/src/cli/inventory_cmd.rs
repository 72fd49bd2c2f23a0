use super::shared::{Session, annotate_staleness, yes_no};
use super::shutdown::install_ctrl_c;
use super::*;
use reposync_core::paths::has_git_metadata;

pub(super) async fn handle_list(args: ListArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let session = Session::open(paths, &args.account)?;
    let mut repos = session.inventory(&args.account).await?;
    for repo in &mut repos {
        let path = repo_path(&session.root, &session.identity.username, &repo.name);
        repo.local_exists = has_git_metadata(&path);
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&repos).context("serialize inventory")?
        );
        return Ok(());
    }
    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }
    for repo in &repos {
        println!(
            "{} | {} | branch={} | archived={} | local={} | pushed={}",
            repo.name,
            if repo.private { "private" } else { "public" },
            repo.default_branch,
            yes_no(repo.archived),
            yes_no(repo.local_exists),
            repo.updated_at.as_deref().unwrap_or("-")
        );
    }
    let local = repos.iter().filter(|repo| repo.local_exists).count();
    println!("{} repositories, {local} checked out locally", repos.len());
    Ok(())
}

pub(super) async fn handle_check(args: CheckArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let session = Session::open(paths, &args.account)?;
    let repos = session.inventory(&args.account).await?;
    let cancel = CancelFlag::new();
    install_ctrl_c(cancel.clone());
    let (repos, reports) = annotate_staleness(&session.engine(None), repos, &cancel).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("serialize staleness reports")?
        );
        return Ok(());
    }
    let mut stale = 0usize;
    for repo in &repos {
        let Some(report) = reports.get(&repo.name) else {
            continue;
        };
        if report.needs_update {
            stale += 1;
        }
        let state = if report.needs_update { "stale" } else { "fresh" };
        println!("{} | {state} | {}", repo.name, report.reason);
    }
    if cancel.is_cancelled() {
        println!("Cancelled; {} of {} checked.", reports.len(), repos.len());
    }
    println!("{stale} of {} repositories need an update", reports.len());
    Ok(())
}
