use super::shared::{epoch_to_label, format_duration, load_root_and_user, yes_no};
use super::*;
use reposync_core::paths::repositories_root;
use std::time::Duration;

pub(super) fn handle_status(args: StatusArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let (_, root, username) = load_root_and_user(paths, args.username.as_deref())?;
    let cache = RepoCache::load(&paths.cache).unwrap_or_default();
    let last_run = cache.last_run(&username);

    let base = repositories_root(&root, &username);
    let mut names: Vec<String> = match std::fs::read_dir(&base) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();

    let mut checkouts = Vec::with_capacity(names.len());
    for name in names {
        let path = repo_path(&root, &username, &name);
        match compute_repo_status(&path) {
            Ok(status) => checkouts.push((name, status)),
            Err(err) => warn!(repo = %name, error = %err, "failed to read checkout status"),
        }
    }

    if args.json {
        let checkouts: HashMap<&str, _> = checkouts
            .iter()
            .map(|(name, status)| (name.as_str(), status))
            .collect();
        let payload = serde_json::json!({
            "username": username,
            "repositories_root": base,
            "last_run": last_run,
            "checkouts": checkouts,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("serialize status")?
        );
        return Ok(());
    }

    println!("user: {username}");
    println!("repositories: {}", base.display());
    match last_run {
        Some(run) => {
            println!(
                "last run: {} at {} | {} selected | ok={} skipped={} failed={} | {}{}",
                run.intent,
                epoch_to_label(run.finished_at),
                run.selected,
                run.succeeded,
                run.skipped,
                run.failed,
                format_duration(Duration::from_secs_f64(run.total_secs.max(0.0))),
                if run.cancelled { " | cancelled" } else { "" }
            );
            for name in &run.failed_repos {
                println!("  failed: {name}");
            }
        }
        None => println!("last run: never"),
    }
    if checkouts.is_empty() {
        println!("No local checkouts.");
        return Ok(());
    }
    for (name, status) in &checkouts {
        if !status.is_checkout {
            println!("{name} | not a git checkout");
            continue;
        }
        let ahead_behind = match (status.ahead, status.behind) {
            (Some(ahead), Some(behind)) => format!("+{ahead}/-{behind}"),
            _ => "no upstream".to_string(),
        };
        println!(
            "{name} | {} | {ahead_behind} | clean={} | head={}",
            status.head_branch.as_deref().unwrap_or("(detached)"),
            status.clean.map(yes_no).unwrap_or("?"),
            status
                .head_commit_time
                .map(epoch_to_label)
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}
