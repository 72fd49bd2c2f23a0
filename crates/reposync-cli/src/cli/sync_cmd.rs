use super::shared::{
    Session, acquire_run_lock, annotate_staleness, print_report, render_sync_progress,
    stdout_is_tty,
};
use super::shutdown::install_ctrl_c;
use super::*;
use std::cell::Cell;

pub(super) async fn handle_sync(args: SyncArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let session = Session::open(paths, &args.account)?;
    let username = session.identity.username.clone();
    let _lock = acquire_run_lock(&session.root, &username)?;
    let intent: SyncIntent = args.intent.into();

    let repos = session.inventory(&args.account).await?;
    let cancel = CancelFlag::new();
    install_ctrl_c(cancel.clone());
    let engine = session.engine(args.jobs);
    let (repos, _) = annotate_staleness(&engine, repos, &cancel).await?;
    if cancel.is_cancelled() {
        println!("Cancelled before the sync started.");
        return Ok(());
    }

    let show_progress = !args.quiet && !args.json && stdout_is_tty();
    let handle = engine.spawn_sync_with_cancel(repos, intent, cancel);
    let run = tokio::task::spawn_blocking(move || {
        let last_len = Cell::new(0usize);
        for event in handle.events().iter() {
            if show_progress {
                render_sync_progress(&last_len, &event);
            }
        }
        handle.join()
    })
    .await
    .context("join sync run")??;
    let report = run.report;

    let mut cache = RepoCache::load(&session.cache_path).unwrap_or_default();
    cache.record_run(&username, &report, current_timestamp());
    if let Err(err) = cache.save(&session.cache_path) {
        warn!(error = %err, "failed to save last run");
    }
    info!(
        run_id = %report.run_id,
        failed = report.statistics.failed,
        cancelled = report.cancelled,
        "sync command finished"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize sync report")?
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

