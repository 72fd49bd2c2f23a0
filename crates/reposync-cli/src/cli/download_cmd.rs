use super::shared::Session;
use super::shutdown::install_ctrl_c;
use super::*;

pub(super) async fn handle_download(args: DownloadArgs, paths: &CliPaths) -> anyhow::Result<()> {
    let session = Session::open(paths, &args.account)?;
    let repos = session.inventory(&args.account).await?;
    if repos.is_empty() {
        println!("No repositories to download.");
        return Ok(());
    }
    let workers = args.workers.unwrap_or(session.config.download_workers).max(1);
    let cancel = CancelFlag::new();
    install_ctrl_c(cancel.clone());

    let downloader = SnapshotDownloader::new(session.config.api_host.clone(), session.root.clone())?;
    let summary = downloader
        .download_all(
            &repos,
            &session.identity,
            args.dest.as_deref(),
            workers,
            &cancel,
        )
        .await;
    info!(
        successful = summary.successful,
        failed = summary.failed,
        workers,
        "download finished"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize download summary")?
        );
        return Ok(());
    }
    for result in &summary.results {
        match (&result.snapshot, &result.error) {
            (Some(snapshot), _) => println!(
                "{} | {} | {} bytes | sha256={} | {}",
                result.repo,
                snapshot.branch,
                snapshot.size_bytes,
                snapshot.sha256,
                snapshot.path.display()
            ),
            (None, error) => println!(
                "{} | failed | {}",
                result.repo,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    if cancel.is_cancelled() {
        println!(
            "Cancelled; {} of {} repositories attempted.",
            summary.results.len(),
            repos.len()
        );
    }
    println!(
        "Downloaded {}, failed {}",
        summary.successful, summary.failed
    );
    Ok(())
}
