use super::*;

/// Cooperative Ctrl+C: the first press cancels `cancel` so in-flight repositories finish;
/// the second exits with 130.
pub(super) fn install_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            return;
        }
        cancel.cancel();
        if io::stderr().is_terminal() {
            eprintln!("\nCancelling, finishing current operations...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            warn!("cancellation requested, finishing current operations");
        }

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
