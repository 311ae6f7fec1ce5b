use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Fire the server's shutdown token on Ctrl+C or SIGTERM.
///
/// Spawned once per run; shares the token with the `/shutdown` endpoint so
/// both triggers drive the same stop sequence. If a signal handler cannot
/// be installed the watcher logs the failure and stands down, leaving
/// `/shutdown` as the only stop trigger.
pub async fn watch_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, beginning graceful shutdown");
        }
        _ = terminate => {
            warn!("Received SIGTERM, beginning graceful shutdown");
        }
    }

    shutdown.cancel();
}
