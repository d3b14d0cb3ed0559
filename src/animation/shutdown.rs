use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Turns Ctrl-C into a cancellation of the token. Returns as soon as the token is cancelled from
/// anywhere else too, e.g. the tray's Exit entry.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
