use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Returns a token cancelled on SIGTERM or ctrl-c. The dashboard server
/// watches it and drains gracefully.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();

    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    tracing::error!(%error, "failed to listen for ctrl-c");
                    return;
                }
                tracing::info!("received ctrl-c, shutting down");
            }
        }

        handle.cancel();
    });

    token
}
