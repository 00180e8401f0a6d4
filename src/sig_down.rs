//! Graceful shutdown on SIGTERM / SIGINT.

use tokio_util::sync::CancellationToken;

/// Returns a token that is cancelled when the process receives SIGTERM or
/// SIGINT. Installing the signal handlers can fail, so this must run inside
/// a Tokio runtime.
pub fn shutdown_token() -> Result<CancellationToken, std::io::Error> {
    let token = CancellationToken::new();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let handle = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
            }
            handle.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        let handle = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, shutting down");
            }
            handle.cancel();
        });
    }

    Ok(token)
}
