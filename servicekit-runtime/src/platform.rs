//! Process entry point for the foreground service.
//!
//! ## Signals
//! **Unix:** `SIGINT`, `SIGTERM` (systemd, Kubernetes), `SIGQUIT`
//!
//! **Other platforms:** Ctrl-C only

use crate::app::App;
use crate::error::AppError;
use std::pin::pin;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run `app` until a termination signal arrives, then shut it down.
///
/// Returns early if the app fails to start.
pub async fn run(app: &App) -> Result<(), AppError> {
    let shutdown = CancellationToken::new();
    let mut running = pin!(app.run(shutdown.clone()));

    tokio::select! {
        res = &mut running => return res,
        signal = wait_for_shutdown_signal() => {
            shutdown.cancel();
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for shutdown signals");
                running.await?;
                return Err(AppError::Signal(e));
            }
            info!("Received shutdown signal");
        }
    }

    running.await
}

/// Completes when the process receives a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => info!(signal = "SIGINT", "Signal received"),
        _ = sigterm.recv() => info!(signal = "SIGTERM", "Signal received"),
        _ = sigquit.recv() => info!(signal = "SIGQUIT", "Signal received"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
