//! Shutdown signal listener.

use tracing::{info, warn};

/// Resolve when the process is asked to stop. Handlers are registered
/// at startup, before any region work is in flight.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).expect("SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("SIGQUIT handler");

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    info!(signal = name, "Shutdown requested");
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!(error = %e, "Could not listen for ctrl-c"),
    }
}
