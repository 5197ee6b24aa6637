//! Graceful-shutdown signal wiring: a `tokio::signal` listener feeding the
//! runtime's `should_shutdown` flag (replacing the source system's
//! `signal.signal(SIGTERM, ...)` hooks with the runtime's standard
//! cancellation primitive).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Spawn a task that waits for `SIGTERM` or `SIGINT` and then sets `flag`.
pub fn install(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::warn!("shutdown signal received, finishing in-flight work");
        flag.store(true, Ordering::SeqCst);
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::debug!("received SIGTERM"),
        _ = sigint.recv() => tracing::debug!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::debug!("received ctrl-c");
}
