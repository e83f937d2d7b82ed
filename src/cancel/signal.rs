//! # Root token driven by OS termination signals.
//!
//! [`shutdown_token`] returns a [`CancelToken`] that fires when the process receives a
//! termination signal, so an embedding application can use it as the root of its
//! pipelines and stewards.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT`
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use super::CancelToken;

/// Returns a root token cancelled on the first termination signal.
///
/// Signal listeners are registered eagerly; registration errors are returned.
/// The listening activity exits early if the token is cancelled by other means.
/// Must be called within a tokio runtime.
#[cfg(unix)]
pub fn shutdown_token() -> std::io::Result<CancelToken> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let token = CancelToken::new();
    let fire = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = fire.cancelled() => return,
            _ = sigint.recv()  => {},
            _ = sigterm.recv() => {},
            _ = sigquit.recv() => {},
        }
        tracing::info!("termination signal received; cancelling root token");
        fire.cancel();
    });
    Ok(token)
}

/// Returns a root token cancelled on the first termination signal.
///
/// Must be called within a tokio runtime.
#[cfg(not(unix))]
pub fn shutdown_token() -> std::io::Result<CancelToken> {
    let token = CancelToken::new();
    let fire = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = fire.cancelled() => return,
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    tracing::warn!(error = %err, "ctrl-c listener failed");
                    return;
                }
            }
        }
        tracing::info!("termination signal received; cancelling root token");
        fire.cancel();
    });
    Ok(token)
}
