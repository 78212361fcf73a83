//! Shutdown signals.
//!
//! The first SIGINT or SIGTERM cancels the root token and starts the
//! shutdown deadline. A second signal of the same kind, or the deadline
//! passing, exits with status 1.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::exit::GENERAL_ERROR;

pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Spawn the signal watcher. Must be called inside the runtime.
pub fn install(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = watch(cancel).await {
            tracing::warn!("failed to install signal handlers: {e}");
        }
    });
}

fn force_exit(reason: &str) -> ! {
    tracing::error!("{reason}, exiting");
    std::process::exit(i32::from(GENERAL_ERROR));
}

#[cfg(unix)]
async fn watch(cancel: CancellationToken) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let first_was_interrupt = tokio::select! {
        _ = interrupt.recv() => true,
        _ = terminate.recv() => false,
    };
    let name = if first_was_interrupt { "SIGINT" } else { "SIGTERM" };
    tracing::info!("received {name}, shutting down");
    cancel.cancel();

    let again = async {
        if first_was_interrupt {
            interrupt.recv().await
        } else {
            terminate.recv().await
        }
    };
    tokio::select! {
        _ = again => force_exit(&format!("second {name}")),
        _ = tokio::time::sleep(SHUTDOWN_DEADLINE) => force_exit("shutdown deadline exceeded"),
    }
}

#[cfg(not(unix))]
async fn watch(cancel: CancellationToken) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl-c, shutting down");
    cancel.cancel();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => force_exit("second ctrl-c"),
        _ = tokio::time::sleep(SHUTDOWN_DEADLINE) => force_exit("shutdown deadline exceeded"),
    }
}
