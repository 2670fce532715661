// OS interrupt handling for the serve loop
// Decision: The interrupt is delivered on a watch channel so several pollers can observe it
// Decision: SIGINT everywhere, SIGTERM as well on Unix (container stop)

use tokio::sync::watch;
use tracing::{info, warn};

/// Channel that flips to `true` once the process receives an interrupt
///
/// Must be called from within a tokio runtime.
pub fn interrupt_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_os_interrupt().await;
        info!("Received shutdown signal");
        let _ = tx.send(true);
    });

    rx
}

/// Wait until the channel carries `true` or its sender is gone
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(unix)]
async fn wait_for_os_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl-C only");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_os_interrupt() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
