//! Ctrl+C / SIGTERM handling

use casmutex_core::CancelSignal;
use tracing::{info, warn};

/// Fire `signal` on Ctrl+C or SIGTERM so waiting acquisitions give up.
pub fn cancel_on_shutdown(signal: CancelSignal) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, cancelling pending acquisitions");
            }
            _ = terminate => {
                info!("Received SIGTERM, cancelling pending acquisitions");
            }
        }

        signal.cancel();
    });
}
