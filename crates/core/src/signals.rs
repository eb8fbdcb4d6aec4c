//! Interrupt handling for batch operations.
//!
//! The synchronizer checks the flag between entries, so an interrupt lets
//! the in-flight git process finish and then stops the batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

/// Shared shutdown flag checked by batch loops.
pub type ShutdownFlag = Arc<AtomicBool>;

/// Create a flag that is never set by a signal.
pub fn new_flag() -> ShutdownFlag {
    Arc::new(AtomicBool::new(false))
}

/// Create a new shutdown flag and register OS signal handlers.
///
/// On SIGTERM or SIGINT (Ctrl+C), the flag is set to `true`. Must be called
/// from within a tokio runtime.
pub fn setup_signal_handlers() -> ShutdownFlag {
    let flag = new_flag();
    let flag_clone = flag.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), stopping after current entry");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, stopping after current entry");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to register SIGTERM handler");
                    if ctrl_c.await.is_err() {
                        return;
                    }
                    info!("received SIGINT (Ctrl+C), stopping after current entry");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_err() {
                return;
            }
            info!("received Ctrl+C, stopping after current entry");
        }

        flag_clone.store(true, Ordering::SeqCst);
    });

    flag
}

/// Check whether the shutdown flag has been set.
pub fn is_shutdown_requested(flag: &ShutdownFlag) -> bool {
    flag.load(Ordering::SeqCst)
}

/// Set the flag by hand.
pub fn request_shutdown(flag: &ShutdownFlag) {
    flag.store(true, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_round_trip() {
        let flag = new_flag();
        assert!(!is_shutdown_requested(&flag));
        request_shutdown(&flag);
        assert!(is_shutdown_requested(&flag));
    }
}
