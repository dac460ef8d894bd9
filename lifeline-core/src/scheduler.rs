//! Periodic expiry sweep.
//!
//! Lazy expiry on read keeps correctness on its own; the sweep only bounds
//! how long idle sessions linger in memory.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::session::SessionStore;

/// Background task calling [`SessionStore::sweep_expired`] on a fixed period.
pub struct CleanupScheduler {
    abort_handle: AbortHandle,
    period: Duration,
}

impl CleanupScheduler {
    /// Spawn the sweep loop. Must be called within a tokio runtime.
    pub fn start(store: Arc<SessionStore>, period: Duration) -> Self {
        info!(interval_secs = period.as_secs(), "Starting cleanup scheduler");

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match store.sweep_expired() {
                    Ok(archived) if !archived.is_empty() => {
                        info!(archived = archived.len(), "Expired idle sessions");
                        for (user_id, session_id) in &archived {
                            debug!(user_id = %user_id, session_id = %session_id, "Session expired");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Cleanup sweep failed");
                    }
                }
            }
        });

        Self {
            abort_handle: handle.abort_handle(),
            period,
        }
    }

    /// Stop the sweep loop. Safe to call more than once.
    pub fn stop(&self) {
        if !self.abort_handle.is_finished() {
            self.abort_handle.abort();
            info!("Stopped cleanup scheduler");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.abort_handle.is_finished()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}
