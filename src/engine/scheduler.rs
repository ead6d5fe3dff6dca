//! Clock-driven scheduler for the tracking and aggregation loops.
//!
//! The two loops are independent tasks that communicate only through the
//! signal store, so additional worker processes need no extra
//! coordination beyond the store's optimistic transition guard.

use crate::engine::{Aggregator, Tracker};
use crate::types::StatPeriod;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns the background loops and their cooperative shutdown flag.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawn the tracking loop: one pass over all active signals per
    /// interval.
    pub fn spawn_tracking(&mut self, tracker: Arc<Tracker>, interval: Duration) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "tracking loop started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let now = chrono::Utc::now().timestamp_millis();
                        tracker.tick_all(now).await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("tracking loop stopping");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Spawn the aggregation loop: one snapshot pass per interval.
    pub fn spawn_aggregation(
        &mut self,
        aggregator: Arc<Aggregator>,
        periods: Vec<StatPeriod>,
        interval: Duration,
    ) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "aggregation loop started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let now = chrono::Utc::now().timestamp_millis();
                        if let Err(e) = aggregator.run_pass(&periods, now) {
                            warn!(error = %e, "aggregation pass failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("aggregation loop stopping");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Cooperative shutdown: signal both loops, then wait up to `grace`
    /// for in-flight passes to finish before aborting them. A tick either
    /// commits one complete tracking point or none, so aborting between
    /// passes never leaves partial state.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let abort = handle.abort_handle();
            match tokio::time::timeout(grace, handle).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("background loop exceeded shutdown grace, aborting");
                    abort.abort();
                }
            }
        }
        info!("scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
