//! Background cache sweeping
//!
//! Periodically deletes expired entries so the cache directory does not grow
//! without bound, reporting each pass over a tokio channel.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::manager::{ResultCache, SweepReport};

/// Messages sent from the sweep task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepMessage {
    /// A sweep pass finished
    Completed(SweepReport),
    /// A sweep pass failed
    Failed(String),
}

/// Configuration for the sweep interval
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweep passes
    pub interval: Duration,
    /// Whether sweeping is enabled
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            enabled: true,
        }
    }
}

/// Handle for controlling the background sweep task
pub struct SweepHandle {
    /// Channel for receiving sweep results
    pub receiver: mpsc::Receiver<SweepMessage>,
    /// Signals shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Spawns the sweep task on the current tokio runtime
    ///
    /// The first pass runs after one full interval. With `enabled = false` no
    /// task is spawned and the receiver never yields.
    pub fn spawn(cache: ResultCache, config: SweepConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(8);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let message = match cache.sweep().await {
                                Ok(report) => {
                                    if report.removed() > 0 {
                                        info!(
                                            expired = report.expired_removed,
                                            corrupt = report.corrupt_removed,
                                            temp = report.temp_removed,
                                            "cache sweep reclaimed entries"
                                        );
                                    }
                                    SweepMessage::Completed(report)
                                }
                                Err(error) => {
                                    warn!(%error, "cache sweep failed");
                                    SweepMessage::Failed(error.to_string())
                                }
                            };
                            // Nobody listening is fine
                            let _ = msg_tx.try_send(message);
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Stops the sweep task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
