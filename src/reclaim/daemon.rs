// ABOUTME: ReclaimDaemon - triggers a reclamation chain at a fixed interval
// ABOUTME: Stops on shutdown signal or once the store has been closed

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use super::reclaimer::{ChainEnd, ReclaimConfig, Reclaimer};
use crate::store::ChangeStore;

/// Configuration for the ReclaimDaemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Interval between reclamation triggers
    pub trigger_interval: Duration,
    /// Batch size and continuation delay for each chain
    pub reclaim: ReclaimConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            trigger_interval: Duration::from_secs(60),
            reclaim: ReclaimConfig::default(),
        }
    }
}

/// Totals across every chain the daemon ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonStats {
    pub cycles: u64,
    pub deleted: u64,
    pub failed_cycles: u64,
}

/// Runs one reclamation chain per tick, never two at once.
///
/// Inside the host application reclamation is triggered by change traffic;
/// a standalone process has no such traffic and uses a timer instead.
pub struct ReclaimDaemon<S> {
    reclaimer: Reclaimer<S>,
    trigger_interval: Duration,
}

impl<S: ChangeStore> ReclaimDaemon<S> {
    pub fn new(store: Arc<S>, config: DaemonConfig) -> Self {
        Self {
            reclaimer: Reclaimer::with_config(store, config.reclaim),
            trigger_interval: config.trigger_interval,
        }
    }

    /// Run until `shutdown` fires or the store is closed.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> DaemonStats {
        let mut ticker = interval(self.trigger_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = DaemonStats::default();

        tracing::info!(
            "Starting ReclaimDaemon with trigger_interval={:?}, batch_size={}, continuation_delay={:?}",
            self.trigger_interval,
            self.reclaimer.config().batch_size,
            self.reclaimer.config().continuation_delay
        );

        loop {
            tokio::select! {
                biased; // Check shutdown first

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping ReclaimDaemon");
                    break;
                }
                _ = ticker.tick() => {
                    stats.cycles += 1;
                    tracing::debug!("Starting reclamation cycle {}", stats.cycles);

                    let report = tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown signal received during reclamation, aborting");
                            break;
                        }
                        report = self.reclaimer.run_chain() => report,
                    };

                    stats.deleted += report.deleted;
                    match &report.end {
                        ChainEnd::Failed(reason) => {
                            stats.failed_cycles += 1;
                            tracing::warn!("Reclamation cycle {} failed: {}", stats.cycles, reason);
                        }
                        end if report.deleted > 0 => {
                            tracing::info!(
                                "Reclamation cycle {} completed: {} passes, {} rows deleted in {}ms ({:?})",
                                stats.cycles,
                                report.passes,
                                report.deleted,
                                report.duration_ms,
                                end
                            );
                        }
                        end => {
                            tracing::debug!(
                                "Reclamation cycle {} found nothing to reclaim ({:?})",
                                stats.cycles,
                                end
                            );
                        }
                    }

                    if report.end == ChainEnd::StoreClosed || !self.reclaimer.store().is_open() {
                        tracing::warn!("Sync store closed, stopping ReclaimDaemon");
                        break;
                    }
                }
            }
        }

        stats
    }
}
