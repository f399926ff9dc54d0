// ABOUTME: Reclaimer - deletes change rows every sync node has moved past
// ABOUTME: Works in bounded batches and reschedules itself until a short batch

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sync_store::Revision;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::watermark::compute_watermark;
use crate::store::{ChangeScope, ChangeStore};

/// Maximum number of change rows deleted per batch.
pub const BATCH_SIZE: usize = 100;

/// Pause between a full batch and its continuation.
pub const CONTINUATION_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimConfig {
    pub batch_size: usize,
    pub continuation_delay: Duration,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            continuation_delay: CONTINUATION_DELAY,
        }
    }
}

/// What a single batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// No sync nodes, so no watermark and nothing is eligible.
    NoSyncNodes,
    /// A watermark exists but no change is below it.
    Exhausted { watermark: Revision },
    /// `selected` keys were below the watermark; `deleted` of them were
    /// still present when the delete ran.
    Deleted {
        watermark: Revision,
        selected: usize,
        deleted: u64,
    },
}

impl PassOutcome {
    /// A full batch means more eligible rows may remain.
    pub fn needs_continuation(&self, batch_size: usize) -> bool {
        matches!(self, PassOutcome::Deleted { selected, .. } if *selected == batch_size)
    }

    pub fn deleted(&self) -> u64 {
        match self {
            PassOutcome::Deleted { deleted, .. } => *deleted,
            _ => 0,
        }
    }

    pub fn watermark(&self) -> Option<Revision> {
        match self {
            PassOutcome::NoSyncNodes => None,
            PassOutcome::Exhausted { watermark } | PassOutcome::Deleted { watermark, .. } => {
                Some(*watermark)
            }
        }
    }
}

/// Why a reclamation chain stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    /// The last batch was short: nothing else is eligible right now.
    Converged,
    NoSyncNodes,
    /// The store was closed when a continuation came due.
    StoreClosed,
    /// A pass failed. The error was swallowed; this is its rendering.
    Failed(String),
}

/// Summary of one chain of passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub passes: u32,
    pub deleted: u64,
    /// Watermark used by the most recent pass that computed one.
    pub watermark: Option<Revision>,
    pub end: ChainEnd,
    pub duration_ms: u64,
}

impl ChainReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.end, ChainEnd::Failed(_))
    }
}

/// Garbage collector for the change log.
///
/// Each pass:
/// 1. Loads every sync node and takes the numeric minimum of `my_revision`
/// 2. Selects at most `batch_size` change keys with `rev` below it
/// 3. Deletes exactly those keys
///
/// all inside one unit of work opened through
/// [`ChangeStore::with_detached_scope`]. A full batch schedules another pass
/// after `continuation_delay`, which only runs if the store is still open.
pub struct Reclaimer<S> {
    store: Arc<S>,
    config: ReclaimConfig,
}

impl<S> Clone for Reclaimer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S: ChangeStore> Reclaimer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ReclaimConfig::default())
    }

    /// A `batch_size` of 0 is raised to 1 so every pass can make progress.
    pub fn with_config(store: Arc<S>, config: ReclaimConfig) -> Self {
        let config = ReclaimConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self { store, config }
    }

    pub fn config(&self) -> &ReclaimConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one batch on the blocking pool.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let store = Arc::clone(&self.store);
        let batch_size = self.config.batch_size;
        tokio::task::spawn_blocking(move || {
            store.with_detached_scope(|scope| reclaim_batch(scope, batch_size))
        })
        .await
        .context("reclamation pass aborted")?
    }

    /// Run passes until a short batch, a closed store or a failure.
    ///
    /// Never returns an error: reclamation is maintenance, and a failed pass
    /// only means nothing more is reclaimed until the next trigger.
    pub async fn run_chain(&self) -> ChainReport {
        let start = Instant::now();
        let mut passes = 0u32;
        let mut deleted = 0u64;
        let mut watermark = None;

        let end = loop {
            passes += 1;
            let outcome = match self.run_pass().await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::debug!(pass = passes, "change reclamation pass failed: {:#}", err);
                    break ChainEnd::Failed(format!("{:#}", err));
                }
            };

            deleted += outcome.deleted();
            if let Some(current) = outcome.watermark() {
                watermark = Some(current);
            }
            tracing::debug!(pass = passes, ?outcome, "change reclamation pass finished");

            if !outcome.needs_continuation(self.config.batch_size) {
                break match outcome {
                    PassOutcome::NoSyncNodes => ChainEnd::NoSyncNodes,
                    _ => ChainEnd::Converged,
                };
            }

            tokio::time::sleep(self.config.continuation_delay).await;
            if !self.store.is_open() {
                tracing::debug!("store closed before continuation; dropping it");
                break ChainEnd::StoreClosed;
            }
        };

        let report = ChainReport {
            passes,
            deleted,
            watermark,
            end,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        if report.deleted > 0 {
            tracing::debug!(
                passes = report.passes,
                deleted = report.deleted,
                watermark = ?report.watermark.map(|rev| rev.0),
                "reclaimed obsolete changes"
            );
        }
        report
    }

    /// Detach [`Reclaimer::run_chain`] onto the current tokio runtime.
    ///
    /// Returns `None` without doing anything when called outside a runtime.
    pub fn spawn(&self) -> Option<JoinHandle<ChainReport>> {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::debug!("skipping change reclamation: {}", err);
                return None;
            }
        };
        let reclaimer = self.clone();
        Some(handle.spawn(async move { reclaimer.run_chain().await }))
    }
}

/// Fire-and-forget reclamation of obsolete changes in `store`.
///
/// Returns immediately. The work runs on its own task in its own units of
/// work, so it never joins a transaction the caller may have open, and
/// nothing it does (including failing) is reported back.
pub fn reclaim<S: ChangeStore>(store: Arc<S>) {
    let _ = Reclaimer::new(store).spawn();
}

fn reclaim_batch(scope: &dyn ChangeScope, batch_size: usize) -> Result<PassOutcome> {
    let nodes = scope.list_sync_nodes()?;
    let Some(watermark) = compute_watermark(&nodes)? else {
        return Ok(PassOutcome::NoSyncNodes);
    };

    let keys = scope.change_keys_below(watermark, batch_size)?;
    if keys.is_empty() {
        return Ok(PassOutcome::Exhausted { watermark });
    }

    let deleted = scope.bulk_delete(&keys)?;
    Ok(PassOutcome::Deleted {
        watermark,
        selected: keys.len(),
        deleted,
    })
}
