// ABOUTME: Change-log reclamation - watermark, batched reclaimer and trigger daemon
// ABOUTME: Deletes change rows no sync node still needs, without long-held locks

pub mod daemon;
pub mod reclaimer;
pub mod watermark;

pub use daemon::{DaemonConfig, DaemonStats, ReclaimDaemon};
pub use reclaimer::{
    reclaim, ChainEnd, ChainReport, PassOutcome, ReclaimConfig, Reclaimer, BATCH_SIZE,
    CONTINUATION_DELAY,
};
pub use watermark::compute_watermark;
