// ABOUTME: Reclaim and watch commands - one reclamation chain, or one per interval
// ABOUTME: Both print a summary; failures are reported, never retried here

use std::sync::Arc;

use anyhow::Result;
use sync_store::SyncStore;
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::reclaim::{ChainEnd, ReclaimDaemon, Reclaimer};

/// Run a single chain of passes to convergence and print what it did.
///
/// A failed pass is not an error for the process: the chain stops and the
/// rows stay for the next run.
pub async fn run_once(store: Arc<SyncStore>, settings: &Settings) -> Result<()> {
    tracing::info!("Reclaiming obsolete changes in {}", store.path().display());
    let reclaimer = Reclaimer::with_config(store, settings.reclaim);
    let report = reclaimer.run_chain().await;

    println!();
    println!("========================================");
    println!("Reclamation Summary");
    println!("========================================");
    println!("Passes:         {}", report.passes);
    println!("Rows deleted:   {}", report.deleted);
    match report.watermark {
        Some(watermark) => println!("Watermark:      {}", watermark),
        None => println!("Watermark:      none"),
    }
    println!("Duration:       {}ms", report.duration_ms);
    match &report.end {
        ChainEnd::Converged => println!("Result:         converged"),
        ChainEnd::NoSyncNodes => println!("Result:         no sync nodes, nothing eligible"),
        ChainEnd::StoreClosed => println!("Result:         store closed"),
        ChainEnd::Failed(reason) => {
            tracing::warn!("Reclamation stopped early: {}", reason);
            println!("Result:         stopped early (see log)");
        }
    }
    println!("========================================");
    Ok(())
}

/// Trigger a chain every `trigger_interval` until Ctrl+C.
pub async fn watch(store: Arc<SyncStore>, settings: &Settings) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::warn!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx_clone.send(());
    });

    println!(
        "Watching {} (every {}s, Ctrl+C to stop)",
        store.path().display(),
        settings.trigger_interval.as_secs()
    );
    let daemon = ReclaimDaemon::new(Arc::clone(&store), settings.daemon_config());
    let stats = daemon.run(shutdown_rx).await;

    store.close()?;

    println!();
    println!("========================================");
    println!("Watch Summary");
    println!("========================================");
    println!("Cycles:         {}", stats.cycles);
    println!("Failed cycles:  {}", stats.failed_cycles);
    println!("Rows deleted:   {}", stats.deleted);
    println!("========================================");
    Ok(())
}
