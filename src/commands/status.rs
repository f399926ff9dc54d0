// ABOUTME: Status command - sync nodes, current watermark and reclaimable backlog
// ABOUTME: Prints a human summary or JSON for scripts

use anyhow::{Context, Result};
use serde::Serialize;
use sync_store::{Revision, SyncNode, SyncStore};

use crate::reclaim::compute_watermark;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub sync_nodes: Vec<SyncNode>,
    pub watermark: Option<Revision>,
    pub total_changes: u64,
    pub eligible_changes: u64,
}

/// Snapshot the store in a single unit of work.
///
/// Unlike the reclaimer, a malformed revision marker is an error here: the
/// operator asked for the watermark and should see why there is none.
pub fn collect(store: &SyncStore) -> Result<StatusReport> {
    store.unit_of_work(|unit| -> Result<StatusReport> {
        let sync_nodes = unit.list_sync_nodes()?;
        let watermark = compute_watermark(&sync_nodes)?;
        let total_changes = unit.count_changes()?;
        let eligible_changes = match watermark {
            Some(watermark) => unit.count_changes_below(watermark)?,
            None => 0,
        };
        Ok(StatusReport {
            db_path: store.path().display().to_string(),
            sync_nodes,
            watermark,
            total_changes,
            eligible_changes,
        })
    })
}

pub fn command(store: &SyncStore, json: bool) -> Result<()> {
    let report = collect(store).context("Failed to read sync store status")?;
    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize status")?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Sync store: {}", report.db_path);
    println!("Sync nodes: {}", report.sync_nodes.len());
    for node in &report.sync_nodes {
        println!(
            "  {} ({}) my_revision={}",
            node.node_id,
            node.kind.as_str(),
            node.my_revision
        );
    }
    match report.watermark {
        Some(watermark) => println!("Watermark: {}", watermark),
        None => println!("Watermark: none (no sync nodes)"),
    }
    println!("Changes: {} total", report.total_changes);
    println!(
        "Eligible for reclamation: {}",
        report.eligible_changes
    );
    Ok(())
}
