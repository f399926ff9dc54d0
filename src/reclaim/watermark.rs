// ABOUTME: Deletion watermark - the lowest revision any sync node still needs
// ABOUTME: Markers are compared numerically, never as strings

use anyhow::{Context, Result};
use sync_store::{Revision, SyncNode};

/// Minimum `my_revision` across `nodes`, or `None` when there are no nodes.
///
/// An empty node set never yields a watermark: with no peers there is also
/// nothing that declares any change obsolete. A single malformed marker
/// fails the whole computation.
pub fn compute_watermark(nodes: &[SyncNode]) -> Result<Option<Revision>> {
    let mut watermark: Option<Revision> = None;
    for node in nodes {
        let revision = node
            .my_revision
            .to_revision()
            .with_context(|| format!("sync node {} has an unusable revision", node.node_id))?;
        watermark = Some(match watermark {
            Some(current) => current.min(revision),
            None => revision,
        });
    }
    Ok(watermark)
}
