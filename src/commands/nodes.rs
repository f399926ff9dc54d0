// ABOUTME: Nodes command - set, remove and list sync node progress markers
// ABOUTME: Lets operators retire peers that would otherwise pin the watermark

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use sync_store::{NodeKind, RevisionMarker, SyncNode, SyncStore};

#[derive(Args)]
pub struct NodesArgs {
    #[command(subcommand)]
    command: NodesCommands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Local,
    Remote,
}

impl From<KindArg> for NodeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Local => NodeKind::Local,
            KindArg::Remote => NodeKind::Remote,
        }
    }
}

#[derive(Subcommand)]
enum NodesCommands {
    /// Set the revision a sync node still needs
    Set {
        /// Node id
        node_id: String,
        /// Lowest revision the node has not consumed yet
        revision: i64,
        #[arg(long, value_enum, default_value = "remote")]
        kind: KindArg,
    },
    /// Remove a sync node (e.g. a peer that will never come back)
    Remove {
        /// Node id
        node_id: String,
    },
    /// List sync nodes
    List,
}

pub fn command(store: &SyncStore, args: NodesArgs) -> Result<()> {
    match args.command {
        NodesCommands::Set {
            node_id,
            revision,
            kind,
        } => {
            let node = SyncNode::new(node_id, kind.into(), RevisionMarker::Number(revision));
            store
                .upsert_sync_node(&node)
                .context("Failed to save sync node")?;
            println!("Sync node {} set to revision {}", node.node_id, revision);
        }
        NodesCommands::Remove { node_id } => {
            let removed = store
                .remove_sync_node(&node_id)
                .context("Failed to remove sync node")?;
            if removed {
                println!("Sync node {} removed.", node_id);
            } else {
                println!("Sync node {} does not exist.", node_id);
            }
        }
        NodesCommands::List => {
            let nodes = store
                .list_sync_nodes()
                .context("Failed to list sync nodes")?;
            if nodes.is_empty() {
                println!("No sync nodes.");
            }
            for node in nodes {
                println!(
                    "{} ({}) my_revision={}",
                    node.node_id,
                    node.kind.as_str(),
                    node.my_revision
                );
            }
        }
    }
    Ok(())
}
