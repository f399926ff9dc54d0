// ABOUTME: CLI entry point for changelog-reclaimer
// ABOUTME: Parses commands, opens the sync store and routes to handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use changelog_reclaimer::commands::{self, NodesArgs};
use changelog_reclaimer::config::{self, Overrides, Settings};
use clap::{Parser, Subcommand};
use sync_store::SyncStore;

#[derive(Parser)]
#[command(name = "changelog-reclaimer")]
#[command(about = "Reclaim change-log rows every sync node has consumed", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the sync store (default: ~/.changelog-reclaimer/sync.db)
    #[arg(long, env = "CHANGELOG_RECLAIMER_DB", global = true)]
    db: Option<PathBuf>,
    /// Path to config.toml (default: ~/.changelog-reclaimer/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reclamation chain until nothing more is eligible
    Reclaim {
        /// Maximum rows deleted per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Pause between a full batch and the next one, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Run a reclamation chain at a fixed interval until Ctrl+C
    Watch {
        /// Seconds between reclamation triggers
        #[arg(long)]
        interval_secs: Option<u64>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Show sync nodes, the current watermark and the reclaimable backlog
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage sync node progress markers
    Nodes(NodesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log. Logs go to stderr so stdout stays parseable.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let db_path = match cli.db {
        Some(path) => path,
        None => config::default_db_path()?,
    };
    let store = SyncStore::open(&db_path)
        .with_context(|| format!("Failed to open sync store at {}", db_path.display()))?;

    // Settings are only read by the reclamation commands.
    match cli.command {
        Commands::Reclaim {
            batch_size,
            delay_ms,
        } => {
            let settings = resolve_settings(
                cli.config.as_deref(),
                Overrides {
                    batch_size,
                    continuation_delay_ms: delay_ms,
                    trigger_interval_secs: None,
                },
            )?;
            commands::run_once(Arc::new(store), &settings).await
        }
        Commands::Watch {
            interval_secs,
            batch_size,
            delay_ms,
        } => {
            let settings = resolve_settings(
                cli.config.as_deref(),
                Overrides {
                    batch_size,
                    continuation_delay_ms: delay_ms,
                    trigger_interval_secs: interval_secs,
                },
            )?;
            commands::watch(Arc::new(store), &settings).await
        }
        Commands::Status { json } => commands::status::command(&store, json),
        Commands::Nodes(args) => commands::nodes::command(&store, args),
    }
}

fn resolve_settings(config: Option<&Path>, overrides: Overrides) -> anyhow::Result<Settings> {
    Settings::resolve(config)?.with_overrides(overrides)
}
