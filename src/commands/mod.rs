// ABOUTME: Command implementations for the changelog-reclaimer CLI
// ABOUTME: Each subcommand lives in its own module and takes an opened store

pub mod nodes;
pub mod reclaim;
pub mod status;

pub use nodes::NodesArgs;
pub use reclaim::{run_once, watch};
pub use status::{collect as collect_status, StatusReport};
