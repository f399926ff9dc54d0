// ABOUTME: Library root for changelog-reclaimer
// ABOUTME: Garbage collects change-log rows every sync node has consumed

pub mod commands;
pub mod config;
pub mod reclaim;
pub mod store;

pub use reclaim::{reclaim, ChainEnd, ChainReport, ReclaimConfig, Reclaimer};
pub use store::{ChangeScope, ChangeStore};
