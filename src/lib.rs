//! TIMBA: match betting, team history and player ratings for a Quake Live server
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod host;
pub mod plugin;
pub mod storage;
pub mod betting;
pub mod history;
pub mod rating;
