//! Data layer for the TikTok dashboard.
//!
//! Discovers and reads the metrics exports, account metadata and click logs,
//! merges them, and computes the filtered, aggregated and ranked tables the
//! UI renders.

pub mod aggregator;
pub mod analysis;
pub mod clicks;
pub mod filter;
pub mod merge;
pub mod ranking;
pub mod reader;

pub use dashboard_core as core;
