//! Runtime layer for the TikTok dashboard.
//!
//! Owns the per-session snapshot caches, the session registry, and the
//! assembly of the view model rendered by the UI.

pub mod data_manager;
pub mod session;
pub mod view;

pub use dashboard_core as core;
pub use dashboard_data as data;
