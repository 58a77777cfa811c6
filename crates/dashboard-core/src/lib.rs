//! Core types for the TikTok performance dashboard.
//!
//! Holds the record models, the error taxonomy, date and timestamp parsing,
//! the group → page-type rule tables, CLI settings, number formatting and the
//! small statistics helpers shared by the data and UI layers.

pub mod calculations;
pub mod dates;
pub mod error;
pub mod formatting;
pub mod models;
pub mod page_types;
pub mod settings;
