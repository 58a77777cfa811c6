//! Browser UI layer of the TikTok dashboard.
//!
//! Provides themes, HTML and SVG components, table views, the page renderer
//! and the axum application serving the dashboard.

pub mod app;
pub mod components;
pub mod page;
pub mod table_view;
pub mod themes;

pub use dashboard_runtime as runtime;
