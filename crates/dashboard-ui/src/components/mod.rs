//! HTML and SVG building blocks inserted into the page template.

pub mod chart;
pub mod header;
pub mod indicators;
