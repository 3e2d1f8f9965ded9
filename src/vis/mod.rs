//! Module providing data visualization functionality
//!
//! Decomposition results are rendered with plotters into an in-memory bitmap
//! and handed back as PNG bytes.

// Module structure
pub mod config;
pub mod plotters;

// Re-export public items
pub use self::config::PlotSettings;
pub use self::plotters::{encode_base64, DecompositionRenderer, PlottersPngRenderer};
