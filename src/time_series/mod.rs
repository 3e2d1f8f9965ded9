//! Time Series Analysis Module
//!
//! Seasonal decomposition of regularly sampled numeric series.

pub mod decomposition;
pub mod loess;

pub use decomposition::{
    ClassicalDecomposer, Decomposer, Decomposition, DecompositionMethod, DecompositionMetrics,
    StlDecomposer,
};
pub use loess::{bisquare_weights, loess_estimate, loess_smooth, LoessDegree};
