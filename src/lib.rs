//! tseda: exploratory analysis and light cleaning of delimited time-series datasets.
//!
//! A [`DatasetAnalyzer`] parses an uploaded payload once, then answers
//! inspection queries, applies cleaning steps in place, resamples and
//! decomposes time series, and exports the cleaned table. [`DatasetStore`]
//! keeps the uploaded files on disk.

#![allow(clippy::too_many_arguments)]

// Core module with fundamental data structures and traits
pub mod core;

pub mod config;
pub mod dataframe;
pub mod eda;
pub mod io;
pub mod series;
pub mod store;
pub mod temporal;
pub mod time_series;
pub mod vis;

// Re-export core types
pub use core::error::{Error, Result};
pub use core::value::{CellValue, DType};

pub use config::EdaConfig;
pub use dataframe::{Column, DataFrame, DatetimeIndex};
pub use eda::{AnalyzerOptions, CastOutcome, DatasetAnalyzer, OrderedMap, TypeSuggestion};
pub use store::{check_upload_size, ConflictMode, DatasetStore};
pub use temporal::{date_range, infer_frequency, Aggregation, Frequency, FrequencyUnit};
pub use time_series::{
    ClassicalDecomposer, Decomposer, Decomposition, DecompositionMethod, StlDecomposer,
};
pub use vis::{DecompositionRenderer, PlotSettings, PlottersPngRenderer};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
