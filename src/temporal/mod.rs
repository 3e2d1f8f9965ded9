//! Module for time series data manipulation

// Module structure
pub mod date_range;
pub mod frequency;
pub mod resample;

// Re-export public items from submodules
pub use self::date_range::{date_range, DateRange};
pub use self::frequency::{infer_frequency, Frequency, FrequencyUnit};
pub use self::resample::{Aggregation, Resample, Resampled};
