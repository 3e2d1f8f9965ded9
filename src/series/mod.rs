//! Column-level value conversions

pub mod cast;

pub use cast::{coerce, parse_datetime, to_datetime, to_numeric, AsType, CastTarget, Coerced};
