//! Column-oriented working table
//!
//! The [`DataFrame`] here is the single mutable table an analyzer owns: an ordered
//! list of typed columns plus an optional datetime index.

pub mod base;

pub use base::{Column, DataFrame, DatetimeIndex};
