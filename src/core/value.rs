//! Cell values and column dtype labels
//!
//! A table cell is a small tagged union rather than a typed column buffer, so a
//! freshly parsed column of mixed text can be coerced value by value and only
//! committed once the whole trial conversion is known.

use chrono::{NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use std::fmt;

/// A single value in a column
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Missing value
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Check if the value is missing. `NaN` floats count as missing.
    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value (integers and floats only)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Datetime view of the value
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Whether the value is an integer or a non-NaN float
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Integers become floats; everything else is returned as is
    pub fn widened(self) -> CellValue {
        match self {
            CellValue::Int(v) => CellValue::Float(v as f64),
            other => other,
        }
    }

    /// Key used for grouping equal values (value counts, nunique)
    pub fn group_key(&self) -> String {
        match self {
            // Keep 1 and 1.0 apart from "1" and "1.0" text values
            CellValue::Text(s) => format!("s:{}", s),
            CellValue::Int(v) => format!("n:{}", *v as f64),
            CellValue::Float(v) => format!("n:{}", v),
            other => format!("o:{}", other),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", format_float(*v)),
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Int(v) => serializer.serialize_i64(*v),
            CellValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            CellValue::Float(_) => serializer.serialize_none(),
            CellValue::Bool(v) => serializer.serialize_bool(*v),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
        }
    }
}

/// Render a float the way it is written back to delimited text.
///
/// Integral values keep a trailing `.0` so the column re-reads as float.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else if v.abs() >= 1e16 || (v != 0.0 && v.abs() < 1e-4) {
        format!("{:e}", v)
    } else {
        format!("{}", v)
    }
}

/// Format a datetime column value, dropping the time part when the whole column is dates
pub fn format_datetime(dt: &NaiveDateTime, date_only: bool) -> String {
    if date_only {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

/// Whether a datetime sits exactly on midnight
pub fn is_midnight(dt: &NaiveDateTime) -> bool {
    dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 && dt.nanosecond() == 0
}

/// Column dtype, labelled the way pandas names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
    DateTime,
}

impl DType {
    /// Label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Object => "object",
            DType::DateTime => "datetime64[ns]",
        }
    }

    /// Whether values of this dtype take part in numeric aggregations
    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int64 | DType::Float64)
    }

    /// Dtype of a freshly coerced numeric column: int64 only when every value is an integer
    pub fn for_numeric(values: &[CellValue]) -> DType {
        if !values.is_empty() && values.iter().all(|v| matches!(v, CellValue::Int(_))) {
            DType::Int64
        } else {
            DType::Float64
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
