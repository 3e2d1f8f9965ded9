//! Value coercion kernels
//!
//! `to_numeric` and `to_datetime` never fail on individual values: anything that
//! cannot be converted becomes `Null`. `astype` conversions are all-or-nothing and
//! hand back the column untouched when any value refuses to convert.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::core::error::{Error, Result};
use crate::core::value::{CellValue, DType};
use crate::dataframe::Column;

/// Datetime layouts tried in order, with a time part
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
];

/// Date-only layouts; month-first wins over day-first for ambiguous slashes
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Datetime layouts carrying a UTC offset
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse text as an integer or float
pub fn parse_number(text: &str) -> Option<CellValue> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(v) = text.parse::<i64>() {
        return Some(CellValue::Int(v));
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_nan() => None,
        Ok(v) => Some(CellValue::Float(v)),
        Err(_) => None,
    }
}

/// Parse the boolean spellings the reader recognises
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Parse text as a timezone-naive timestamp; offsets are normalised to UTC
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    // Compact and partial dates: 20220131, 2022-01
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y%m%d") {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    if text.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Interpret a number as nanoseconds since the Unix epoch
fn datetime_from_nanos(nanos: i64) -> Option<NaiveDateTime> {
    let secs = nanos.div_euclid(1_000_000_000);
    let nsec = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nsec).map(|dt| dt.naive_utc())
}

/// Coerce values to numbers, nulling whatever does not parse
pub fn to_numeric(values: &[CellValue]) -> Vec<CellValue> {
    values
        .iter()
        .map(|value| match value {
            CellValue::Int(_) => value.clone(),
            CellValue::Float(v) if v.is_nan() => CellValue::Null,
            CellValue::Float(_) => value.clone(),
            CellValue::Bool(b) => CellValue::Int(i64::from(*b)),
            CellValue::Text(s) => parse_number(s).unwrap_or(CellValue::Null),
            CellValue::Null | CellValue::DateTime(_) => CellValue::Null,
        })
        .collect()
}

/// Coerce values to timestamps, nulling whatever does not parse
pub fn to_datetime(values: &[CellValue]) -> Vec<CellValue> {
    values
        .iter()
        .map(|value| {
            let parsed = match value {
                CellValue::DateTime(dt) => Some(*dt),
                CellValue::Text(s) => parse_datetime(s),
                CellValue::Int(n) => datetime_from_nanos(*n),
                CellValue::Float(f) if f.is_finite() => datetime_from_nanos(*f as i64),
                _ => None,
            };
            parsed.map(CellValue::DateTime).unwrap_or(CellValue::Null)
        })
        .collect()
}

/// Target types accepted by `astype`-style conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsType {
    Int,
    Float,
    Str,
    Bool,
    Datetime,
}

/// What a cast request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    /// Lenient numeric coercion
    Numeric,
    /// Lenient datetime coercion
    Datetime,
    /// Strict conversion to a named type
    Other(AsType),
}

impl CastTarget {
    /// Parse a user supplied dtype label
    pub fn parse(label: &str) -> Result<Self> {
        let target = match label.trim() {
            "numeric" => CastTarget::Numeric,
            "datetime" => CastTarget::Datetime,
            "int" | "int64" | "int32" | "Int64" => CastTarget::Other(AsType::Int),
            "float" | "float64" | "float32" => CastTarget::Other(AsType::Float),
            "str" | "string" | "object" => CastTarget::Other(AsType::Str),
            "bool" | "boolean" => CastTarget::Other(AsType::Bool),
            "datetime64" | "datetime64[ns]" => CastTarget::Other(AsType::Datetime),
            other => return Err(Error::UnsupportedType(other.to_string())),
        };
        Ok(target)
    }
}

/// Result of a trial coercion, not yet committed to any table
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub dtype: DType,
    pub values: Vec<CellValue>,
}

impl Coerced {
    /// Number of values that ended up missing
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// Run a trial coercion of a column
pub fn coerce(column: &Column, target: CastTarget) -> Coerced {
    match target {
        CastTarget::Numeric => {
            let values = to_numeric(column.values());
            let dtype = DType::for_numeric(&values);
            let values = if dtype == DType::Float64 {
                values.into_iter().map(CellValue::widened).collect()
            } else {
                values
            };
            Coerced { dtype, values }
        }
        CastTarget::Datetime => Coerced {
            dtype: DType::DateTime,
            values: to_datetime(column.values()),
        },
        CastTarget::Other(as_type) => astype(column, as_type).unwrap_or_else(|| Coerced {
            dtype: column.dtype(),
            values: column.values().to_vec(),
        }),
    }
}

/// Strict conversion; `None` when any value refuses to convert
fn astype(column: &Column, as_type: AsType) -> Option<Coerced> {
    let values = column.values();
    match as_type {
        AsType::Int => {
            let converted = values
                .iter()
                .map(|value| match value {
                    CellValue::Int(v) => Some(CellValue::Int(*v)),
                    CellValue::Float(v) if v.is_finite() => Some(CellValue::Int(v.trunc() as i64)),
                    CellValue::Bool(b) => Some(CellValue::Int(i64::from(*b))),
                    CellValue::Text(s) => s.trim().parse::<i64>().ok().map(CellValue::Int),
                    CellValue::DateTime(dt) => {
                        dt.and_utc().timestamp_nanos_opt().map(CellValue::Int)
                    }
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Coerced {
                dtype: DType::Int64,
                values: converted,
            })
        }
        AsType::Float => {
            let converted = values
                .iter()
                .map(|value| match value {
                    CellValue::Null => Some(CellValue::Null),
                    CellValue::Int(v) => Some(CellValue::Float(*v as f64)),
                    CellValue::Float(v) => Some(CellValue::Float(*v)),
                    CellValue::Bool(b) => Some(CellValue::Float(if *b { 1.0 } else { 0.0 })),
                    CellValue::Text(s) => s.trim().parse::<f64>().ok().map(CellValue::Float),
                    CellValue::DateTime(_) => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Coerced {
                dtype: DType::Float64,
                values: converted,
            })
        }
        AsType::Str => Some(Coerced {
            dtype: DType::Object,
            values: values
                .iter()
                .map(|value| {
                    if value.is_null() {
                        CellValue::Text("nan".to_string())
                    } else {
                        CellValue::Text(value.to_string())
                    }
                })
                .collect(),
        }),
        AsType::Bool => Some(Coerced {
            dtype: DType::Bool,
            values: values
                .iter()
                .map(|value| {
                    CellValue::Bool(match value {
                        CellValue::Null => true,
                        CellValue::Int(v) => *v != 0,
                        CellValue::Float(v) => v.is_nan() || *v != 0.0,
                        CellValue::Bool(b) => *b,
                        CellValue::Text(s) => !s.is_empty(),
                        CellValue::DateTime(_) => true,
                    })
                })
                .collect(),
        }),
        AsType::Datetime => {
            let converted = values
                .iter()
                .map(|value| match value {
                    CellValue::Null => Some(CellValue::Null),
                    CellValue::Float(v) if v.is_nan() => Some(CellValue::Null),
                    CellValue::DateTime(dt) => Some(CellValue::DateTime(*dt)),
                    CellValue::Text(s) => parse_datetime(s).map(CellValue::DateTime),
                    CellValue::Int(n) => datetime_from_nanos(*n).map(CellValue::DateTime),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Coerced {
                dtype: DType::DateTime,
                values: converted,
            })
        }
    }
}
