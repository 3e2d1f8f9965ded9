//! Structured results returned by the dataset analyzer
//!
//! Every report serializes to the JSON shape the request layer hands back to
//! callers. Maps keep the column order of the table.

use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::core::value::CellValue;

/// A string-keyed map that preserves insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap(Vec::new())
    }

    /// Append an entry, replacing the value when the key already exists
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One row of a resample preview: index label first, then one entry per column
pub type Record = OrderedMap<CellValue>;

/// Shape, column names, dtypes and null counts of the table
#[derive(Debug, Clone, serde::Serialize)]
pub struct BasicInfo {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub dtypes: OrderedMap<String>,
    pub nulls: OrderedMap<usize>,
}

impl BasicInfo {
    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.column_count)
    }
}

/// Per-column entry of the schema overview
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ColumnSchema {
    pub dtype: String,
    pub null_count: usize,
    pub non_null_count: usize,
    pub unique_count: usize,
}

/// Null statistics of a single column
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub null_count: usize,
    pub total_rows: usize,
}

/// Type a column could be cast to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSuggestion {
    Numeric,
    Datetime,
    String,
}

impl TypeSuggestion {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeSuggestion::Numeric => "numeric",
            TypeSuggestion::Datetime => "datetime",
            TypeSuggestion::String => "string",
        }
    }
}

impl fmt::Display for TypeSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a trial cast
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CastOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convertible_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_convertible_rows: Option<usize>,
}

impl CastOutcome {
    pub(crate) fn committed(column: &str, dtype: &str) -> Self {
        CastOutcome {
            success: true,
            message: Some(format!("Column {} successfully cast to {}.", column, dtype)),
            error: None,
            convertible_rows: None,
            non_convertible_rows: None,
        }
    }

    pub(crate) fn rejected(dtype: &str, failed: usize, total: usize) -> Self {
        CastOutcome {
            success: false,
            message: Some(format!(
                "{} / {} rows cannot be converted to {}.",
                failed, total, dtype
            )),
            error: None,
            convertible_rows: Some(total - failed),
            non_convertible_rows: Some(failed),
        }
    }

    pub(crate) fn failed(error: impl Into<String>) -> Self {
        CastOutcome {
            success: false,
            message: None,
            error: Some(error.into()),
            convertible_rows: None,
            non_convertible_rows: None,
        }
    }
}

/// Rows removed because their value could not be coerced
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DropOutcome {
    pub dropped_rows: usize,
    pub remaining_rows: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ColumnDropped {
    pub column: String,
    pub remaining_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NullRowsDropped {
    pub column: String,
    pub dropped_rows: usize,
    pub remaining_rows: usize,
}

/// Whether a column parses cleanly as datetimes
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DatetimeCheck {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_date: Option<NaiveDateTime>,
}

/// Whether a resampling frequency fits the sampling of a datetime column
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FrequencyCheck {
    pub applicable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_freq: Option<String>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_map_keeps_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("b", 1);
        map.insert("a", 2);
        map.insert("b", 3);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&3));

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"b":3,"a":2}"#);
    }

    #[test]
    fn test_cast_outcome_serialization() {
        let json = serde_json::to_value(CastOutcome::rejected("numeric", 1, 4)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "1 / 4 rows cannot be converted to numeric.");
        assert_eq!(json["convertible_rows"], 3);
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(CastOutcome::failed("boom")).unwrap();
        assert_eq!(json["error"], "boom");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_frequency_check_keeps_null_reason() {
        let check = FrequencyCheck {
            applicable: true,
            inferred_freq: Some("D".to_string()),
            reason: None,
        };
        let json = serde_json::to_string(&check).unwrap();
        assert_eq!(json, r#"{"applicable":true,"inferred_freq":"D","reason":null}"#);
    }
}
