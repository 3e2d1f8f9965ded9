//! Resampling of timestamped columns into regular buckets

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, Result};
use crate::core::value::{CellValue, DType};
use crate::dataframe::Column;
use crate::temporal::frequency::Frequency;

/// Aggregation applied to each bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
    Min,
    Max,
    Median,
    /// Sample standard deviation
    Std,
    /// Sample variance
    Var,
    Count,
    First,
    Last,
    NUnique,
}

impl Aggregation {
    /// Name accepted by [`Aggregation::from_str`]
    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
            Aggregation::Std => "std",
            Aggregation::Var => "var",
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::NUnique => "nunique",
        }
    }

    /// Aggregations that only make sense for int and float columns
    pub fn numeric_only(&self) -> bool {
        matches!(
            self,
            Aggregation::Mean
                | Aggregation::Sum
                | Aggregation::Median
                | Aggregation::Std
                | Aggregation::Var
        )
    }

    /// Aggregate the non-null values of one bucket taken from a column of `dtype`
    pub fn apply(&self, dtype: DType, values: &[&CellValue]) -> CellValue {
        match self {
            Aggregation::Count => return CellValue::Int(values.len() as i64),
            Aggregation::NUnique => {
                let unique: HashSet<String> = values.iter().map(|v| v.group_key()).collect();
                return CellValue::Int(unique.len() as i64);
            }
            Aggregation::First => {
                return values.first().map(|v| (*v).clone()).unwrap_or(CellValue::Null)
            }
            Aggregation::Last => {
                return values.last().map(|v| (*v).clone()).unwrap_or(CellValue::Null)
            }
            Aggregation::Min | Aggregation::Max => return self.extreme(values),
            _ => {}
        }

        let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
        match self {
            Aggregation::Sum if dtype == DType::Int64 => {
                let total = values
                    .iter()
                    .filter_map(|v| match v {
                        CellValue::Int(i) => Some(*i),
                        _ => None,
                    })
                    .fold(0i64, |acc, v| acc.wrapping_add(v));
                CellValue::Int(total)
            }
            Aggregation::Sum => CellValue::Float(numbers.iter().sum()),
            Aggregation::Mean => mean(&numbers).map(CellValue::Float).unwrap_or(CellValue::Null),
            Aggregation::Median => median(&numbers).map(CellValue::Float).unwrap_or(CellValue::Null),
            Aggregation::Var => variance(&numbers).map(CellValue::Float).unwrap_or(CellValue::Null),
            Aggregation::Std => variance(&numbers)
                .map(|v| CellValue::Float(v.sqrt()))
                .unwrap_or(CellValue::Null),
            _ => CellValue::Null,
        }
    }

    fn extreme(&self, values: &[&CellValue]) -> CellValue {
        let mut best: Option<&CellValue> = None;
        for &value in values {
            best = match best {
                None => Some(value),
                Some(current) => {
                    let ordering = compare(value, current);
                    let better = match self {
                        Aggregation::Min => ordering == Some(Ordering::Less),
                        _ => ordering == Some(Ordering::Greater),
                    };
                    if better { Some(value) } else { Some(current) }
                }
            };
        }
        best.cloned().unwrap_or(CellValue::Null)
    }

    /// Whether an empty bucket aggregates to null
    fn empty_is_null(&self) -> bool {
        !matches!(
            self,
            Aggregation::Count | Aggregation::NUnique | Aggregation::Sum
        )
    }

    /// Dtype of an aggregated column
    fn output_dtype(&self, input: DType, values: &[CellValue]) -> DType {
        match self {
            Aggregation::Count | Aggregation::NUnique => DType::Int64,
            Aggregation::Sum | Aggregation::Min | Aggregation::Max | Aggregation::First
            | Aggregation::Last
                if input == DType::Int64 =>
            {
                DType::for_numeric(values)
            }
            Aggregation::Min | Aggregation::Max | Aggregation::First | Aggregation::Last => input,
            _ => DType::Float64,
        }
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "median" => Ok(Aggregation::Median),
            "std" => Ok(Aggregation::Std),
            "var" => Ok(Aggregation::Var),
            "count" => Ok(Aggregation::Count),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            "nunique" => Ok(Aggregation::NUnique),
            other => Err(Error::InvalidInput(format!(
                "Unsupported aggregation method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of a resampling operation
#[derive(Debug, Clone)]
pub struct Resampled {
    /// Bucket labels in ascending order
    pub labels: Vec<NaiveDateTime>,
    /// One aggregated column per input column that survived the aggregation
    pub columns: Vec<Column>,
}

impl Resampled {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Structure representing resampling operations
#[derive(Debug)]
pub struct Resample<'a> {
    /// Timestamp of each row; rows without one are left out
    timestamps: &'a [Option<NaiveDateTime>],
    columns: &'a [Column],
    frequency: Frequency,
    /// Stop after this many buckets
    limit: Option<usize>,
}

impl<'a> Resample<'a> {
    /// Create a new resampling operation
    pub fn new(
        timestamps: &'a [Option<NaiveDateTime>],
        columns: &'a [Column],
        frequency: Frequency,
    ) -> Self {
        Resample {
            timestamps,
            columns,
            frequency,
            limit: None,
        }
    }

    /// Keep only the first `rows` buckets. Later buckets are never built.
    pub fn with_limit(mut self, rows: usize) -> Self {
        self.limit = Some(rows);
        self
    }

    /// Resample using mean
    pub fn mean(&self) -> Result<Resampled> {
        self.aggregate(Aggregation::Mean)
    }

    /// Resample using sum
    pub fn sum(&self) -> Result<Resampled> {
        self.aggregate(Aggregation::Sum)
    }

    /// Group rows into buckets and aggregate every column.
    ///
    /// Buckets between the first and last populated one are emitted even when
    /// empty. Non-numeric columns are skipped by numeric-only aggregations.
    /// Column dtypes are decided over the whole span, so a limited run agrees
    /// with the head of an unlimited one.
    pub fn aggregate(&self, aggregation: Aggregation) -> Result<Resampled> {
        for column in self.columns {
            if column.len() != self.timestamps.len() {
                return Err(Error::InvalidInput(format!(
                    "Column '{}' has {} rows, index has {}",
                    column.name(),
                    column.len(),
                    self.timestamps.len()
                )));
            }
        }

        let rows: Vec<(usize, NaiveDateTime)> = self
            .timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| ts.map(|ts| (i, ts)))
            .collect();

        let columns: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| !aggregation.numeric_only() || c.dtype().is_numeric())
            .collect();

        let Some(first) = rows.iter().map(|(_, ts)| *ts).min() else {
            return Ok(Resampled {
                labels: Vec::new(),
                columns: columns
                    .iter()
                    .map(|c| {
                        let dtype = aggregation.output_dtype(c.dtype(), &[]);
                        Column::new(c.name(), dtype, Vec::new())
                    })
                    .collect(),
            });
        };

        let freq = self.frequency;
        let step = i64::from(freq.multiple);
        let origin = first.date().and_hms_opt(0, 0, 0).unwrap_or(first);
        let base = if freq.is_tick() {
            0
        } else {
            freq.unit_ordinal(first, origin)
        };
        let bucket_of = |ts: NaiveDateTime| {
            let ordinal = freq.unit_ordinal(ts, origin);
            base + (ordinal - base).div_euclid(step) * step
        };

        // Rows per bucket, in original row order
        let mut buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (row, ts) in &rows {
            buckets.entry(bucket_of(*ts)).or_default().push(*row);
        }

        let (Some(&lo), Some(&hi)) = (buckets.keys().next(), buckets.keys().next_back()) else {
            return Err(Error::InsufficientData("No rows to resample".to_string()));
        };

        let span = (hi - lo) / step + 1;
        let wanted = self.limit.map_or(span, |n| span.min(i64::try_from(n).unwrap_or(i64::MAX)));

        let mut labels = Vec::new();
        let mut bucket_rows: Vec<&[usize]> = Vec::new();
        let mut bucket = lo;
        for _ in 0..wanted {
            let label_ordinal = if freq.is_end_anchored() {
                bucket + step - 1
            } else {
                bucket
            };
            let label = freq.unit_label(label_ordinal, origin).ok_or_else(|| {
                Error::InvalidFrequency(format!("{} (bucket label out of range)", freq))
            })?;
            labels.push(label);
            bucket_rows.push(buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[]));
            bucket += step;
        }
        let truncated = wanted < span;

        let mut output = Vec::with_capacity(columns.len());
        for column in columns {
            let values: Vec<CellValue> = bucket_rows
                .iter()
                .map(|rows| {
                    let present: Vec<&CellValue> = rows
                        .iter()
                        .map(|&r| &column.values()[r])
                        .filter(|v| !v.is_null())
                        .collect();
                    aggregation.apply(column.dtype(), &present)
                })
                .collect();
            let dtype = if truncated
                && aggregation.empty_is_null()
                && has_null_bucket(column, &buckets, span)
            {
                let mut with_gap = values.clone();
                with_gap.push(CellValue::Null);
                aggregation.output_dtype(column.dtype(), &with_gap)
            } else {
                aggregation.output_dtype(column.dtype(), &values)
            };
            let values = if dtype == DType::Float64 {
                values.into_iter().map(CellValue::widened).collect()
            } else {
                values
            };
            output.push(Column::new(column.name(), dtype, values));
        }

        log::debug!(
            "resampled {} rows into {} buckets at {} using {}",
            rows.len(),
            labels.len(),
            freq,
            aggregation
        );

        Ok(Resampled {
            labels,
            columns: output,
        })
    }
}

/// Whether some bucket of the span has no non-null value in `column`
fn has_null_bucket(column: &Column, buckets: &BTreeMap<i64, Vec<usize>>, span: i64) -> bool {
    (buckets.len() as i64) < span
        || buckets
            .values()
            .any(|rows| rows.iter().all(|&r| column.values()[r].is_null()))
}

fn compare(a: &CellValue, b: &CellValue) -> Option<Ordering> {
    match (a, b) {
        (CellValue::Text(x), CellValue::Text(y)) => Some(x.cmp(y)),
        (CellValue::DateTime(x), CellValue::DateTime(y)) => Some(x.cmp(y)),
        (CellValue::Bool(x), CellValue::Bool(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn float_column(name: &str, values: &[f64]) -> Column {
        Column::new(
            name,
            DType::Float64,
            values.iter().map(|v| CellValue::Float(*v)).collect(),
        )
    }

    #[test]
    fn test_limit_stops_early_over_long_span() {
        let timestamps = vec![Some(ts(2020, 1, 1, 0)), Some(ts(2023, 6, 1, 0))];
        let columns = vec![float_column("v", &[1.0, 2.0])];
        let freq = Frequency::parse("S").unwrap();

        let out = Resample::new(&timestamps, &columns, freq)
            .with_limit(3)
            .sum()
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.labels[2], ts(2020, 1, 1, 0) + chrono::Duration::seconds(2));
        assert_eq!(out.columns[0].values()[0], CellValue::Float(1.0));
        assert_eq!(out.columns[0].values()[1], CellValue::Float(0.0));
    }

    #[test]
    fn test_limited_dtype_matches_full_run() {
        let timestamps = vec![
            Some(ts(2022, 1, 1, 0)),
            Some(ts(2022, 1, 2, 0)),
            Some(ts(2022, 1, 5, 0)),
        ];
        let columns = vec![Column::new(
            "n",
            DType::Int64,
            vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(5)],
        )];
        let freq = Frequency::parse("D").unwrap();

        let full = Resample::new(&timestamps, &columns, freq)
            .aggregate(Aggregation::Max)
            .unwrap();
        let head = Resample::new(&timestamps, &columns, freq)
            .with_limit(2)
            .aggregate(Aggregation::Max)
            .unwrap();
        assert_eq!(full.columns[0].dtype(), DType::Float64);
        assert_eq!(head.columns[0].dtype(), DType::Float64);
        assert_eq!(head.columns[0].values(), &full.columns[0].values()[..2]);

        let sums = Resample::new(&timestamps, &columns, freq)
            .with_limit(2)
            .sum()
            .unwrap();
        assert_eq!(sums.columns[0].dtype(), DType::Int64);
    }

    #[test]
    fn test_daily_mean_with_gap() {
        let timestamps = vec![
            Some(ts(2022, 1, 1, 0)),
            Some(ts(2022, 1, 1, 12)),
            Some(ts(2022, 1, 3, 6)),
        ];
        let columns = vec![float_column("v", &[1.0, 3.0, 5.0])];
        let freq = Frequency::parse("D").unwrap();

        let out = Resample::new(&timestamps, &columns, freq).mean().unwrap();
        assert_eq!(
            out.labels,
            vec![ts(2022, 1, 1, 0), ts(2022, 1, 2, 0), ts(2022, 1, 3, 0)]
        );
        let values = out.columns[0].values();
        assert_eq!(values[0], CellValue::Float(2.0));
        assert!(values[1].is_null());
        assert_eq!(values[2], CellValue::Float(5.0));
    }

    #[test]
    fn test_month_end_labels_and_sum() {
        let timestamps = vec![
            Some(ts(2022, 1, 5, 0)),
            Some(ts(2022, 1, 20, 0)),
            Some(ts(2022, 2, 3, 0)),
        ];
        let columns = vec![Column::new(
            "n",
            DType::Int64,
            vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(4)],
        )];
        let freq = Frequency::parse("M").unwrap();

        let out = Resample::new(&timestamps, &columns, freq).sum().unwrap();
        assert_eq!(out.labels, vec![ts(2022, 1, 31, 0), ts(2022, 2, 28, 0)]);
        assert_eq!(
            out.columns[0].values(),
            &[CellValue::Int(3), CellValue::Int(4)]
        );
        assert_eq!(out.columns[0].dtype(), DType::Int64);
    }

    #[test]
    fn test_numeric_only_aggregation_skips_text() {
        let timestamps = vec![Some(ts(2022, 1, 1, 0)), Some(ts(2022, 1, 2, 0))];
        let columns = vec![
            float_column("v", &[1.0, 2.0]),
            Column::new(
                "label",
                DType::Object,
                vec![CellValue::Text("a".into()), CellValue::Text("b".into())],
            ),
        ];
        let freq = Frequency::parse("D").unwrap();

        let mean = Resample::new(&timestamps, &columns, freq).mean().unwrap();
        assert_eq!(mean.columns.len(), 1);

        let last = Resample::new(&timestamps, &columns, freq)
            .aggregate(Aggregation::Last)
            .unwrap();
        assert_eq!(last.columns.len(), 2);
        assert_eq!(last.columns[1].values()[1], CellValue::Text("b".into()));
    }

    #[test]
    fn test_null_timestamps_are_excluded() {
        let timestamps = vec![Some(ts(2022, 1, 1, 1)), None, Some(ts(2022, 1, 1, 2))];
        let columns = vec![float_column("v", &[1.0, 100.0, 2.0])];
        let freq = Frequency::parse("D").unwrap();

        let out = Resample::new(&timestamps, &columns, freq)
            .aggregate(Aggregation::Count)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.columns[0].values()[0], CellValue::Int(2));
    }

    #[test]
    fn test_multi_hour_buckets_align_to_midnight() {
        let timestamps = vec![Some(ts(2022, 1, 1, 5)), Some(ts(2022, 1, 1, 6))];
        let columns = vec![float_column("v", &[1.0, 2.0])];
        let freq = Frequency::parse("2H").unwrap();

        let out = Resample::new(&timestamps, &columns, freq)
            .aggregate(Aggregation::Max)
            .unwrap();
        assert_eq!(out.labels, vec![ts(2022, 1, 1, 4), ts(2022, 1, 1, 6)]);
    }

    #[test]
    fn test_aggregation_names() {
        assert_eq!("MEDIAN".parse::<Aggregation>().unwrap(), Aggregation::Median);
        assert!("mode".parse::<Aggregation>().is_err());
        let values = [CellValue::Float(1.0), CellValue::Float(3.0)];
        let refs: Vec<&CellValue> = values.iter().collect();
        assert_eq!(
            Aggregation::Var.apply(DType::Float64, &refs),
            CellValue::Float(2.0)
        );
        assert_eq!(
            Aggregation::Std.apply(DType::Float64, &refs[..1]),
            CellValue::Null
        );
        assert_eq!(Aggregation::Sum.apply(DType::Int64, &[]), CellValue::Int(0));
    }
}
