//! Dataset analyzer
//!
//! A [`DatasetAnalyzer`] parses one delimited payload at construction and owns
//! the resulting table for its whole lifetime. Inspection calls are pure reads;
//! cast, drop and time-series calls mutate the table in place; export writes
//! the current table back out with the separator detected at ingestion.

pub mod report;

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::config::EdaConfig;
use crate::core::error::{Error, Result};
use crate::core::value::CellValue;
use crate::dataframe::DataFrame;
use crate::io::csv::{decode_lossy, detect_separator, read_csv_bytes, write_csv_bytes};
use crate::series::cast::{coerce, parse_datetime, to_datetime, to_numeric, CastTarget};
use crate::temporal::{infer_frequency, Aggregation, Frequency, Resample};
use crate::time_series::{Decomposer, Decomposition, StlDecomposer};
use crate::vis::{encode_base64, DecompositionRenderer, PlotSettings, PlottersPngRenderer};

pub use self::report::{
    BasicInfo, CastOutcome, ColumnDropped, ColumnNulls, ColumnSchema, DatetimeCheck,
    DropOutcome, FrequencyCheck, NullRowsDropped, OrderedMap, Record, TypeSuggestion,
};

/// Defaults applied when a call leaves an argument out
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub value_counts_top_n: usize,
    pub preview_rows: usize,
    pub default_aggregation: Aggregation,
    pub plot: PlotSettings,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            value_counts_top_n: 10,
            preview_rows: 5,
            default_aggregation: Aggregation::Mean,
            plot: PlotSettings::default(),
        }
    }
}

impl AnalyzerOptions {
    /// Options taken from the `analysis` and `plot` sections of a loaded config
    pub fn from_config(config: &EdaConfig) -> Result<Self> {
        Ok(AnalyzerOptions {
            value_counts_top_n: config.analysis.value_counts_top_n,
            preview_rows: config.analysis.preview_rows,
            default_aggregation: config.analysis.default_aggregation.parse()?,
            plot: PlotSettings::with_size(config.plot.width, config.plot.height),
        })
    }
}

/// Exploration and light cleaning of one uploaded dataset
#[derive(Debug, Clone)]
pub struct DatasetAnalyzer {
    filename: String,
    separator: char,
    table: DataFrame,
    options: AnalyzerOptions,
}

impl DatasetAnalyzer {
    /// Parse a payload with default options
    pub fn new(payload: &[u8], filename: &str) -> Result<Self> {
        Self::with_options(payload, filename, AnalyzerOptions::default())
    }

    /// Parse a payload: detect the separator, then read the table
    pub fn with_options(payload: &[u8], filename: &str, options: AnalyzerOptions) -> Result<Self> {
        let separator = detect_separator(&decode_lossy(payload));
        log::debug!("{}: detected separator {:?}", filename, separator);

        let table = read_csv_bytes(payload, separator)?;
        log::info!(
            "{}: loaded {} rows x {} columns",
            filename,
            table.row_count(),
            table.column_count()
        );

        Ok(DatasetAnalyzer {
            filename: filename.to_string(),
            separator,
            table,
            options,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Separator detected at ingestion, reused on export
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Current state of the working table
    pub fn table(&self) -> &DataFrame {
        &self.table
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Shape, column names, dtypes and null counts
    pub fn basic_info(&self) -> BasicInfo {
        BasicInfo {
            row_count: self.table.row_count(),
            column_count: self.table.column_count(),
            columns: self.table.column_names(),
            dtypes: self
                .table
                .columns()
                .iter()
                .map(|c| (c.name(), c.dtype().label().to_string()))
                .collect(),
            nulls: self
                .table
                .columns()
                .iter()
                .map(|c| (c.name(), c.null_count()))
                .collect(),
        }
    }

    /// Most frequent non-null values of a column, most frequent first.
    ///
    /// Ties keep the order in which values first appear.
    pub fn column_value_counts(
        &self,
        column: &str,
        top_n: Option<usize>,
    ) -> Result<OrderedMap<usize>> {
        let column = self.table.column(column)?;
        let top_n = top_n.unwrap_or(self.options.value_counts_top_n);

        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(String, usize)> = Vec::new();
        for value in column.non_null() {
            let key = value.group_key();
            match positions.get(&key) {
                Some(&pos) => counts[pos].1 += 1,
                None => {
                    positions.insert(key, counts.len());
                    counts.push((value.to_string(), 1));
                }
            }
        }

        // Stable sort keeps first-seen order among equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(counts.into_iter().take(top_n).collect())
    }

    /// Suggest `numeric`, `datetime` or `string` for a column
    pub fn suggest_cast_type(&self, column: &str) -> Result<TypeSuggestion> {
        let column = self.table.column(column)?;
        let present: Vec<CellValue> = column.non_null().cloned().collect();

        if to_numeric(&present).iter().all(|v| !v.is_null()) {
            return Ok(TypeSuggestion::Numeric);
        }
        if to_datetime(&present).iter().all(|v| !v.is_null()) {
            return Ok(TypeSuggestion::Datetime);
        }
        Ok(TypeSuggestion::String)
    }

    /// Dtype and counts for every column
    pub fn schema_overview(&self) -> OrderedMap<ColumnSchema> {
        self.table
            .columns()
            .iter()
            .map(|c| {
                let unique: HashSet<String> = c.non_null().map(CellValue::group_key).collect();
                let null_count = c.null_count();
                (
                    c.name(),
                    ColumnSchema {
                        dtype: c.dtype().label().to_string(),
                        null_count,
                        non_null_count: c.len() - null_count,
                        unique_count: unique.len(),
                    },
                )
            })
            .collect()
    }

    /// [`suggest_cast_type`](Self::suggest_cast_type) for every column
    pub fn suggest_types_for_all(&self) -> OrderedMap<TypeSuggestion> {
        self.table
            .column_names()
            .into_iter()
            .filter_map(|name| {
                let suggestion = self.suggest_cast_type(&name).ok()?;
                Some((name, suggestion))
            })
            .collect()
    }

    pub fn column_nulls(&self, column: &str) -> Result<ColumnNulls> {
        let col = self.table.column(column)?;
        Ok(ColumnNulls {
            column: column.to_string(),
            null_count: col.null_count(),
            total_rows: col.len(),
        })
    }

    /// Cast a column only if every row converts.
    ///
    /// Nulls already present in the column count as rows that cannot be converted.
    /// An unknown dtype label is reported in the outcome rather than returned as an
    /// error.
    pub fn try_cast_column(&mut self, column: &str, dtype: &str) -> Result<CastOutcome> {
        let col = self.table.column(column)?;
        let target = match CastTarget::parse(dtype) {
            Ok(target) => target,
            Err(e) => return Ok(CastOutcome::failed(e.to_string())),
        };

        let coerced = coerce(col, target);
        let failed = coerced.null_count();
        let total = coerced.values.len();

        if failed > 0 {
            log::debug!(
                "{}: cast of '{}' to {} rejected, {} / {} rows fail",
                self.filename,
                column,
                dtype,
                failed,
                total
            );
            return Ok(CastOutcome::rejected(dtype, failed, total));
        }

        self.table
            .replace_column(column, coerced.dtype, coerced.values)?;
        log::info!("{}: cast '{}' to {}", self.filename, column, dtype);
        Ok(CastOutcome::committed(column, dtype))
    }

    /// Cast a column and drop every row whose value does not convert
    pub fn drop_non_convertible_rows(&mut self, column: &str, dtype: &str) -> Result<DropOutcome> {
        let target = CastTarget::parse(dtype)?;
        let coerced = coerce(self.table.column(column)?, target);

        let keep: Vec<bool> = coerced.values.iter().map(|v| !v.is_null()).collect();
        let retained: Vec<CellValue> = coerced
            .values
            .into_iter()
            .filter(|v| !v.is_null())
            .collect();

        let dropped = self.table.retain_rows(&keep)?;
        self.table.replace_column(column, coerced.dtype, retained)?;
        log::info!(
            "{}: dropped {} rows not convertible to {} in '{}'",
            self.filename,
            dropped,
            dtype,
            column
        );

        Ok(DropOutcome {
            dropped_rows: dropped,
            remaining_rows: self.table.row_count(),
        })
    }

    pub fn drop_column(&mut self, column: &str) -> Result<ColumnDropped> {
        self.table.drop_column(column)?;
        log::info!("{}: dropped column '{}'", self.filename, column);
        Ok(ColumnDropped {
            column: column.to_string(),
            remaining_columns: self.table.column_names(),
        })
    }

    pub fn drop_rows_with_null(&mut self, column: &str) -> Result<NullRowsDropped> {
        let keep: Vec<bool> = self
            .table
            .column(column)?
            .null_mask()
            .into_iter()
            .map(|is_null| !is_null)
            .collect();
        let dropped = self.table.retain_rows(&keep)?;
        log::info!(
            "{}: dropped {} rows with null '{}'",
            self.filename,
            dropped,
            column
        );

        Ok(NullRowsDropped {
            column: column.to_string(),
            dropped_rows: dropped,
            remaining_rows: self.table.row_count(),
        })
    }

    /// Check whether every value of a column parses as a datetime, without changing it
    pub fn check_datetime_column(&self, column: &str) -> Result<DatetimeCheck> {
        let parsed = to_datetime(&self.datetime_source(column)?);
        let failed = parsed.iter().filter(|v| v.is_null()).count();

        if failed > 0 {
            return Ok(DatetimeCheck {
                success: false,
                message: format!("{} rows could not be converted to datetime.", failed),
                failed_rows: Some(failed),
                min_date: None,
                max_date: None,
            });
        }

        let timestamps = parsed.iter().filter_map(CellValue::as_datetime);
        Ok(DatetimeCheck {
            success: true,
            message: "Datetime column is valid.".to_string(),
            failed_rows: None,
            min_date: timestamps.clone().min(),
            max_date: timestamps.max(),
        })
    }

    /// Check whether resampling a datetime column at `freq` makes sense
    pub fn check_frequency_applicability(&self, column: &str, freq: &str) -> Result<FrequencyCheck> {
        let mut timestamps: Vec<NaiveDateTime> = to_datetime(&self.datetime_source(column)?)
            .iter()
            .filter_map(CellValue::as_datetime)
            .collect();
        timestamps.sort();

        let Some(inferred) = infer_frequency(&timestamps) else {
            return Ok(FrequencyCheck {
                applicable: false,
                inferred_freq: None,
                reason: Some("Irregular datetime intervals, frequency inference failed.".to_string()),
            });
        };

        let requested = Frequency::parse(freq)?;
        let (first, last) = (timestamps[0], timestamps[timestamps.len() - 1]);
        let applicable = requested.rollforward(first).is_some_and(|point| point <= last);

        Ok(FrequencyCheck {
            applicable,
            inferred_freq: Some(inferred.to_string()),
            reason: (!applicable).then(|| "Requested frequency does not align with data.".to_string()),
        })
    }

    /// Resample the table on a datetime column and return the first `rows` buckets.
    ///
    /// The datetime column becomes the table index; this change stays after the
    /// call.
    pub fn preview_resample(
        &mut self,
        datetime_col: &str,
        freq: &str,
        agg: Option<&str>,
        rows: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.ensure_index(datetime_col)?;

        let frequency = Frequency::parse(freq)?;
        let aggregation = match agg {
            Some(name) => name.parse::<Aggregation>()?,
            None => self.options.default_aggregation,
        };
        let rows = rows.unwrap_or(self.options.preview_rows);

        let index = self
            .table
            .index()
            .ok_or_else(|| Error::InvalidInput("Datetime index is not set".to_string()))?;
        let resampled = Resample::new(&index.values, self.table.columns(), frequency)
            .with_limit(rows)
            .aggregate(aggregation)?;

        let records = resampled
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut record = Record::new();
                record.insert(index.name.clone(), CellValue::DateTime(*label));
                for column in &resampled.columns {
                    record.insert(column.name(), column.values()[i].clone());
                }
                record
            })
            .collect();

        Ok(records)
    }

    /// Robust STL decomposition rendered as a base64 PNG
    pub fn seasonal_decomposition(
        &mut self,
        datetime_col: &str,
        target_col: &str,
        period: Option<usize>,
    ) -> Result<String> {
        let renderer = PlottersPngRenderer::new(self.options.plot.clone());
        self.seasonal_decomposition_with(
            datetime_col,
            target_col,
            period,
            &StlDecomposer::default(),
            &renderer,
        )
    }

    /// Seasonal decomposition with a caller supplied algorithm and renderer
    pub fn seasonal_decomposition_with(
        &mut self,
        datetime_col: &str,
        target_col: &str,
        period: Option<usize>,
        decomposer: &dyn Decomposer,
        renderer: &dyn DecompositionRenderer,
    ) -> Result<String> {
        let (timestamps, decomposition) =
            self.decompose_series(datetime_col, target_col, period, decomposer)?;
        let png = renderer.render(&timestamps, &decomposition)?;
        Ok(encode_base64(&png))
    }

    /// Decompose a numeric column over the datetime index without rendering.
    ///
    /// Rows with a null target or a null timestamp are left out. Without an
    /// explicit period, one is derived from the inferred sampling frequency.
    pub fn decompose_series(
        &mut self,
        datetime_col: &str,
        target_col: &str,
        period: Option<usize>,
        decomposer: &dyn Decomposer,
    ) -> Result<(Vec<NaiveDateTime>, Decomposition)> {
        self.ensure_index(datetime_col)?;

        let column = self.table.column(target_col)?;
        if !column.dtype().is_numeric() {
            return Err(Error::Type(format!(
                "Column '{}' has dtype {}, a numeric column is required",
                target_col,
                column.dtype()
            )));
        }
        let index = self
            .table
            .index()
            .ok_or_else(|| Error::InvalidInput("Datetime index is not set".to_string()))?;

        let (timestamps, values): (Vec<NaiveDateTime>, Vec<f64>) = index
            .values
            .iter()
            .zip(column.values())
            .filter_map(|(ts, value)| Some(((*ts)?, value.as_f64()?)))
            .unzip();

        let period = match period {
            Some(p) => p,
            None => {
                let frequency = infer_frequency(&timestamps).ok_or_else(|| {
                    Error::FrequencyInference(
                        "Could not infer frequency for STL decomposition.".to_string(),
                    )
                })?;
                frequency.seasonal_period().ok_or_else(|| {
                    Error::FrequencyInference(format!(
                        "No seasonal period is known for frequency {}.",
                        frequency
                    ))
                })?
            }
        };

        log::debug!(
            "{}: {} decomposition of '{}' over {} points, period {}",
            self.filename,
            decomposer.name(),
            target_col,
            values.len(),
            period
        );
        let decomposition = decomposer.decompose(&values, period)?;
        Ok((timestamps, decomposition))
    }

    /// Current table as delimited bytes, using the detected separator
    pub fn save_cleaned_csv(&self) -> Result<Vec<u8>> {
        write_csv_bytes(&self.table, self.separator)
    }

    /// Values of a datetime column, or of the index when it was built from that column
    fn datetime_source(&self, column: &str) -> Result<Vec<CellValue>> {
        match self.table.column(column) {
            Ok(col) => Ok(col.values().to_vec()),
            Err(e) => match self.table.index() {
                Some(index) if index.name == column => Ok(index
                    .values
                    .iter()
                    .map(|v| v.map(CellValue::DateTime).unwrap_or(CellValue::Null))
                    .collect()),
                _ => Err(e),
            },
        }
    }

    /// Move a datetime column into the index, parsing every value strictly.
    ///
    /// Naming the column the index already comes from is a no-op; naming another
    /// column fails and leaves the table as it is.
    fn ensure_index(&mut self, datetime_col: &str) -> Result<()> {
        if let Some(index) = self.table.index() {
            if index.name == datetime_col {
                return Ok(());
            }
            return Err(Error::IndexAlreadySet {
                current: index.name.clone(),
                requested: datetime_col.to_string(),
            });
        }

        let values = self
            .table
            .column(datetime_col)?
            .values()
            .iter()
            .map(|value| strict_datetime(datetime_col, value))
            .collect::<Result<Vec<_>>>()?;

        self.table.set_index(datetime_col, values)?;
        log::info!("{}: set '{}' as datetime index", self.filename, datetime_col);
        Ok(())
    }
}

fn strict_datetime(column: &str, value: &CellValue) -> Result<Option<NaiveDateTime>> {
    if value.is_null() {
        return Ok(None);
    }
    let parsed = match value {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Text(s) => parse_datetime(s),
        other => to_datetime(std::slice::from_ref(other))
            .first()
            .and_then(CellValue::as_datetime),
    };
    parsed.map(Some).ok_or_else(|| {
        Error::Cast(format!(
            "Unable to parse '{}' in column '{}' as datetime",
            value, column
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(text: &str) -> DatasetAnalyzer {
        DatasetAnalyzer::new(text.as_bytes(), "test.csv").unwrap()
    }

    #[test]
    fn test_value_counts_order_and_limit() {
        let eda = analyzer("c\nb\na\nb\na\nc\nb\n\n");
        let counts = eda.column_value_counts("c", Some(2)).unwrap();
        assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(counts.get("b"), Some(&3));
    }

    #[test]
    fn test_suggest_cast_type() {
        let eda = analyzer("n,d,s,e\n1,2022-01-01,x,\n2.5,2022-01-02,y,\n");
        assert_eq!(eda.suggest_cast_type("n").unwrap(), TypeSuggestion::Numeric);
        assert_eq!(eda.suggest_cast_type("d").unwrap(), TypeSuggestion::Datetime);
        assert_eq!(eda.suggest_cast_type("s").unwrap(), TypeSuggestion::String);
        // all-null columns vacuously pass the numeric check
        assert_eq!(eda.suggest_cast_type("e").unwrap(), TypeSuggestion::Numeric);
        assert!(matches!(
            eda.suggest_cast_type("missing"),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_schema_overview() {
        let eda = analyzer("a,b\n1,x\n1,\n2,y\n");
        let schema = eda.schema_overview();
        let a = schema.get("a").unwrap();
        assert_eq!(a.dtype, "int64");
        assert_eq!(a.unique_count, 2);
        let b = schema.get("b").unwrap();
        assert_eq!(b.null_count, 1);
        assert_eq!(b.non_null_count, 2);
    }

    #[test]
    fn test_unknown_dtype_is_reported_not_raised() {
        let mut eda = analyzer("a\n1\n2\n");
        let outcome = eda.try_cast_column("a", "complex").unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("complex"));
        assert!(eda.drop_non_convertible_rows("a", "complex").is_err());
    }

    #[test]
    fn test_preexisting_nulls_block_cast() {
        let mut eda = analyzer("a,b\n1,x\n,y\n3,z\n");
        let outcome = eda.try_cast_column("a", "numeric").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.non_convertible_rows, Some(1));
    }

    #[test]
    fn test_reindex_on_other_column_fails() {
        let mut eda = analyzer(
            "t,u,v\n2022-01-01,2022-02-01,1\n2022-01-02,2022-02-02,2\n2022-01-03,2022-02-03,3\n",
        );
        eda.preview_resample("t", "D", None, None).unwrap();
        // same column again reuses the index
        assert_eq!(eda.preview_resample("t", "D", Some("sum"), None).unwrap().len(), 3);

        let before = eda.table().clone();
        let err = eda.preview_resample("u", "D", None, None).unwrap_err();
        assert!(matches!(err, Error::IndexAlreadySet { .. }));
        assert_eq!(eda.table(), &before);
    }

    #[test]
    fn test_strict_datetime_coercion_on_resample() {
        let mut eda = analyzer("t,v\n2022-01-01,1\nsoon,2\n");
        let err = eda.preview_resample("t", "D", None, None).unwrap_err();
        assert!(matches!(err, Error::Cast(_)));
        assert!(eda.table().index().is_none());
    }
}
