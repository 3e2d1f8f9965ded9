use chrono::NaiveDateTime;

use crate::core::error::{Error, Result};
use crate::core::value::{CellValue, DType};

/// A named, typed column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: DType,
    values: Vec<CellValue>,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of missing values
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Iterate over the values that are not missing
    pub fn non_null(&self) -> impl Iterator<Item = &CellValue> + '_ {
        self.values.iter().filter(|v| !v.is_null())
    }

    /// Null mask, `true` where the value is missing
    pub fn null_mask(&self) -> Vec<bool> {
        self.values.iter().map(|v| v.is_null()).collect()
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.values.retain(|_| *flags.next().unwrap_or(&false));
    }
}

/// Datetime index set on a table by the time-series operations
#[derive(Debug, Clone, PartialEq)]
pub struct DatetimeIndex {
    /// Name of the column the index was built from
    pub name: String,
    /// One timestamp per row, `None` where the source value was missing
    pub values: Vec<Option<NaiveDateTime>>,
}

impl DatetimeIndex {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// DataFrame struct: Column-oriented 2D data structure
///
/// Columns keep their insertion order. All columns, and the index when one is
/// set, always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<Column>,
    index: Option<DatetimeIndex>,
    row_count: usize,
}

impl DataFrame {
    /// Create a new empty DataFrame
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a DataFrame from columns, checking names and lengths
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut df = Self::new();
        for column in columns {
            df.add_column(column)?;
        }
        Ok(df)
    }

    /// Check if the DataFrame contains a column with the given name
    pub fn contains_column(&self, column_name: &str) -> bool {
        self.columns.iter().any(|c| c.name == column_name)
    }

    /// Get the number of rows in the DataFrame
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Get the number of columns in the DataFrame
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Add a column to the DataFrame
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.contains_column(&column.name) {
            return Err(Error::InvalidInput(format!(
                "Duplicate column name: {}",
                column.name
            )));
        }

        if !self.columns.is_empty() && column.len() != self.row_count {
            return Err(Error::InvalidInput(format!(
                "Inconsistent row count: expected {}, found {}",
                self.row_count,
                column.len()
            )));
        }

        if self.columns.is_empty() {
            self.row_count = column.len();
        }
        self.columns.push(column);
        Ok(())
    }

    /// Get a column by name
    pub fn column(&self, column_name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == column_name)
            .ok_or_else(|| Error::ColumnNotFound(column_name.to_string()))
    }

    fn position(&self, column_name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == column_name)
            .ok_or_else(|| Error::ColumnNotFound(column_name.to_string()))
    }

    /// Replace the values (and dtype) of an existing column
    pub fn replace_column(
        &mut self,
        column_name: &str,
        dtype: DType,
        values: Vec<CellValue>,
    ) -> Result<()> {
        if values.len() != self.row_count {
            return Err(Error::InvalidInput(format!(
                "Inconsistent row count: expected {}, found {}",
                self.row_count,
                values.len()
            )));
        }
        let pos = self.position(column_name)?;
        let column = &mut self.columns[pos];
        column.dtype = dtype;
        column.values = values;
        Ok(())
    }

    /// Remove a column and return it
    pub fn drop_column(&mut self, column_name: &str) -> Result<Column> {
        let pos = self.position(column_name)?;
        Ok(self.columns.remove(pos))
    }

    /// Keep only the rows whose flag is `true`, across every column and the index
    pub fn retain_rows(&mut self, keep: &[bool]) -> Result<usize> {
        if keep.len() != self.row_count {
            return Err(Error::InvalidInput(format!(
                "Row mask length {} does not match row count {}",
                keep.len(),
                self.row_count
            )));
        }

        for column in &mut self.columns {
            column.retain_rows(keep);
        }
        if let Some(index) = self.index.as_mut() {
            let mut flags = keep.iter();
            index.values.retain(|_| *flags.next().unwrap_or(&false));
        }

        let before = self.row_count;
        self.row_count = keep.iter().filter(|k| **k).count();
        Ok(before - self.row_count)
    }

    /// Current datetime index, if one was set
    pub fn index(&self) -> Option<&DatetimeIndex> {
        self.index.as_ref()
    }

    /// Move a column into the index.
    ///
    /// The column leaves the column list; its parsed timestamps become the index.
    pub fn set_index(&mut self, column_name: &str, values: Vec<Option<NaiveDateTime>>) -> Result<()> {
        if values.len() != self.row_count {
            return Err(Error::InvalidInput(format!(
                "Index length {} does not match row count {}",
                values.len(),
                self.row_count
            )));
        }
        if let Some(current) = &self.index {
            return Err(Error::IndexAlreadySet {
                current: current.name.clone(),
                requested: column_name.to_string(),
            });
        }

        let pos = self.position(column_name)?;
        self.columns.remove(pos);
        self.index = Some(DatetimeIndex {
            name: column_name.to_string(),
            values,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> DataFrame {
        DataFrame::from_columns(vec![
            Column::new(
                "a",
                DType::Int64,
                vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)],
            ),
            Column::new(
                "b",
                DType::Object,
                vec![
                    CellValue::Text("x".into()),
                    CellValue::Null,
                    CellValue::Text("z".into()),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_and_lookup() {
        let df = sample();
        assert_eq!(df.row_count(), 3);
        assert_eq!(df.column_count(), 2);
        assert_eq!(df.column_names(), vec!["a", "b"]);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
        assert!(matches!(df.column("c"), Err(Error::ColumnNotFound(_))));
    }

    #[test]
    fn test_add_column_rejects_bad_length() {
        let mut df = sample();
        let result = df.add_column(Column::new("c", DType::Int64, vec![CellValue::Int(1)]));
        assert!(result.is_err());
        assert!(df.add_column(Column::new("a", DType::Int64, vec![])).is_err());
    }

    #[test]
    fn test_retain_rows_keeps_alignment() {
        let mut df = sample();
        let dropped = df.retain_rows(&[true, false, true]).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(df.row_count(), 2);
        assert_eq!(df.column("a").unwrap().values()[1], CellValue::Int(3));
        assert_eq!(df.column("b").unwrap().values()[1], CellValue::Text("z".into()));
    }

    #[test]
    fn test_set_index_moves_column() {
        let mut df = sample();
        let day = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        df.set_index("b", vec![Some(day), None, Some(day)]).unwrap();

        assert_eq!(df.column_names(), vec!["a"]);
        assert_eq!(df.index().unwrap().name, "b");

        df.retain_rows(&[false, true, true]).unwrap();
        assert_eq!(df.index().unwrap().values, vec![None, Some(day)]);

        let err = df.set_index("a", vec![None, None]).unwrap_err();
        assert!(matches!(err, Error::IndexAlreadySet { .. }));
    }
}
