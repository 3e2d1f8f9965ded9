use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashSet;

use crate::core::error::{Error, Result};
use crate::core::value::{format_datetime, is_midnight, CellValue, DType};
use crate::dataframe::{Column, DataFrame};
use crate::series::cast::{parse_bool, parse_number};

/// Field separators considered by [`detect_separator`], in tie-break order
pub const CANDIDATE_SEPARATORS: [char; 4] = [',', '\t', ';', '|'];

/// Tokens read as missing values
const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Pick the field separator with the highest occurrence count in `text`.
///
/// Ties, including the case where no candidate appears at all, go to the
/// earliest candidate in [`CANDIDATE_SEPARATORS`], so the fallback is a comma.
/// Counting is done over the whole text, quoted fields included; a free-text
/// column full of commas can therefore outvote a real tab separator.
pub fn detect_separator(text: &str) -> char {
    let mut best = CANDIDATE_SEPARATORS[0];
    let mut best_count = 0;
    for &sep in &CANDIDATE_SEPARATORS {
        let count = text.matches(sep).count();
        if count > best_count {
            best = sep;
            best_count = count;
        }
    }
    best
}

/// Decode a payload for separator sniffing, replacing invalid UTF-8
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Read a DataFrame from an in-memory delimited payload.
///
/// The first non-blank line is the header. Column dtypes are inferred from the
/// values: integers, floats, booleans, otherwise text.
pub fn read_csv_bytes(bytes: &[u8], separator: char) -> Result<DataFrame> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Parse(format!("'utf-8' codec can't decode payload: {}", e)))?;

    if text.trim().is_empty() {
        return Err(Error::Parse("No columns to parse from file".to_string()));
    }
    if !separator.is_ascii() {
        return Err(Error::Parse(format!("Unsupported separator {:?}", separator)));
    }

    let mut rdr = ReaderBuilder::new()
        .delimiter(separator as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = rdr
        .records()
        .filter(|r| !matches!(r, Ok(record) if is_blank(record, text)));

    let header = match records.next() {
        Some(record) => record.map_err(|e| Error::Parse(e.to_string()))?,
        None => return Err(Error::Parse("No columns to parse from file".to_string())),
    };
    let names = mangle_names(&header);
    let width = names.len();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for result in records {
        let record = result.map_err(|e| Error::Parse(e.to_string()))?;
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(Error::Parse(format!(
                "Error tokenizing data. Expected {} fields in line {}, saw {}",
                width,
                line,
                record.len()
            )));
        }
        for (i, cells) in raw.iter_mut().enumerate() {
            let cell = record
                .get(i)
                .filter(|field| !NA_VALUES.contains(field))
                .map(|field| field.to_string());
            cells.push(cell);
        }
    }

    let columns = names
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| infer_column(name, cells))
        .collect();

    let df = DataFrame::from_columns(columns)?;
    log::debug!(
        "parsed {} rows x {} columns with separator {:?}",
        df.row_count(),
        df.column_count(),
        separator
    );
    Ok(df)
}

/// Write a DataFrame to delimited bytes: header row, no index
pub fn write_csv_bytes(df: &DataFrame, separator: char) -> Result<Vec<u8>> {
    if !separator.is_ascii() {
        return Err(Error::InvalidInput(format!(
            "Unsupported separator {:?}",
            separator
        )));
    }
    let mut wtr = WriterBuilder::new()
        .delimiter(separator as u8)
        .from_writer(Vec::new());

    wtr.write_record(df.column_names())?;

    let date_only: Vec<bool> = df
        .columns()
        .iter()
        .map(|column| {
            column.dtype() == DType::DateTime
                && column
                    .values()
                    .iter()
                    .filter_map(CellValue::as_datetime)
                    .all(|dt| is_midnight(&dt))
        })
        .collect();

    for row in 0..df.row_count() {
        let record: Vec<String> = df
            .columns()
            .iter()
            .zip(&date_only)
            .map(|(column, &date_only)| match &column.values()[row] {
                CellValue::DateTime(dt) => format_datetime(dt, date_only),
                value => value.to_string(),
            })
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// A whitespace-only source line. A quoted empty field (`""`) is a null row, not blank.
fn is_blank(record: &StringRecord, text: &str) -> bool {
    if record.len() != 1 || !record[0].trim().is_empty() {
        return false;
    }
    let Some(start) = record.position().map(|p| p.byte() as usize) else {
        return true;
    };
    // The recorded start may sit on the line breaks skipped before the record
    let line = text
        .get(start..)
        .unwrap_or("")
        .trim_start_matches(|c: char| c == '\r' || c == '\n')
        .split('\n')
        .next()
        .unwrap_or("");
    !line.contains('"')
}

/// Unnamed headers become `Unnamed: i`; repeated names get `.1`, `.2`, ... suffixes
fn mangle_names(header: &StringRecord) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(header.len());

    for (i, raw) in header.iter().enumerate() {
        let base = if raw.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            raw.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

/// Infer the dtype of a parsed column and convert its cells
fn infer_column(name: String, cells: Vec<Option<String>>) -> Column {
    let present: Vec<&str> = cells.iter().flatten().map(String::as_str).collect();
    let has_nulls = present.len() < cells.len();

    if cells.is_empty() {
        return Column::new(name, DType::Object, Vec::new());
    }

    if present.iter().all(|s| s.trim().parse::<i64>().is_ok()) {
        let values = cells
            .iter()
            .map(|cell| match cell.as_deref().map(|s| s.trim().parse::<i64>()) {
                Some(Ok(v)) if has_nulls => CellValue::Float(v as f64),
                Some(Ok(v)) => CellValue::Int(v),
                _ => CellValue::Null,
            })
            .collect();
        let dtype = if has_nulls { DType::Float64 } else { DType::Int64 };
        return Column::new(name, dtype, values);
    }

    let numbers: Option<Vec<CellValue>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(CellValue::Null),
            Some(s) => parse_number(s).map(|v| CellValue::Float(v.as_f64().unwrap_or(f64::NAN))),
        })
        .collect();
    if let Some(values) = numbers {
        return Column::new(name, DType::Float64, values);
    }

    if !has_nulls && present.iter().all(|s| parse_bool(s).is_some()) {
        let values = present
            .iter()
            .map(|s| parse_bool(s).map(CellValue::Bool).unwrap_or(CellValue::Null))
            .collect();
        return Column::new(name, DType::Bool, values);
    }

    let values = cells
        .into_iter()
        .map(|cell| cell.map(CellValue::Text).unwrap_or(CellValue::Null))
        .collect();
    Column::new(name, DType::Object, values)
}
