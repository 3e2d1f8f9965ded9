use tseda::eda::{DatasetAnalyzer, TypeSuggestion};
use tseda::{CellValue, DType, Error};

const MIXED: &[u8] = b"id,value,label\n1,1,a\n2,2,b\n3,x,a\n4,4,\n";

#[test]
fn test_basic_info_shape() -> Result<(), Error> {
    let analyzer = DatasetAnalyzer::new(b"a,b\n1,2\n3,4\n", "small.csv")?;
    let info = analyzer.basic_info();

    assert_eq!(info.shape(), (2, 2));
    assert_eq!(info.columns, vec!["a", "b"]);
    assert_eq!(info.dtypes.get("a").map(String::as_str), Some("int64"));
    assert_eq!(info.nulls.get("b"), Some(&0));
    Ok(())
}

#[test]
fn test_export_round_trip() -> Result<(), Error> {
    let original = DatasetAnalyzer::new(b"a;b;c\n1;2.5;x\n3;;y\n", "semi.csv")?;
    assert_eq!(original.separator(), ';');

    let exported = original.save_cleaned_csv()?;
    let reloaded = DatasetAnalyzer::new(&exported, "semi.csv")?;

    assert_eq!(reloaded.separator(), ';');
    assert_eq!(reloaded.table(), original.table());
    Ok(())
}

#[test]
fn test_single_column_nulls_round_trip() -> Result<(), Error> {
    let original = DatasetAnalyzer::new(b"a\n1\nNA\n3\n", "single.csv")?;
    assert_eq!(original.basic_info().shape(), (3, 1));
    assert_eq!(original.table().column("a")?.null_count(), 1);

    let exported = original.save_cleaned_csv()?;
    let reloaded = DatasetAnalyzer::new(&exported, "single.csv")?;

    assert_eq!(reloaded.basic_info().shape(), (3, 1));
    assert_eq!(reloaded.table(), original.table());
    Ok(())
}

#[test]
fn test_failed_cast_leaves_column_unchanged() -> Result<(), Error> {
    let mut analyzer = DatasetAnalyzer::new(MIXED, "mixed.csv")?;
    let before = analyzer.table().column("value")?.clone();

    let outcome = analyzer.try_cast_column("value", "numeric")?;
    assert!(!outcome.success);
    assert_eq!(outcome.convertible_rows, Some(3));
    assert_eq!(outcome.non_convertible_rows, Some(1));
    assert_eq!(
        outcome.message.as_deref(),
        Some("1 / 4 rows cannot be converted to numeric.")
    );
    assert_eq!(analyzer.table().column("value")?, &before);

    let dropped = analyzer.drop_non_convertible_rows("value", "numeric")?;
    assert_eq!(dropped.dropped_rows, 1);
    assert_eq!(dropped.remaining_rows, 3);

    let column = analyzer.table().column("value")?;
    assert!(column.dtype().is_numeric());
    assert_eq!(column.null_count(), 0);
    let kept: Vec<Option<f64>> = column.values().iter().map(CellValue::as_f64).collect();
    assert_eq!(kept, vec![Some(1.0), Some(2.0), Some(4.0)]);
    assert_eq!(analyzer.table().column("id")?.values().len(), 3);
    Ok(())
}

#[test]
fn test_successful_cast_commits() -> Result<(), Error> {
    let mut analyzer = DatasetAnalyzer::new(b"n\n1\n2\n3\n", "n.csv")?;
    let outcome = analyzer.try_cast_column("n", "float")?;

    assert!(outcome.success);
    assert_eq!(
        outcome.message.as_deref(),
        Some("Column n successfully cast to float.")
    );
    assert_eq!(analyzer.table().column("n")?.dtype(), DType::Float64);
    Ok(())
}

#[test]
fn test_unknown_dtype() -> Result<(), Error> {
    let mut analyzer = DatasetAnalyzer::new(MIXED, "mixed.csv")?;

    let outcome = analyzer.try_cast_column("value", "decimal")?;
    assert!(!outcome.success);
    assert!(outcome.error.is_some());

    assert!(matches!(
        analyzer.drop_non_convertible_rows("value", "decimal"),
        Err(Error::UnsupportedType(_))
    ));
    Ok(())
}

#[test]
fn test_missing_column() -> Result<(), Error> {
    let mut analyzer = DatasetAnalyzer::new(MIXED, "mixed.csv")?;
    assert!(matches!(
        analyzer.column_nulls("nope"),
        Err(Error::ColumnNotFound(_))
    ));
    assert!(matches!(
        analyzer.drop_column("nope"),
        Err(Error::ColumnNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_inspection_reports() -> Result<(), Error> {
    let analyzer = DatasetAnalyzer::new(MIXED, "mixed.csv")?;

    let counts = analyzer.column_value_counts("label", None)?;
    assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(counts.get("a"), Some(&2));

    let nulls = analyzer.column_nulls("label")?;
    assert_eq!((nulls.null_count, nulls.total_rows), (1, 4));

    let schema = analyzer.schema_overview();
    let label = schema.get("label").ok_or(Error::ColumnNotFound("label".into()))?;
    assert_eq!(label.non_null_count, 3);
    assert_eq!(label.unique_count, 2);

    let suggestions = analyzer.suggest_types_for_all();
    assert_eq!(suggestions.get("id"), Some(&TypeSuggestion::Numeric));
    assert_eq!(suggestions.get("value"), Some(&TypeSuggestion::String));
    Ok(())
}

#[test]
fn test_cleaning_steps_and_export() -> Result<(), Error> {
    let mut analyzer = DatasetAnalyzer::new(MIXED, "mixed.csv")?;

    let dropped = analyzer.drop_rows_with_null("label")?;
    assert_eq!((dropped.dropped_rows, dropped.remaining_rows), (1, 3));

    let removed = analyzer.drop_column("id")?;
    assert_eq!(removed.remaining_columns, vec!["value", "label"]);

    let exported = String::from_utf8(analyzer.save_cleaned_csv()?)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let lines: Vec<&str> = exported.lines().collect();
    assert_eq!(lines, vec!["value,label", "1,a", "2,b", "x,a"]);

    let reloaded = DatasetAnalyzer::new(exported.as_bytes(), "mixed.csv")?;
    assert_eq!(
        reloaded.table().column("value")?.values()[2],
        CellValue::Text("x".to_string())
    );
    Ok(())
}
