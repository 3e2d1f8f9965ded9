//! Module for generating date ranges
//!
//! This module provides functionality for creating ranges of dates
//! with specified frequencies.

use chrono::NaiveDateTime;

use crate::core::error::{Error, Result};
use crate::temporal::frequency::Frequency;

/// Structure to generate a date range
#[derive(Debug, Clone)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
    freq: Frequency,
}

impl DateRange {
    /// Create a date range from start, end, and frequency
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, freq: Frequency) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(
                "Start date must be earlier than end date".to_string(),
            ));
        }

        Ok(DateRange { start, end, freq })
    }

    /// Get all points in the date range.
    ///
    /// The first point is `start` rolled forward onto the frequency's grid; the
    /// time of day of `start` is kept for calendar frequencies.
    pub fn generate(&self) -> Vec<NaiveDateTime> {
        let mut result = Vec::new();
        let mut next = self.freq.rollforward(self.start);

        // The range also ends where the calendar runs out
        while let Some(current) = next.filter(|ts| *ts <= self.end) {
            result.push(current);
            next = self.freq.advance(current).filter(|ts| *ts > current);
        }

        result
    }
}

/// Generate date range (convenience function)
pub fn date_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    freq: Frequency,
) -> Result<Vec<NaiveDateTime>> {
    DateRange::new(start, end, freq).map(|range| range.generate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_daily_range() {
        let freq = Frequency::parse("D").unwrap();
        let range = date_range(ts(2022, 1, 1), ts(2022, 1, 5), freq).unwrap();
        assert_eq!(range.len(), 5);
        assert_eq!(range[4], ts(2022, 1, 5));
    }

    #[test]
    fn test_month_end_range() {
        let freq = Frequency::parse("M").unwrap();
        let range = date_range(ts(2022, 1, 1), ts(2022, 4, 30), freq).unwrap();
        assert_eq!(
            range,
            vec![
                ts(2022, 1, 31),
                ts(2022, 2, 28),
                ts(2022, 3, 31),
                ts(2022, 4, 30)
            ]
        );
    }

    #[test]
    fn test_quarter_start_range_with_multiple() {
        let freq = Frequency::parse("2QS").unwrap();
        let range = date_range(ts(2022, 1, 1), ts(2023, 1, 1), freq).unwrap();
        assert_eq!(range, vec![ts(2022, 1, 1), ts(2022, 7, 1), ts(2023, 1, 1)]);
    }

    #[test]
    fn test_range_stops_at_calendar_end() {
        let freq = Frequency::parse("1000000D").unwrap();
        let range = date_range(ts(2022, 1, 1), NaiveDateTime::MAX, freq).unwrap();
        assert!(range.len() > 90);
        assert_eq!(range[0], ts(2022, 1, 1));

        let freq = Frequency::parse("1000000A").unwrap();
        let range = date_range(ts(2022, 1, 1), NaiveDateTime::MAX, freq).unwrap();
        assert_eq!(range, vec![ts(2022, 12, 31)]);
    }

    #[test]
    fn test_invalid_range() {
        let freq = Frequency::parse("D").unwrap();
        assert!(date_range(ts(2022, 2, 1), ts(2022, 1, 1), freq).is_err());
    }
}
