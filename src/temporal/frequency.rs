use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, Result};

lazy_static! {
    static ref ALIAS_PATTERN: Regex = Regex::new(r"^\s*(\d+)?\s*([A-Za-z][A-Za-z-]*)\s*$").unwrap();
}

/// 1970-01-04 was a Sunday; weekly periods are counted from it
const REF_SUNDAY: (i32, u32, u32) = (1970, 1, 4);
/// 1970-01-05 was a Monday; business days are counted from it
const REF_MONDAY: (i32, u32, u32) = (1970, 1, 5);
/// Largest accepted alias multiple
pub const MAX_MULTIPLE: u32 = 1_000_000;

/// Base unit of a frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Monday to Friday
    BusinessDay,
    /// Weeks ending on Sunday
    Week,
    MonthEnd,
    MonthStart,
    QuarterEnd,
    QuarterStart,
    YearEnd,
    YearStart,
}

/// Enumeration representing frequency (period) of time series data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    /// How many units make one step
    pub multiple: u32,
    pub unit: FrequencyUnit,
}

impl Frequency {
    pub fn new(multiple: u32, unit: FrequencyUnit) -> Self {
        Self { multiple, unit }
    }

    /// Parse a frequency alias such as `D`, `3H`, `15min`, `W`, `MS` or `Q`
    pub fn parse(alias: &str) -> Result<Self> {
        let invalid = || Error::InvalidFrequency(alias.to_string());
        let caps = ALIAS_PATTERN.captures(alias).ok_or_else(invalid)?;

        let multiple = match caps.get(1) {
            Some(m) => m.as_str().parse::<u32>().map_err(|_| invalid())?,
            None => 1,
        };
        if multiple == 0 || multiple > MAX_MULTIPLE {
            return Err(invalid());
        }

        let unit = match caps.get(2).map(|m| m.as_str()).unwrap_or_default() {
            "S" | "s" | "sec" => FrequencyUnit::Second,
            "T" | "min" => FrequencyUnit::Minute,
            "H" | "h" => FrequencyUnit::Hour,
            "D" | "d" => FrequencyUnit::Day,
            "B" => FrequencyUnit::BusinessDay,
            "W" | "W-SUN" => FrequencyUnit::Week,
            "M" | "ME" => FrequencyUnit::MonthEnd,
            "MS" => FrequencyUnit::MonthStart,
            "Q" | "QE" | "Q-DEC" | "QE-DEC" => FrequencyUnit::QuarterEnd,
            "QS" | "QS-JAN" => FrequencyUnit::QuarterStart,
            "A" | "Y" | "YE" | "A-DEC" | "Y-DEC" | "YE-DEC" => FrequencyUnit::YearEnd,
            "AS" | "YS" | "AS-JAN" | "YS-JAN" => FrequencyUnit::YearStart,
            _ => return Err(invalid()),
        };

        Ok(Self::new(multiple, unit))
    }

    /// Fixed-width frequencies step by a constant duration
    pub fn is_tick(&self) -> bool {
        matches!(
            self.unit,
            FrequencyUnit::Second | FrequencyUnit::Minute | FrequencyUnit::Hour | FrequencyUnit::Day
        )
    }

    /// Whether buckets are labelled with the end of their period
    pub fn is_end_anchored(&self) -> bool {
        matches!(
            self.unit,
            FrequencyUnit::Week
                | FrequencyUnit::MonthEnd
                | FrequencyUnit::QuarterEnd
                | FrequencyUnit::YearEnd
        )
    }

    /// Duration of one unit for tick frequencies
    fn unit_duration(&self) -> Option<Duration> {
        match self.unit {
            FrequencyUnit::Second => Some(Duration::seconds(1)),
            FrequencyUnit::Minute => Some(Duration::minutes(1)),
            FrequencyUnit::Hour => Some(Duration::hours(1)),
            FrequencyUnit::Day => Some(Duration::days(1)),
            _ => None,
        }
    }

    /// Duration of one full step for tick frequencies.
    ///
    /// `None` for calendar frequencies and for steps beyond the representable range.
    pub fn tick_duration(&self) -> Option<Duration> {
        let multiple = i32::try_from(self.multiple).ok()?;
        self.unit_duration()?.checked_mul(multiple)
    }

    /// Index of the unit period containing `ts`.
    ///
    /// Tick units count from `origin`; calendar units count from fixed references,
    /// so `origin` is ignored for them.
    pub fn unit_ordinal(&self, ts: NaiveDateTime, origin: NaiveDateTime) -> i64 {
        if let Some(unit) = self.unit_duration() {
            return (ts - origin).num_seconds().div_euclid(unit.num_seconds());
        }

        let date = ts.date();
        match self.unit {
            FrequencyUnit::Week => {
                let days = (date - reference(REF_SUNDAY)).num_days();
                (days + 6).div_euclid(7)
            }
            FrequencyUnit::BusinessDay => {
                let days = (date - reference(REF_MONDAY)).num_days();
                days.div_euclid(7) * 5 + days.rem_euclid(7).min(4)
            }
            FrequencyUnit::MonthEnd | FrequencyUnit::MonthStart => month_ordinal(date),
            FrequencyUnit::QuarterEnd | FrequencyUnit::QuarterStart => {
                month_ordinal(date).div_euclid(3)
            }
            _ => i64::from(date.year()),
        }
    }

    /// Label (start or end, depending on the anchor) of a unit period.
    ///
    /// `None` when the label falls outside the supported date range.
    pub fn unit_label(&self, ordinal: i64, origin: NaiveDateTime) -> Option<NaiveDateTime> {
        if let Some(unit) = self.unit_duration() {
            let offset = Duration::try_seconds(unit.num_seconds().checked_mul(ordinal)?)?;
            return origin.checked_add_signed(offset);
        }

        let date = match self.unit {
            FrequencyUnit::Week => add_days(reference(REF_SUNDAY), ordinal.checked_mul(7)?)?,
            FrequencyUnit::BusinessDay => {
                let days = ordinal.div_euclid(5).checked_mul(7)? + ordinal.rem_euclid(5);
                add_days(reference(REF_MONDAY), days)?
            }
            FrequencyUnit::MonthEnd => month_end(ordinal)?,
            FrequencyUnit::MonthStart => month_start(ordinal)?,
            FrequencyUnit::QuarterEnd => month_end(ordinal.checked_mul(3)? + 2)?,
            FrequencyUnit::QuarterStart => month_start(ordinal.checked_mul(3)?)?,
            FrequencyUnit::YearEnd => month_end(ordinal.checked_mul(12)? + 11)?,
            _ => month_start(ordinal.checked_mul(12)?)?,
        };
        Some(midnight(date))
    }

    /// First point on this frequency's grid at or after `ts`, keeping the time of day
    pub fn rollforward(&self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.is_tick() {
            return Some(ts);
        }
        let ordinal = self.unit_ordinal(ts, ts);
        let candidate = NaiveDateTime::new(self.unit_label(ordinal, ts)?.date(), ts.time());
        if candidate >= ts {
            Some(candidate)
        } else {
            Some(NaiveDateTime::new(self.unit_label(ordinal + 1, ts)?.date(), ts.time()))
        }
    }

    /// Next grid point after an on-grid `ts`
    ///
    /// `None` once the next point would leave the supported date range.
    pub fn advance(&self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.is_tick() {
            return ts.checked_add_signed(self.tick_duration()?);
        }
        let ordinal = self.unit_ordinal(ts, ts) + i64::from(self.multiple);
        Some(NaiveDateTime::new(self.unit_label(ordinal, ts)?.date(), ts.time()))
    }

    /// Conventional seasonal period for a series sampled at this frequency
    pub fn seasonal_period(&self) -> Option<usize> {
        if self.multiple != 1 {
            return None;
        }
        match self.unit {
            FrequencyUnit::Second | FrequencyUnit::Minute => Some(60),
            FrequencyUnit::Hour => Some(24),
            FrequencyUnit::Day => Some(7),
            FrequencyUnit::BusinessDay => Some(5),
            FrequencyUnit::Week => Some(52),
            FrequencyUnit::MonthEnd | FrequencyUnit::MonthStart => Some(12),
            FrequencyUnit::QuarterEnd | FrequencyUnit::QuarterStart => Some(4),
            FrequencyUnit::YearEnd | FrequencyUnit::YearStart => Some(1),
        }
    }

    fn alias(&self) -> &'static str {
        match self.unit {
            FrequencyUnit::Second => "S",
            FrequencyUnit::Minute => "T",
            FrequencyUnit::Hour => "H",
            FrequencyUnit::Day => "D",
            FrequencyUnit::BusinessDay => "B",
            FrequencyUnit::Week => "W-SUN",
            FrequencyUnit::MonthEnd => "M",
            FrequencyUnit::MonthStart => "MS",
            FrequencyUnit::QuarterEnd => "Q",
            FrequencyUnit::QuarterStart => "QS",
            FrequencyUnit::YearEnd => "A",
            FrequencyUnit::YearStart => "AS",
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Frequency::parse(s)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiple == 1 {
            write!(f, "{}", self.alias())
        } else {
            write!(f, "{}{}", self.multiple, self.alias())
        }
    }
}

/// Infer the sampling frequency of ascending timestamps.
///
/// Needs at least three strictly increasing values. Returns `None` for irregular
/// spacing.
pub fn infer_frequency(values: &[NaiveDateTime]) -> Option<Frequency> {
    if values.len() < 3 {
        return None;
    }
    let deltas: Vec<Duration> = values.windows(2).map(|w| w[1] - w[0]).collect();
    if deltas.iter().any(|d| *d <= Duration::zero()) {
        return None;
    }

    if deltas.iter().all(|d| *d == deltas[0]) {
        return infer_fixed(deltas[0], values);
    }

    infer_business_days(values).or_else(|| infer_calendar(values))
}

fn infer_fixed(delta: Duration, values: &[NaiveDateTime]) -> Option<Frequency> {
    let secs = delta.num_seconds();
    if delta.subsec_nanos() != 0 || secs <= 0 {
        return None;
    }

    let (multiple, unit) = if secs % 86_400 == 0 {
        let days = secs / 86_400;
        if days % 7 == 0 && values[0].weekday() == Weekday::Sun {
            (days / 7, FrequencyUnit::Week)
        } else {
            (days, FrequencyUnit::Day)
        }
    } else if secs % 3_600 == 0 {
        (secs / 3_600, FrequencyUnit::Hour)
    } else if secs % 60 == 0 {
        (secs / 60, FrequencyUnit::Minute)
    } else {
        (secs, FrequencyUnit::Second)
    };

    u32::try_from(multiple).ok().map(|m| Frequency::new(m, unit))
}

fn infer_business_days(values: &[NaiveDateTime]) -> Option<Frequency> {
    let weekday_only = values
        .iter()
        .all(|v| !matches!(v.weekday(), Weekday::Sat | Weekday::Sun));
    let same_time = values.iter().all(|v| v.time() == values[0].time());
    if !weekday_only || !same_time {
        return None;
    }

    let consecutive = values.windows(2).all(|w| {
        let days = (w[1] - w[0]).num_days();
        days == 1 || (days == 3 && w[0].weekday() == Weekday::Fri)
    });
    consecutive.then(|| Frequency::new(1, FrequencyUnit::BusinessDay))
}

fn infer_calendar(values: &[NaiveDateTime]) -> Option<Frequency> {
    if values.iter().any(|v| v.time() != values[0].time()) {
        return None;
    }

    let ordinals: Vec<i64> = values.iter().map(|v| month_ordinal(v.date())).collect();
    let step = ordinals[1] - ordinals[0];
    if step <= 0 || ordinals.windows(2).any(|w| w[1] - w[0] != step) {
        return None;
    }

    let month_end_days = values.iter().all(|v| is_month_end(v.date()));
    let month_start_days = values.iter().all(|v| v.day() == 1);
    if !month_end_days && !month_start_days {
        return None;
    }

    let months: Vec<u32> = values.iter().map(|v| v.month()).collect();
    let (multiple, unit) = if step % 12 == 0 && month_end_days && months.iter().all(|m| *m == 12) {
        (step / 12, FrequencyUnit::YearEnd)
    } else if step % 12 == 0 && month_start_days && months.iter().all(|m| *m == 1) {
        (step / 12, FrequencyUnit::YearStart)
    } else if step % 3 == 0 && month_end_days && months.iter().all(|m| m % 3 == 0) {
        (step / 3, FrequencyUnit::QuarterEnd)
    } else if step % 3 == 0 && month_start_days && months.iter().all(|m| m % 3 == 1) {
        (step / 3, FrequencyUnit::QuarterStart)
    } else if month_end_days {
        (step, FrequencyUnit::MonthEnd)
    } else {
        (step, FrequencyUnit::MonthStart)
    };

    u32::try_from(multiple).ok().map(|m| Frequency::new(m, unit))
}

fn reference((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn month_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

fn month_start(ordinal: i64) -> Option<NaiveDate> {
    let year = i32::try_from(ordinal.div_euclid(12)).ok()?;
    let month = ordinal.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_end(ordinal: i64) -> Option<NaiveDate> {
    month_start(ordinal.checked_add(1)?)?.pred_opt()
}

fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.day() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(
            Frequency::parse("D").unwrap(),
            Frequency::new(1, FrequencyUnit::Day)
        );
        assert_eq!(
            Frequency::parse("3H").unwrap(),
            Frequency::new(3, FrequencyUnit::Hour)
        );
        assert_eq!(
            Frequency::parse("15min").unwrap(),
            Frequency::new(15, FrequencyUnit::Minute)
        );
        assert_eq!(
            "MS".parse::<Frequency>().unwrap(),
            Frequency::new(1, FrequencyUnit::MonthStart)
        );
        assert!(Frequency::parse("fortnight").is_err());
        assert!(Frequency::parse("0D").is_err());
        assert_eq!(Frequency::parse("2W").unwrap().to_string(), "2W-SUN");
    }

    #[test]
    fn test_infer_fixed_frequencies() {
        let daily = vec![ts(2022, 1, 1, 0), ts(2022, 1, 2, 0), ts(2022, 1, 3, 0)];
        assert_eq!(infer_frequency(&daily).unwrap().to_string(), "D");

        let hourly = vec![ts(2022, 1, 1, 0), ts(2022, 1, 1, 2), ts(2022, 1, 1, 4)];
        assert_eq!(infer_frequency(&hourly).unwrap().to_string(), "2H");

        // 2022-01-02 is a Sunday
        let weekly = vec![ts(2022, 1, 2, 0), ts(2022, 1, 9, 0), ts(2022, 1, 16, 0)];
        assert_eq!(infer_frequency(&weekly).unwrap().to_string(), "W-SUN");
    }

    #[test]
    fn test_infer_calendar_frequencies() {
        let month_starts = vec![ts(2022, 1, 1, 0), ts(2022, 2, 1, 0), ts(2022, 3, 1, 0)];
        assert_eq!(infer_frequency(&month_starts).unwrap().to_string(), "MS");

        let month_ends = vec![ts(2022, 1, 31, 0), ts(2022, 2, 28, 0), ts(2022, 3, 31, 0)];
        assert_eq!(infer_frequency(&month_ends).unwrap().to_string(), "M");

        let quarter_ends = vec![ts(2022, 3, 31, 0), ts(2022, 6, 30, 0), ts(2022, 9, 30, 0)];
        assert_eq!(infer_frequency(&quarter_ends).unwrap().to_string(), "Q");

        // Thu, Fri, Mon, Tue
        let bdays = vec![
            ts(2022, 1, 6, 0),
            ts(2022, 1, 7, 0),
            ts(2022, 1, 10, 0),
            ts(2022, 1, 11, 0),
        ];
        assert_eq!(infer_frequency(&bdays).unwrap().to_string(), "B");
    }

    #[test]
    fn test_infer_rejects_irregular() {
        let irregular = vec![ts(2022, 1, 1, 0), ts(2022, 1, 2, 0), ts(2022, 1, 5, 7)];
        assert_eq!(infer_frequency(&irregular), None);

        let too_short = vec![ts(2022, 1, 1, 0), ts(2022, 1, 2, 0)];
        assert_eq!(infer_frequency(&too_short), None);

        let unsorted = vec![ts(2022, 1, 3, 0), ts(2022, 1, 2, 0), ts(2022, 1, 1, 0)];
        assert_eq!(infer_frequency(&unsorted), None);
    }

    #[test]
    fn test_rollforward_and_advance() {
        let month_end = Frequency::parse("M").unwrap();
        let start = ts(2022, 1, 5, 10);
        let first = month_end.rollforward(start).unwrap();
        assert_eq!(first, ts(2022, 1, 31, 10));
        assert_eq!(month_end.advance(first), Some(ts(2022, 2, 28, 10)));

        let month_start = Frequency::parse("MS").unwrap();
        assert_eq!(month_start.rollforward(ts(2022, 1, 1, 0)), Some(ts(2022, 1, 1, 0)));
        assert_eq!(month_start.rollforward(ts(2022, 1, 2, 0)), Some(ts(2022, 2, 1, 0)));

        let weekly = Frequency::parse("W").unwrap();
        // 2022-01-05 is a Wednesday
        assert_eq!(weekly.rollforward(ts(2022, 1, 5, 0)), Some(ts(2022, 1, 9, 0)));

        let bday = Frequency::parse("B").unwrap();
        // Saturday rolls to Monday, Friday advances to Monday
        assert_eq!(bday.rollforward(ts(2022, 1, 8, 0)), Some(ts(2022, 1, 10, 0)));
        assert_eq!(bday.advance(ts(2022, 1, 7, 0)), Some(ts(2022, 1, 10, 0)));
    }

    #[test]
    fn test_large_multiples() {
        assert!(Frequency::parse("100000000D").is_err());
        assert!(Frequency::parse("99999999999999999999D").is_err());
        assert_eq!(
            Frequency::parse("1000000D").unwrap(),
            Frequency::new(MAX_MULTIPLE, FrequencyUnit::Day)
        );

        // A step past the end of the calendar yields no point
        let days = Frequency::new(MAX_MULTIPLE, FrequencyUnit::Day);
        assert!(days.tick_duration().is_some());
        assert_eq!(days.advance(ts(2022, 1, 1, 0)).map(|t| t.year()), Some(4759));
        assert_eq!(days.advance(NaiveDateTime::MAX), None);

        let years = Frequency::new(MAX_MULTIPLE, FrequencyUnit::YearEnd);
        assert_eq!(years.advance(ts(2022, 1, 1, 0)), None);

        let oversized = Frequency::new(u32::MAX, FrequencyUnit::Day);
        assert_eq!(oversized.tick_duration(), None);
        assert_eq!(oversized.advance(ts(2022, 1, 1, 0)), None);
    }

    #[test]
    fn test_seasonal_period() {
        assert_eq!(Frequency::parse("D").unwrap().seasonal_period(), Some(7));
        assert_eq!(Frequency::parse("MS").unwrap().seasonal_period(), Some(12));
        assert_eq!(Frequency::parse("2D").unwrap().seasonal_period(), None);
    }
}
