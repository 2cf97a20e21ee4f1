// Calendar resolution anchored to the plant's operational-cycle boundary
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid quarter {0}, expected 1-4")]
    InvalidQuarter(u32),
    #[error("year {0} is outside the supported calendar")]
    InvalidYear(i32),
}

/// Abstract time-period selection made by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSelector {
    CurrentQuarter,
    PreviousQuarter,
    Quarter(u32),
    Custom,
    Unknown(String),
}

impl From<&str> for PeriodSelector {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "current" | "current_quarter" => Self::CurrentQuarter,
            "previous" | "previous_quarter" => Self::PreviousQuarter,
            "custom" => Self::Custom,
            other => match other.strip_prefix('q').and_then(|n| n.parse::<u32>().ok()) {
                Some(n) => Self::Quarter(n),
                None => Self::Unknown(value.to_string()),
            },
        }
    }
}

/// Half-open `[start, end)` instant range with a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl TimeRange {
    /// Both ends inclusive; used by the monthly aggregations.
    pub fn contains_inclusive(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Every calendar month (plant local time) touched by the range, ascending.
    pub fn months(&self, offset: FixedOffset) -> Vec<YearMonth> {
        let first = YearMonth::of(self.start, offset);
        let last = YearMonth::of(self.end, offset);

        let mut months = Vec::new();
        let mut current = first;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

/// Calendar year-month key. Orders chronologically and renders as `2025-07`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        Self::new(local.year(), local.month())
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Turns period selectors into concrete instant ranges. Days start at the
/// configured boundary hour in plant local time, not at midnight.
#[derive(Debug, Clone, Copy)]
pub struct CalendarResolver {
    offset: FixedOffset,
    boundary: NaiveTime,
}

impl CalendarResolver {
    pub fn new(offset: FixedOffset, boundary_hour: u32) -> Self {
        let boundary = NaiveTime::from_hms_opt(boundary_hour, 0, 0).unwrap_or_else(|| {
            tracing::warn!("Invalid cycle boundary hour {}, using 08:00", boundary_hour);
            NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
        });
        Self { offset, boundary }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn resolve(
        &self,
        selector: &PeriodSelector,
        reference_year: i32,
        custom_start: Option<NaiveDate>,
        custom_end: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<TimeRange, PeriodError> {
        let today = now.with_timezone(&self.offset).date_naive();
        let current_quarter = quarter_of(today);

        match selector {
            PeriodSelector::CurrentQuarter => {
                let (first, last) = quarter_dates(current_quarter, reference_year)?;
                let end_date = if today >= first && today <= last { today } else { last };
                Ok(TimeRange {
                    start: self.at_boundary(first),
                    end: self.at_boundary(end_date),
                    label: format!("Current Quarter (Q{} {})", current_quarter, reference_year),
                })
            }
            PeriodSelector::PreviousQuarter => {
                let (quarter, year) = if current_quarter == 1 {
                    (4, reference_year - 1)
                } else {
                    (current_quarter - 1, reference_year)
                };
                let (first, last) = quarter_dates(quarter, year)?;
                Ok(TimeRange {
                    start: self.at_boundary(first),
                    end: self.at_boundary(last),
                    label: format!("Previous Quarter (Q{} {})", quarter, year),
                })
            }
            PeriodSelector::Quarter(quarter) => {
                let (first, last) = quarter_dates(*quarter, reference_year)?;
                Ok(TimeRange {
                    start: self.at_boundary(first),
                    end: self.at_boundary(last),
                    label: format!("Q{} {}", quarter, reference_year),
                })
            }
            PeriodSelector::Custom => {
                let default_start = NaiveDate::from_ymd_opt(reference_year, 1, 1)
                    .ok_or(PeriodError::InvalidYear(reference_year))?;
                let mut first = custom_start.unwrap_or(default_start);
                let mut last = custom_end.unwrap_or(today);
                if first > last {
                    tracing::warn!("Custom range {} > {}, swapping bounds", first, last);
                    std::mem::swap(&mut first, &mut last);
                }
                Ok(TimeRange {
                    start: self.at_boundary(first),
                    end: self.at_boundary(last),
                    label: format!("Custom ({} to {})", first, last),
                })
            }
            PeriodSelector::Unknown(raw) => {
                // End is the raw instant, not boundary-normalized.
                let (first, _) = quarter_dates(current_quarter, reference_year)?;
                let start = self.at_boundary(first);
                tracing::debug!("Unknown period selector {:?}, using current quarter start", raw);
                Ok(TimeRange {
                    start,
                    end: now.max(start),
                    label: format!("Q{} {} to date", current_quarter, reference_year),
                })
            }
        }
    }

    fn at_boundary(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(self.boundary);
        (local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// First and last calendar day of a quarter.
fn quarter_dates(quarter: u32, year: i32) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    let (first_month, last_month, last_day) = match quarter {
        1 => (1, 3, 31),
        2 => (4, 6, 30),
        3 => (7, 9, 30),
        4 => (10, 12, 31),
        other => return Err(PeriodError::InvalidQuarter(other)),
    };
    let first = NaiveDate::from_ymd_opt(year, first_month, 1).ok_or(PeriodError::InvalidYear(year))?;
    let last =
        NaiveDate::from_ymd_opt(year, last_month, last_day).ok_or(PeriodError::InvalidYear(year))?;
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resolver() -> CalendarResolver {
        CalendarResolver::new(FixedOffset::east_opt(0).unwrap(), 8)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_fixed_quarter_ignores_clock() {
        for now in [utc(2025, 2, 10, 12), utc(2031, 11, 3, 1)] {
            let range = resolver()
                .resolve(&PeriodSelector::Quarter(1), 2025, None, None, now)
                .unwrap();
            assert_eq!(range.start, utc(2025, 1, 1, 8));
            assert_eq!(range.end, utc(2025, 3, 31, 8));
        }
    }

    #[test]
    fn test_invalid_quarter_is_rejected() {
        let err = resolver()
            .resolve(&PeriodSelector::Quarter(5), 2025, None, None, utc(2025, 1, 1, 0))
            .unwrap_err();
        assert_eq!(err, PeriodError::InvalidQuarter(5));
        assert_eq!(PeriodSelector::from("q0"), PeriodSelector::Quarter(0));
    }

    #[test]
    fn test_current_quarter_in_progress_ends_today() {
        let now = utc(2025, 8, 15, 14);
        let range = resolver()
            .resolve(&PeriodSelector::CurrentQuarter, 2025, None, None, now)
            .unwrap();
        assert_eq!(range.start, utc(2025, 7, 1, 8));
        assert_eq!(range.end, utc(2025, 8, 15, 8));
    }

    #[test]
    fn test_current_quarter_of_elapsed_year_uses_fixed_end() {
        let now = utc(2025, 8, 15, 14);
        let range = resolver()
            .resolve(&PeriodSelector::CurrentQuarter, 2024, None, None, now)
            .unwrap();
        assert_eq!(range.start, utc(2024, 7, 1, 8));
        assert_eq!(range.end, utc(2024, 9, 30, 8));
    }

    #[test]
    fn test_previous_quarter_wraps_year() {
        let range = resolver()
            .resolve(&PeriodSelector::PreviousQuarter, 2025, None, None, utc(2025, 2, 1, 9))
            .unwrap();
        assert_eq!(range.start, utc(2024, 10, 1, 8));
        assert_eq!(range.end, utc(2024, 12, 31, 8));

        let range = resolver()
            .resolve(&PeriodSelector::PreviousQuarter, 2025, None, None, utc(2025, 5, 1, 9))
            .unwrap();
        assert_eq!(range.start, utc(2025, 1, 1, 8));
        assert_eq!(range.end, utc(2025, 3, 31, 8));
    }

    #[test]
    fn test_custom_defaults_and_normalization() {
        let now = utc(2025, 6, 10, 22);
        let start = NaiveDate::from_ymd_opt(2025, 3, 5);

        let range = resolver()
            .resolve(&PeriodSelector::Custom, 2025, start, None, now)
            .unwrap();
        assert_eq!(range.start, utc(2025, 3, 5, 8));
        assert_eq!(range.end, utc(2025, 6, 10, 8));

        let range = resolver()
            .resolve(&PeriodSelector::Custom, 2025, None, None, now)
            .unwrap();
        assert_eq!(range.start, utc(2025, 1, 1, 8));
    }

    #[test]
    fn test_unknown_selector_uses_raw_now() {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 13, 37, 0).unwrap();
        let range = resolver()
            .resolve(&PeriodSelector::from("fortnight"), 2025, None, None, now)
            .unwrap();
        assert_eq!(range.start, utc(2025, 4, 1, 8));
        assert_eq!(range.end, now);
    }

    #[test]
    fn test_custom_bounds_out_of_order_are_swapped() {
        let range = resolver()
            .resolve(
                &PeriodSelector::Custom,
                2025,
                NaiveDate::from_ymd_opt(2025, 6, 1),
                NaiveDate::from_ymd_opt(2025, 3, 1),
                utc(2025, 7, 1, 12),
            )
            .unwrap();
        assert_eq!(range.start, utc(2025, 3, 1, 8));
        assert_eq!(range.end, utc(2025, 6, 1, 8));
        assert!(range.start <= range.end);
        assert_eq!(range.label, "Custom (2025-03-01 to 2025-06-01)");
    }

    #[test]
    fn test_unknown_selector_in_future_year_collapses_to_start() {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 13, 37, 0).unwrap();
        let range = resolver()
            .resolve(&PeriodSelector::from("fortnight"), 2027, None, None, now)
            .unwrap();
        assert_eq!(range.start, utc(2027, 4, 1, 8));
        assert_eq!(range.end, range.start);
    }

    #[test]
    fn test_boundary_respects_plant_offset() {
        let plant = CalendarResolver::new(FixedOffset::east_opt(5 * 3600 + 1800).unwrap(), 8);
        let range = plant
            .resolve(&PeriodSelector::Quarter(3), 2025, None, None, utc(2025, 1, 1, 0))
            .unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 7, 1, 2, 30, 0).unwrap());
    }

    #[test]
    fn test_months_cover_range_without_gaps() {
        let range = resolver()
            .resolve(
                &PeriodSelector::Custom,
                2024,
                NaiveDate::from_ymd_opt(2024, 11, 20),
                NaiveDate::from_ymd_opt(2025, 2, 3),
                utc(2025, 6, 1, 0),
            )
            .unwrap();
        let months: Vec<String> = range
            .months(FixedOffset::east_opt(0).unwrap())
            .iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(months, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
    }
}
