//! Search windows derived from holiday occurrences.
//!
//! Windows are calendar-naive: timestamps carry no offset and are handed to
//! the server as-is. Padding may spill across month and year boundaries;
//! spillover is allowed, never clamped.

use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::{HolidayDefinition, HolidayOccurrence};
use crate::error::SyncError;

/// Run-level padding defaults, overridable per holiday.
#[derive(Debug, Clone, Copy)]
pub struct PaddingDefaults {
    pub before_days: u32,
    pub after_days: u32,
}

/// Closed capture-time interval for one holiday in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchWindow {
    pub holiday: String,
    pub year: i32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SearchWindow {
    /// Interval spanning whole days: start of the first padded day through
    /// the final second of the last. Zero padding yields a valid single-day
    /// window.
    pub fn around(occurrence: &HolidayOccurrence, before_days: u32, after_days: u32) -> Self {
        let first_day = occurrence.date - Duration::days(i64::from(before_days));
        let last_day = occurrence.date + Duration::days(i64::from(after_days));
        SearchWindow {
            holiday: occurrence.holiday.clone(),
            year: occurrence.year,
            start: first_day.and_time(NaiveTime::MIN),
            end: last_day.and_time(end_of_day()),
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).expect("23:59:59 is a valid time")
}

/// One window per year in the range, in year order. Recomputation is cheap
/// and repeated calls yield identical results.
pub fn windows_for(
    def: &HolidayDefinition,
    years: RangeInclusive<i32>,
    defaults: PaddingDefaults,
) -> Result<Vec<SearchWindow>, SyncError> {
    let before = def.padding_before_days.unwrap_or(defaults.before_days);
    let after = def.padding_after_days.unwrap_or(defaults.after_days);

    years
        .map(|year| {
            def.resolve(year)
                .map(|occurrence| SearchWindow::around(&occurrence, before, after))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::HolidayRule;
    use chrono::{NaiveDate, Weekday};

    fn thanksgiving() -> HolidayDefinition {
        HolidayDefinition {
            name: "Thanksgiving".to_string(),
            album: None,
            rule: HolidayRule::NthWeekday { month: 11, weekday: Weekday::Thu, nth: 4 },
            padding_before_days: None,
            padding_after_days: None,
        }
    }

    fn ts(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_window_bounds_with_asymmetric_padding() {
        // Resolved date 2024-11-28, padding (3, 1).
        let windows = windows_for(
            &thanksgiving(),
            2024..=2024,
            PaddingDefaults { before_days: 3, after_days: 1 },
        )
        .unwrap();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, ts("2024-11-25T00:00:00"));
        assert_eq!(windows[0].end, ts("2024-11-29T23:59:59"));
    }

    #[test]
    fn test_zero_padding_yields_single_day_window() {
        let occurrence = HolidayOccurrence {
            holiday: "Christmas".to_string(),
            year: 2024,
            date: NaiveDate::from_ymd_opt(2024, 12, 25).unwrap(),
        };
        let window = SearchWindow::around(&occurrence, 0, 0);
        assert_eq!(window.start, ts("2024-12-25T00:00:00"));
        assert_eq!(window.end, ts("2024-12-25T23:59:59"));
        assert!(window.start <= window.end);
    }

    #[test]
    fn test_padding_spills_across_year_boundary() {
        let occurrence = HolidayOccurrence {
            holiday: "New Year's Day".to_string(),
            year: 2024,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let window = SearchWindow::around(&occurrence, 2, 0);
        assert_eq!(window.start, ts("2023-12-30T00:00:00"));
        assert_eq!(window.end, ts("2024-01-01T23:59:59"));
    }

    #[test]
    fn test_per_holiday_padding_overrides_defaults() {
        let mut def = thanksgiving();
        def.padding_before_days = Some(1);
        def.padding_after_days = Some(0);

        let windows = windows_for(
            &def,
            2024..=2024,
            PaddingDefaults { before_days: 7, after_days: 7 },
        )
        .unwrap();
        assert_eq!(windows[0].start, ts("2024-11-27T00:00:00"));
        assert_eq!(windows[0].end, ts("2024-11-28T23:59:59"));
    }

    #[test]
    fn test_windows_are_ordered_and_repeatable() {
        let defaults = PaddingDefaults { before_days: 1, after_days: 1 };
        let first = windows_for(&thanksgiving(), 2020..=2024, defaults).unwrap();
        let second = windows_for(&thanksgiving(), 2020..=2024, defaults).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        let years: Vec<i32> = first.iter().map(|w| w.year).collect();
        assert_eq!(years, vec![2020, 2021, 2022, 2023, 2024]);
    }

    #[test]
    fn test_invalid_rule_surfaces_from_window_generation() {
        let mut def = thanksgiving();
        def.rule = HolidayRule::Fixed { month: 2, day: 30 };
        let err = windows_for(
            &def,
            2024..=2024,
            PaddingDefaults { before_days: 0, after_days: 0 },
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRule { .. }));
    }
}
