//! Holiday date computation.
//!
//! Every rule resolves deterministically: the same (rule, year) pair always
//! yields the same date, with no dependency on the current system time.

pub mod window;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Year used to probe rules at configuration time.
const PROBE_YEAR: i32 = 2024;

/// How a holiday's date is derived for a given year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HolidayRule {
    /// Same month/day every year (e.g. Independence Day).
    Fixed { month: u32, day: u32 },
    /// Nth occurrence of a weekday within a month, 1-based
    /// (e.g. 4th Thursday of November).
    NthWeekday { month: u32, weekday: Weekday, nth: u32 },
    /// Final occurrence of a weekday within a month
    /// (e.g. last Monday of May).
    LastWeekday { month: u32, weekday: Weekday },
    /// Signed day offset from Easter Sunday (0 for Easter itself, 49 for
    /// Pentecost, -2 for Good Friday). May land in an adjacent month or
    /// year; never clamped.
    EasterOffset { days: i64 },
}

impl HolidayRule {
    /// Resolves the rule for one year. `Err` carries a human-readable
    /// reason why the rule cannot produce a date.
    pub fn resolve(&self, year: i32) -> Result<NaiveDate, String> {
        match *self {
            HolidayRule::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| format!("{year}-{month:02}-{day:02} is not a calendar date")),
            HolidayRule::NthWeekday { month, weekday, nth } => {
                if nth == 0 {
                    return Err("weekday ordinal must be at least 1".to_string());
                }
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth as u8)
                    .ok_or_else(|| format!("no {nth}th {weekday} in {year}-{month:02}"))
            }
            HolidayRule::LastWeekday { month, weekday } => last_weekday(year, month, weekday),
            HolidayRule::EasterOffset { days } => Ok(easter(year)? + Duration::days(days)),
        }
    }
}

/// A holiday as configured: a stable name, the date rule, and optional
/// per-holiday overrides for the target album name and search padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayDefinition {
    pub name: String,

    /// Target album name; defaults to the holiday name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_before_days: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_after_days: Option<u32>,

    // Kept last: the rule serializes as a TOML sub-table.
    pub rule: HolidayRule,
}

/// A holiday resolved to a concrete date for one year. Derived, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct HolidayOccurrence {
    pub holiday: String,
    pub year: i32,
    pub date: NaiveDate,
}

impl HolidayDefinition {
    pub fn resolve(&self, year: i32) -> Result<HolidayOccurrence, SyncError> {
        let date = self
            .rule
            .resolve(year)
            .map_err(|reason| SyncError::InvalidRule {
                holiday: self.name.clone(),
                reason,
            })?;
        Ok(HolidayOccurrence {
            holiday: self.name.clone(),
            year,
            date,
        })
    }

    /// Probes the rule against a reference year so misconfigured rules fail
    /// at load time rather than mid-run.
    pub fn validate(&self) -> Result<(), SyncError> {
        self.resolve(PROBE_YEAR).map(|_| ())
    }

    pub fn album_name(&self) -> &str {
        self.album.as_deref().unwrap_or(&self.name)
    }
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Result<NaiveDate, String> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| format!("{month} is not a valid month"))?;

    let mut date = first_of_next - Duration::days(1);
    while date.weekday() != weekday {
        date -= Duration::days(1);
    }
    Ok(date)
}

/// Gregorian Easter Sunday via the anonymous computus. Only defined for
/// Gregorian-calendar years.
fn easter(year: i32) -> Result<NaiveDate, String> {
    if year < 1583 {
        return Err(format!("easter is undefined before 1583 (got {year})"));
    }

    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .ok_or_else(|| format!("computus produced no valid date for {year}"))
}

/// Default holiday set seeded into a fresh config file.
pub fn default_holidays() -> Vec<HolidayDefinition> {
    fn plain(name: &str, rule: HolidayRule) -> HolidayDefinition {
        HolidayDefinition {
            name: name.to_string(),
            album: None,
            rule,
            padding_before_days: None,
            padding_after_days: None,
        }
    }

    vec![
        plain("New Year's Day", HolidayRule::Fixed { month: 1, day: 1 }),
        plain(
            "Martin Luther King Jr. Day",
            HolidayRule::NthWeekday { month: 1, weekday: Weekday::Mon, nth: 3 },
        ),
        plain(
            "Presidents' Day",
            HolidayRule::NthWeekday { month: 2, weekday: Weekday::Mon, nth: 3 },
        ),
        plain("Easter", HolidayRule::EasterOffset { days: 0 }),
        plain(
            "Memorial Day",
            HolidayRule::LastWeekday { month: 5, weekday: Weekday::Mon },
        ),
        plain("Juneteenth", HolidayRule::Fixed { month: 6, day: 19 }),
        plain("Independence Day", HolidayRule::Fixed { month: 7, day: 4 }),
        plain(
            "Labor Day",
            HolidayRule::NthWeekday { month: 9, weekday: Weekday::Mon, nth: 1 },
        ),
        plain(
            "Columbus Day",
            HolidayRule::NthWeekday { month: 10, weekday: Weekday::Mon, nth: 2 },
        ),
        plain("Halloween", HolidayRule::Fixed { month: 10, day: 31 }),
        plain("Veterans Day", HolidayRule::Fixed { month: 11, day: 11 }),
        plain(
            "Thanksgiving",
            HolidayRule::NthWeekday { month: 11, weekday: Weekday::Thu, nth: 4 },
        ),
        plain("Christmas", HolidayRule::Fixed { month: 12, day: 25 }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_fixed_rule_is_deterministic() {
        let rule = HolidayRule::Fixed { month: 7, day: 4 };
        for year in 1990..=2030 {
            let first = rule.resolve(year).unwrap();
            let second = rule.resolve(year).unwrap();
            assert_eq!(first, second);
            assert_eq!((first.month(), first.day()), (7, 4));
            assert_eq!(first.year(), year);
        }
    }

    #[test]
    fn test_fixed_rule_rejects_impossible_dates() {
        let leap_day = HolidayRule::Fixed { month: 2, day: 29 };
        assert!(leap_day.resolve(2024).is_ok());
        assert!(leap_day.resolve(2023).is_err());
        assert!(HolidayRule::Fixed { month: 13, day: 1 }.resolve(2024).is_err());
    }

    #[test]
    fn test_nth_weekday_thanksgiving() {
        let rule = HolidayRule::NthWeekday { month: 11, weekday: Weekday::Thu, nth: 4 };
        assert_eq!(rule.resolve(2023).unwrap(), date(2023, 11, 23));
        assert_eq!(rule.resolve(2024).unwrap(), date(2024, 11, 28));

        for year in 2000..=2030 {
            let resolved = rule.resolve(year).unwrap();
            assert_eq!(resolved.weekday(), Weekday::Thu);
            // 4th occurrence falls on day 22..=28
            assert!((22..=28).contains(&resolved.day()));
        }
    }

    #[test]
    fn test_nth_weekday_mlk_day() {
        let rule = HolidayRule::NthWeekday { month: 1, weekday: Weekday::Mon, nth: 3 };
        assert_eq!(rule.resolve(2024).unwrap(), date(2024, 1, 15));
        assert_eq!(rule.resolve(2025).unwrap(), date(2025, 1, 20));
    }

    #[test]
    fn test_impossible_ordinal_is_invalid() {
        let rule = HolidayRule::NthWeekday { month: 11, weekday: Weekday::Mon, nth: 6 };
        assert!(rule.resolve(2024).is_err());
        let zeroth = HolidayRule::NthWeekday { month: 11, weekday: Weekday::Mon, nth: 0 };
        assert!(zeroth.resolve(2024).is_err());
    }

    #[test]
    fn test_last_weekday_memorial_day() {
        let rule = HolidayRule::LastWeekday { month: 5, weekday: Weekday::Mon };
        assert_eq!(rule.resolve(2024).unwrap(), date(2024, 5, 27));
        assert_eq!(rule.resolve(2023).unwrap(), date(2023, 5, 29));
    }

    #[test]
    fn test_last_weekday_in_december() {
        let rule = HolidayRule::LastWeekday { month: 12, weekday: Weekday::Sun };
        assert_eq!(rule.resolve(2024).unwrap(), date(2024, 12, 29));
    }

    #[test]
    fn test_easter_known_dates() {
        let rule = HolidayRule::EasterOffset { days: 0 };
        assert_eq!(rule.resolve(2023).unwrap(), date(2023, 4, 9));
        assert_eq!(rule.resolve(2024).unwrap(), date(2024, 3, 31));
        assert_eq!(rule.resolve(2025).unwrap(), date(2025, 4, 20));
    }

    #[test]
    fn test_easter_offset_crosses_month_boundary() {
        // Pentecost 2024: March 31 + 49 days = May 19, not clamped to March.
        let rule = HolidayRule::EasterOffset { days: 49 };
        assert_eq!(rule.resolve(2024).unwrap(), date(2024, 5, 19));

        let good_friday = HolidayRule::EasterOffset { days: -2 };
        assert_eq!(good_friday.resolve(2024).unwrap(), date(2024, 3, 29));
    }

    #[test]
    fn test_easter_rejects_pre_gregorian_years() {
        assert!(HolidayRule::EasterOffset { days: 0 }.resolve(1500).is_err());
    }

    #[test]
    fn test_definition_validate_probes_rule() {
        let bad = HolidayDefinition {
            name: "Sixth Monday".to_string(),
            album: None,
            rule: HolidayRule::NthWeekday { month: 3, weekday: Weekday::Mon, nth: 6 },
            padding_before_days: None,
            padding_after_days: None,
        };
        let err = bad.validate().unwrap_err();
        assert!(matches!(err, SyncError::InvalidRule { ref holiday, .. } if holiday == "Sixth Monday"));
    }

    #[test]
    fn test_album_name_falls_back_to_holiday_name() {
        let mut def = default_holidays().remove(0);
        assert_eq!(def.album_name(), "New Year's Day");
        def.album = Some("NYE Parties".to_string());
        assert_eq!(def.album_name(), "NYE Parties");
    }

    #[test]
    fn test_default_holidays_all_validate() {
        for def in default_holidays() {
            def.validate().unwrap();
        }
    }
}
