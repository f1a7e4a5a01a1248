//! Calendar Derivation
//! ISO-8601 week fields and the week/year alignment rules shared by all tables.

use chrono::{Datelike, NaiveDate};

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Calendar fields derived from one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    /// Monday = 0 ... Sunday = 6.
    pub dayofweek: i64,
    /// Reporting year after the week-53 remap.
    pub year: i64,
    /// ISO-8601 week number.
    pub week: i64,
}

impl CalendarFields {
    /// Derive year, ISO week and day of week.
    ///
    /// A January date whose ISO week is 52 or 53 still belongs to the last
    /// week of the previous year, so it is reported under that year
    /// (2021-01-01 is week 53 of 2020). The week number is kept.
    ///
    /// Only January is remapped. A late-December date in ISO week 1 of the
    /// next year keeps its calendar year (2024-12-30 is 2024, week 1), so
    /// week 1 of a year can hold both early-January and late-December rows.
    pub fn from_date(date: NaiveDate) -> Self {
        let week = i64::from(date.iso_week().week());
        let mut year = i64::from(date.year());
        if date.month() == 1 && week >= 52 {
            year -= 1;
        }
        Self {
            dayofweek: i64::from(date.weekday().num_days_from_monday()),
            year,
            week,
        }
    }
}

/// Signed whole days from `reference` to `report`. Negative values are kept.
pub fn days_between(report: NaiveDate, reference: NaiveDate) -> i64 {
    report.signed_duration_since(reference).num_days()
}

/// Days since 1970-01-01, the physical representation of a date column.
pub fn to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Number of ISO weeks in `year` (52 or 53).
pub fn iso_weeks_in_year(year: i32) -> i64 {
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|d| i64::from(d.iso_week().week()))
        .unwrap_or(52)
}

/// Continue week numbers past a year boundary in a table keyed by week only.
///
/// Whenever a week number drops below its predecessor (file order), every
/// following week is offset by the length of the year that just ended, so
/// 2020's week 53 is followed by 54, 55 instead of 1, 2. `first_year` is the
/// year of the first row. Continuous input is returned unchanged.
pub fn roll_over_weeks(weeks: &[Option<i64>], first_year: i32) -> Vec<Option<i64>> {
    let mut offset = 0;
    let mut year = first_year;
    let mut previous: Option<i64> = None;

    weeks
        .iter()
        .map(|week| {
            let week = (*week)?;
            if let Some(prev) = previous {
                if week + offset < prev {
                    offset += iso_weeks_in_year(year);
                    year += 1;
                }
            }
            let rolled = week + offset;
            previous = Some(rolled);
            Some(rolled)
        })
        .collect()
}
