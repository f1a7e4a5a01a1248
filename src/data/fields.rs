//! Cell Parsers
//! Converts raw source cells into typed values, one rule per field kind.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("not an integer")]
    Integer,
    #[error("not a decimal number")]
    Decimal,
    #[error("no week number after prefix '{0}'")]
    Week(&'static str),
    #[error("no date matching {0:?}")]
    Date(&'static [&'static str]),
    #[error("empty cell")]
    Empty,
}

/// What a sentinel cell stands for after conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Not-a-number, excluded from arithmetic.
    Nan,
    /// Counted as zero.
    Zero,
}

impl Missing {
    pub fn value(self) -> f64 {
        match self {
            Missing::Nan => f64::NAN,
            Missing::Zero => 0.0,
        }
    }
}

/// Trimmed cell, `None` when blank.
fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse an integer cell. Blank cells are missing.
pub fn parse_integer(raw: Option<&str>) -> Result<Option<i64>, FieldError> {
    let Some(cell) = non_blank(raw) else {
        return Ok(None);
    };
    if let Ok(v) = cell.parse::<i64>() {
        return Ok(Some(v));
    }
    // Integer columns that passed through a float representation ("3.0").
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(FieldError::Integer),
    }
}

/// Parse a count that the publisher censors below a threshold,
/// e.g. `"<4"` becomes `stand_in`.
pub fn parse_censored(
    raw: Option<&str>,
    below: &'static str,
    stand_in: i64,
) -> Result<Option<i64>, FieldError> {
    match non_blank(raw) {
        Some(cell) if cell.strip_prefix('<') == Some(below) => Ok(Some(stand_in)),
        _ => parse_integer(raw),
    }
}

/// Parse an integer where a placeholder string means zero.
pub fn parse_placeholder_zero(
    raw: Option<&str>,
    placeholder: &'static str,
) -> Result<Option<i64>, FieldError> {
    match non_blank(raw) {
        Some(cell) if cell == placeholder => Ok(Some(0)),
        _ => parse_integer(raw),
    }
}

/// Parse a decimal-comma number (`"12,5"` -> 12.5).
///
/// Sentinels are matched on the trimmed cell before any replacement, so a
/// lone `"."` never reaches the float parser. Already-clean input (`"12.5"`,
/// `"NaN"`) parses to the same value.
pub fn parse_decimal_comma(
    raw: Option<&str>,
    sentinels: &[(&'static str, Missing)],
) -> Result<f64, FieldError> {
    let Some(cell) = non_blank(raw) else {
        return Ok(f64::NAN);
    };
    if let Some((_, missing)) = sentinels.iter().find(|(s, _)| *s == cell) {
        return Ok(missing.value());
    }
    cell.replace(',', ".")
        .parse::<f64>()
        .map_err(|_| FieldError::Decimal)
}

/// Extract the week number from cells like `"KW12"`, `"KW 12"` or `"12"`.
pub fn parse_prefixed_week(
    raw: Option<&str>,
    prefix: &'static str,
) -> Result<Option<i64>, FieldError> {
    let Some(cell) = non_blank(raw) else {
        return Ok(None);
    };
    let rest = cell.strip_prefix(prefix).unwrap_or(cell).trim();
    parse_integer(Some(rest)).map_err(|_| FieldError::Week(prefix))
}

/// Parse a date, trying each format in order. Formats carrying a time part
/// are parsed as date-times and truncated to the calendar day.
pub fn parse_date(
    raw: Option<&str>,
    formats: &'static [&'static str],
) -> Result<NaiveDate, FieldError> {
    let cell = non_blank(raw).ok_or(FieldError::Empty)?;
    formats
        .iter()
        .find_map(|fmt| {
            NaiveDateTime::parse_from_str(cell, fmt)
                .map(|dt| dt.date())
                .or_else(|_| NaiveDate::parse_from_str(cell, fmt))
                .ok()
        })
        .ok_or(FieldError::Date(formats))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAN_DOT: &[(&str, Missing)] = &[(".", Missing::Nan), ("-", Missing::Zero)];

    #[test]
    fn decimal_comma_values() {
        assert_eq!(parse_decimal_comma(Some("12,5"), NAN_DOT), Ok(12.5));
        assert_eq!(parse_decimal_comma(Some(" 0,93 "), NAN_DOT), Ok(0.93));
        assert!(parse_decimal_comma(Some("."), NAN_DOT).unwrap().is_nan());
        assert_eq!(parse_decimal_comma(Some("-"), NAN_DOT), Ok(0.0));
        assert!(parse_decimal_comma(Some(""), NAN_DOT).unwrap().is_nan());
        assert_eq!(
            parse_decimal_comma(Some("abc"), NAN_DOT),
            Err(FieldError::Decimal)
        );
    }

    #[test]
    fn decimal_comma_is_stable_on_clean_input() {
        assert_eq!(parse_decimal_comma(Some("12.5"), NAN_DOT), Ok(12.5));
        assert!(parse_decimal_comma(Some("NaN"), NAN_DOT).unwrap().is_nan());
    }

    #[test]
    fn censored_counts_use_stand_in() {
        assert_eq!(parse_censored(Some("<4"), "4", 3), Ok(Some(3)));
        assert_eq!(parse_censored(Some("17"), "4", 3), Ok(Some(17)));
        assert_eq!(parse_censored(Some(""), "4", 3), Ok(None));
        assert_eq!(parse_censored(Some("<5"), "4", 3), Err(FieldError::Integer));
    }

    #[test]
    fn placeholder_and_week_prefix() {
        assert_eq!(parse_placeholder_zero(Some("-"), "-"), Ok(Some(0)));
        assert_eq!(parse_placeholder_zero(Some("42000"), "-"), Ok(Some(42000)));
        assert_eq!(parse_prefixed_week(Some("KW12"), "KW"), Ok(Some(12)));
        assert_eq!(parse_prefixed_week(Some("KW 9"), "KW"), Ok(Some(9)));
        assert_eq!(parse_prefixed_week(Some("54"), "KW"), Ok(Some(54)));
        assert_eq!(
            parse_prefixed_week(Some("KWx"), "KW"),
            Err(FieldError::Week("KW"))
        );
    }

    #[test]
    fn integers_accept_float_rendering() {
        assert_eq!(parse_integer(Some("3.0")), Ok(Some(3)));
        assert_eq!(parse_integer(Some("3.5")), Err(FieldError::Integer));
    }

    #[test]
    fn dates_with_and_without_time() {
        const FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S", "%d.%m.%Y", "%Y-%m-%d"];
        let expected = NaiveDate::from_ymd_opt(2020, 3, 9).unwrap();
        assert_eq!(parse_date(Some("2020/03/09 00:00:00"), FORMATS), Ok(expected));
        assert_eq!(parse_date(Some("09.03.2020"), FORMATS), Ok(expected));
        assert_eq!(parse_date(Some("2020-03-09"), FORMATS), Ok(expected));
        assert_eq!(parse_date(Some(""), FORMATS), Err(FieldError::Empty));
        assert!(parse_date(Some("March 9"), FORMATS).is_err());
    }
}
