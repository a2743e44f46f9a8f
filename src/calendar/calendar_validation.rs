//! Validation and parsing helpers for CSV field values.
//
// Dates, times, emails and time zones are checked here so the importer can
// report a precise reason for every rejected row.

use chrono::{Datelike, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+'-]{1,64}@([A-Za-z0-9-]{1,63}\.){1,125}[A-Za-z]{2,63}$")
        .expect("email pattern is valid")
});

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

/// Parse a calendar date, accepting `YYYY-MM-DD` or `YYYY/MM/DD`.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let value = value.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", value))?;

    if !(2000..=2100).contains(&date.year()) {
        return Err(format!("date '{}' is outside the supported range 2000-2100", value));
    }
    Ok(date)
}

/// Parse a wall-clock time, accepting 24h `HH:MM[:SS]` or 12h `HH:MM AM`.
pub fn parse_time(value: &str) -> Result<NaiveTime, String> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| format!("invalid time '{}', expected HH:MM", value))
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Check that `zone` is an IANA time-zone name such as `Asia/Kolkata`.
pub fn validate_time_zone(zone: &str) -> Result<(), String> {
    zone.trim()
        .parse::<Tz>()
        .map(|_| ())
        .map_err(|_| format!("unknown time zone '{}'", zone))
}
