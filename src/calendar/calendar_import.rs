//! CSV import for meeting rows.
//
// The input file uses one canonical schema; see `REQUIRED_COLUMNS` and
// `RawRow` for the accepted headers. Every record is validated into a
// `MeetingRow` before it reaches the grouping stage.

use crate::calendar::calendar_types::{Attendee, BadRowPolicy, MeetingDetails, MeetingRow, Occurrence, Platform};
use crate::calendar::calendar_validation::{parse_date, parse_time, validate_email, validate_time_zone};
use chrono::Duration;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Columns every input file must carry.
pub const REQUIRED_COLUMNS: &[&str] =
    &["To", "Name", "Subject", "Body", "Occurrence", "StartDate", "StartTime"];

/// Longest meeting the `Duration` column may describe.
const MAX_DURATION_MINUTES: u32 = 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Missing required column '{0}' in CSV header")]
    MissingColumn(String),
    #[error("Invalid row at line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to open input file: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Zone applied to rows with an empty `TimeZone` column.
    pub default_time_zone: String,
    /// Platform applied to rows with an empty `Platform` column.
    pub default_platform: Option<Platform>,
    pub on_bad_row: BadRowPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            default_time_zone: "UTC".to_string(),
            default_platform: Some(Platform::Teams),
            on_bad_row: BadRowPolicy::Fail,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "To")]
    to: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "CCEmail", default)]
    cc_email: Option<String>,
    #[serde(rename = "CCName", default)]
    cc_name: Option<String>,
    #[serde(rename = "Subject")]
    subject: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
    #[serde(rename = "Occurrence")]
    occurrence: Option<String>,
    #[serde(rename = "StartDate")]
    start_date: Option<String>,
    #[serde(rename = "StartTime")]
    start_time: Option<String>,
    #[serde(rename = "EndDate", default)]
    end_date: Option<String>,
    #[serde(rename = "EndTime", default)]
    end_time: Option<String>,
    #[serde(rename = "Duration", default)]
    duration: Option<String>,
    #[serde(rename = "TimeZone", default)]
    time_zone: Option<String>,
    #[serde(rename = "Platform", default)]
    platform: Option<String>,
    #[serde(rename = "MeetingURL", default)]
    meeting_url: Option<String>,
}

/// Read and validate every row of the CSV file at `path`.
pub fn import_csv(path: &Path, options: &ImportOptions) -> Result<Vec<MeetingRow>, ImportError> {
    info!("Importing meeting rows from {}", path.display());
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ImportError::NotFound(path.to_path_buf()),
        _ => ImportError::Io(e),
    })?;
    read_rows(file, options)
}

/// Read and validate rows from any CSV source.
pub fn read_rows<R: Read>(source: R, options: &ImportOptions) -> Result<Vec<MeetingRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let headers = reader.headers()?.clone();
    check_headers(&headers)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(ImportError::Csv(e)),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                handle_bad_row(ImportError::InvalidRow { line, reason: e.to_string() }, options.on_bad_row)?;
                continue;
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let parsed = record
            .deserialize::<RawRow>(Some(&headers))
            .map_err(|e| ImportError::InvalidRow { line, reason: e.to_string() })
            .and_then(|raw| to_meeting_row(raw, line, options));

        match parsed {
            Ok(row) => rows.push(row),
            Err(err) => handle_bad_row(err, options.on_bad_row)?,
        }
    }

    debug!("Read {} valid meeting rows", rows.len());
    Ok(rows)
}

/// Apply the bad-row policy: propagate under `Fail`, log and continue under `Skip`.
pub fn handle_bad_row(err: ImportError, policy: BadRowPolicy) -> Result<(), ImportError> {
    match policy {
        BadRowPolicy::Fail => Err(err),
        BadRowPolicy::Skip => {
            warn!("Skipping row: {}", err);
            Ok(())
        }
    }
}

fn check_headers(headers: &csv::StringRecord) -> Result<(), ImportError> {
    let has = |column: &str| headers.iter().any(|h| h == column);

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|column| !has(column)) {
        return Err(ImportError::MissingColumn(missing.to_string()));
    }
    if !has("EndTime") && !has("Duration") {
        return Err(ImportError::MissingColumn("EndTime".to_string()));
    }
    Ok(())
}

fn required(value: Option<String>, column: &str, line: u64) -> Result<String, ImportError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ImportError::InvalidRow { line, reason: format!("missing value for {}", column) }),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn to_meeting_row(raw: RawRow, line: u64, options: &ImportOptions) -> Result<MeetingRow, ImportError> {
    let invalid = |reason: String| ImportError::InvalidRow { line, reason };

    let to = required(raw.to, "To", line)?;
    if !validate_email(&to) {
        return Err(invalid(format!("invalid recipient email '{}'", to)));
    }
    let name = required(raw.name, "Name", line)?;

    let cc = match non_empty(raw.cc_email) {
        Some(cc_email) => {
            if !validate_email(&cc_email) {
                return Err(invalid(format!("invalid CC email '{}'", cc_email)));
            }
            let cc_name = non_empty(raw.cc_name).unwrap_or_else(|| cc_email.clone());
            Some(Attendee::optional(cc_name, cc_email))
        }
        None => None,
    };

    let subject = required(raw.subject, "Subject", line)?;
    let body = required(raw.body, "Body", line)?;
    let occurrence = Occurrence::parse(&required(raw.occurrence, "Occurrence", line)?);

    let start_date = parse_date(&required(raw.start_date, "StartDate", line)?).map_err(invalid)?;
    let start_time = parse_time(&required(raw.start_time, "StartTime", line)?).map_err(invalid)?;

    let end_date = match non_empty(raw.end_date) {
        Some(value) => parse_date(&value).map_err(invalid)?,
        None if occurrence.is_recurring() => {
            return Err(invalid(format!("missing value for EndDate ({} meetings need a series end)", occurrence)));
        }
        None => start_date,
    };
    if end_date < start_date {
        return Err(invalid(format!("EndDate {} is before StartDate {}", end_date, start_date)));
    }

    let end_time = match (non_empty(raw.end_time), non_empty(raw.duration)) {
        (Some(value), _) => parse_time(&value).map_err(invalid)?,
        (None, Some(minutes)) => {
            let minutes: u32 = minutes
                .parse()
                .ok()
                .filter(|m| (1..=MAX_DURATION_MINUTES).contains(m))
                .ok_or_else(|| invalid(format!("invalid Duration '{}', expected 1 to {} minutes", minutes, MAX_DURATION_MINUTES)))?;
            let (end, overflow) = start_time.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
            if overflow != 0 {
                return Err(invalid("meeting must end on the day it starts".to_string()));
            }
            end
        }
        (None, None) => return Err(invalid("missing value for EndTime or Duration".to_string())),
    };
    if end_time <= start_time {
        return Err(invalid(format!("EndTime {} is not after StartTime {}", end_time.format("%H:%M"), start_time.format("%H:%M"))));
    }

    let time_zone = non_empty(raw.time_zone).unwrap_or_else(|| options.default_time_zone.clone());
    validate_time_zone(&time_zone).map_err(invalid)?;

    Ok(MeetingRow {
        line,
        recipient: Attendee::required(name, to),
        cc,
        details: MeetingDetails {
            subject,
            body,
            occurrence,
            start_date,
            start_time,
            end_date,
            end_time,
            time_zone,
            platform: non_empty(raw.platform)
                .and_then(|p| Platform::parse(&p))
                .or_else(|| options.default_platform.clone()),
            meeting_url: non_empty(raw.meeting_url),
        },
    })
}
