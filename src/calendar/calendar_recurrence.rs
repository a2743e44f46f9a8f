//! Maps occurrence labels to Graph recurrence rules.

use crate::calendar::calendar_types::Occurrence;
use chrono::{Datelike, NaiveDate, Weekday};
use log::warn;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

const WORKING_DAYS: [Weekday; 5] = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];

/// Graph `patternedRecurrence`: how often, and between which dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    pub range: RecurrenceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub interval: u32,
    #[serde(serialize_with = "serialize_weekdays")]
    pub days_of_week: Vec<Weekday>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RangeKind {
    EndDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRange {
    #[serde(rename = "type")]
    pub kind: RangeKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Lower-case English weekday name, independent of locale.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn serialize_weekdays<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(days.len()))?;
    for day in days {
        seq.serialize_element(weekday_name(*day))?;
    }
    seq.end()
}

/// Resolve an occurrence into a recurrence rule.
///
/// `Once` and unrecognised labels produce no recurrence. `Daily` means every
/// weekday (Monday to Friday) regardless of the start date; `Weekly` repeats
/// on the start date's weekday. The series always ends on `end_date`.
pub fn resolve(occurrence: &Occurrence, start_date: NaiveDate, end_date: NaiveDate) -> Option<Recurrence> {
    let days_of_week = match occurrence {
        Occurrence::Once => return None,
        Occurrence::Unrecognized(label) => {
            warn!("Unrecognized occurrence '{}'; scheduling a single meeting", label);
            return None;
        }
        Occurrence::Daily => WORKING_DAYS.to_vec(),
        Occurrence::Weekly => vec![start_date.weekday()],
    };

    Some(Recurrence {
        pattern: RecurrencePattern { kind: PatternKind::Weekly, interval: 1, days_of_week },
        range: RecurrenceRange { kind: RangeKind::EndDate, start_date, end_date },
    })
}
