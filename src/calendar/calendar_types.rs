//! Shared types for meeting rows, attendees and grouped meetings.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an attendee is a mandatory ("To") or FYI ("CC") invitee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeRole {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub role: AttendeeRole,
}

impl Attendee {
    pub fn required(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into(), role: AttendeeRole::Required }
    }

    pub fn optional(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into(), role: AttendeeRole::Optional }
    }

    /// Case-insensitive comparison on the email address only.
    pub fn same_address(&self, other: &Attendee) -> bool {
        self.email.eq_ignore_ascii_case(&other.email)
    }
}

/// Coarse recurrence hint taken from the `Occurrence` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occurrence {
    Once,
    /// Every weekday, Monday through Friday.
    Daily,
    /// Once a week on the weekday of the start date.
    Weekly,
    Unrecognized(String),
}

impl Occurrence {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "once" => Occurrence::Once,
            "daily" => Occurrence::Daily,
            "weekly" => Occurrence::Weekly,
            _ => Occurrence::Unrecognized(label.trim().to_string()),
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Occurrence::Daily | Occurrence::Weekly)
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurrence::Once => write!(f, "once"),
            Occurrence::Daily => write!(f, "daily"),
            Occurrence::Weekly => write!(f, "weekly"),
            Occurrence::Unrecognized(label) => write!(f, "{}", label),
        }
    }
}

/// Video-conferencing platform named in the `Platform` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Teams,
    Skype,
    Unsupported(String),
}

impl Platform {
    /// Returns `None` for an empty column.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        match normalized.as_str() {
            "" => None,
            "teams" | "microsoftteams" | "msteams" | "teamsforbusiness" => Some(Platform::Teams),
            "skype" | "skypeforbusiness" => Some(Platform::Skype),
            _ => Some(Platform::Unsupported(value.trim().to_string())),
        }
    }

    /// Graph `onlineMeetingProvider` value, if the platform can host the meeting.
    pub fn online_meeting_provider(&self) -> Option<&'static str> {
        match self {
            Platform::Teams => Some("teamsForBusiness"),
            Platform::Skype => Some("skypeForBusiness"),
            Platform::Unsupported(_) => None,
        }
    }
}

/// The scalar fields every row of one meeting occurrence is expected to share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingDetails {
    pub subject: String,
    pub body: String,
    pub occurrence: Occurrence,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    /// Last date of the series. Equal to `start_date` for one-off meetings.
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
    pub time_zone: String,
    pub platform: Option<Platform>,
    pub meeting_url: Option<String>,
}

impl MeetingDetails {
    /// Name of the first field that differs from `other`.
    pub fn first_difference(&self, other: &MeetingDetails) -> Option<&'static str> {
        if self.subject != other.subject {
            Some("Subject")
        } else if self.body != other.body {
            Some("Body")
        } else if self.occurrence != other.occurrence {
            Some("Occurrence")
        } else if self.start_date != other.start_date {
            Some("StartDate")
        } else if self.start_time != other.start_time {
            Some("StartTime")
        } else if self.end_date != other.end_date {
            Some("EndDate")
        } else if self.end_time != other.end_time {
            Some("EndTime")
        } else if self.time_zone != other.time_zone {
            Some("TimeZone")
        } else if self.platform != other.platform {
            Some("Platform")
        } else if self.meeting_url != other.meeting_url {
            Some("MeetingURL")
        } else {
            None
        }
    }
}

/// One validated CSV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRow {
    /// 1-based line in the source file.
    pub line: u64,
    pub recipient: Attendee,
    pub cc: Option<Attendee>,
    pub details: MeetingDetails,
}

/// SHA-256 fingerprint of the fields that identify one meeting occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn from_hex(hex: String) -> Self {
        GroupKey(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All rows sharing a [`GroupKey`], folded into a single invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingGroup {
    pub key: GroupKey,
    pub required: Vec<Attendee>,
    pub optional: Vec<Attendee>,
    pub details: MeetingDetails,
}

impl MeetingGroup {
    pub fn subject(&self) -> &str {
        &self.details.subject
    }

    /// Required attendees first, then optional ones.
    pub fn attendees(&self) -> impl Iterator<Item = &Attendee> {
        self.required.iter().chain(self.optional.iter())
    }
}

/// Which fields make two rows "the same meeting".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupBy {
    /// Start date, start time, end date and end time.
    #[default]
    Schedule,
    /// Start date only.
    Date,
}

/// What to do with a row that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadRowPolicy {
    #[default]
    Fail,
    Skip,
}

/// What to do when a row disagrees with its group's scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    #[default]
    FirstWins,
    Reject,
}
