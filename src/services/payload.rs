//! Microsoft Graph request and response shapes.

use crate::calendar::{Attendee, AttendeeRole, Recurrence};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    #[serde(rename = "HTML", alias = "html")]
    Html,
    #[serde(rename = "Text", alias = "text")]
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: BodyType,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    pub time_zone: String,
}

/// Attendee type as Graph reports it; `resource` covers rooms and equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeType {
    Required,
    Optional,
    Resource,
}

impl From<AttendeeRole> for AttendeeType {
    fn from(role: AttendeeRole) -> Self {
        match role {
            AttendeeRole::Required => AttendeeType::Required,
            AttendeeRole::Optional => AttendeeType::Optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub email_address: EmailAddress,
    #[serde(rename = "type")]
    pub kind: AttendeeType,
}

impl From<&Attendee> for EventAttendee {
    fn from(attendee: &Attendee) -> Self {
        EventAttendee {
            email_address: EmailAddress { address: attendee.email.clone(), name: attendee.name.clone() },
            kind: attendee.role.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub display_name: String,
}

/// Body of `POST /users/{mailbox}/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub subject: String,
    pub body: ItemBody,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    pub attendees: Vec<EventAttendee>,
    pub allow_new_time_proposals: bool,
    pub hide_attendees: bool,
    pub reminder_minutes_before_start: u32,
    pub is_online_meeting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_meeting_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
    pub cc_recipients: Vec<Recipient>,
}

/// Body of `POST /users/{mailbox}/sendMail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailPayload {
    pub message: MailMessage,
    pub save_to_sent_items: bool,
}

/// One event from `GET /users/{mailbox}/events`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListedEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub attendees: Vec<EventAttendee>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventPage {
    #[serde(default)]
    pub value: Vec<ListedEvent>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorBody {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GraphError {
    pub fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}
