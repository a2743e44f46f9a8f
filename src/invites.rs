//! Invite dispatch: one calendar event per meeting group.

use crate::calendar::{resolve, MeetingGroup, MeetingGroups};
use crate::services::{
    BodyType, CalendarService, CreateOutcome, DateTimeTimeZone, EventAttendee, EventPayload, ItemBody, Location,
};
use chrono::{NaiveDate, NaiveTime};
use log::{error, info};

pub const DEFAULT_REMINDER_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    Invited { subject: String, event_id: Option<String> },
    /// The service rejected the event.
    Rejected { subject: String, message: String },
    /// The request never got an answer.
    Failed { subject: String, error: String },
}

impl InviteOutcome {
    pub fn subject(&self) -> &str {
        match self {
            InviteOutcome::Invited { subject, .. }
            | InviteOutcome::Rejected { subject, .. }
            | InviteOutcome::Failed { subject, .. } => subject,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            InviteOutcome::Invited { event_id, .. } => event_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InviteOutcome::Invited { .. })
    }

    /// Human-readable status line.
    pub fn status_line(&self) -> String {
        match self {
            InviteOutcome::Invited { subject, .. } => format!("Success: Invited attendees for {}", subject),
            InviteOutcome::Rejected { subject, message } => {
                format!("Failed: Couldn't invite attendees for {}\n{}", subject, message)
            }
            InviteOutcome::Failed { subject, error } => {
                format!("Failed: Couldn't reach the calendar service for {}\n{}", subject, error)
            }
        }
    }
}

fn graph_date_time(date: NaiveDate, time: NaiveTime, time_zone: &str) -> DateTimeTimeZone {
    DateTimeTimeZone {
        date_time: date.and_time(time).format("%Y-%m-%dT%H:%M:%S").to_string(),
        time_zone: time_zone.to_string(),
    }
}

/// Build the Graph event for a meeting group.
///
/// Start and end both fall on the start date; the group's end date only
/// bounds the recurrence series.
pub fn build_event_payload(group: &MeetingGroup, reminder_minutes: u32) -> EventPayload {
    let details = &group.details;
    let provider = details.platform.as_ref().and_then(|p| p.online_meeting_provider());

    let location = match (provider, &details.meeting_url) {
        (None, Some(url)) => Some(Location { display_name: url.clone() }),
        _ => None,
    };

    EventPayload {
        subject: details.subject.clone(),
        body: ItemBody { content_type: BodyType::Html, content: details.body.clone() },
        start: graph_date_time(details.start_date, details.start_time, &details.time_zone),
        end: graph_date_time(details.start_date, details.end_time, &details.time_zone),
        recurrence: resolve(&details.occurrence, details.start_date, details.end_date),
        attendees: group.attendees().map(EventAttendee::from).collect(),
        allow_new_time_proposals: false,
        hide_attendees: true,
        reminder_minutes_before_start: reminder_minutes,
        is_online_meeting: provider.is_some(),
        online_meeting_provider: provider.map(str::to_string),
        location,
    }
}

/// Create one event per group, in group order.
///
/// A rejected or failed request is reported and the loop moves on to the
/// next group.
pub async fn dispatch_invites(
    service: &dyn CalendarService,
    groups: &MeetingGroups,
    reminder_minutes: u32,
) -> Vec<InviteOutcome> {
    let mut outcomes = Vec::with_capacity(groups.len());

    for group in groups {
        let payload = build_event_payload(group, reminder_minutes);
        let subject = group.subject().to_string();

        let outcome = match service.create_event(&payload).await {
            Ok(CreateOutcome::Created { id }) => {
                info!("Created event '{}' for {} attendee(s)", subject, payload.attendees.len());
                InviteOutcome::Invited { subject, event_id: id }
            }
            Ok(CreateOutcome::Rejected { message }) => {
                error!("Event '{}' was rejected: {}", subject, message);
                InviteOutcome::Rejected { subject, message }
            }
            Err(err) => {
                error!("Event '{}' could not be submitted: {}", subject, err);
                InviteOutcome::Failed { subject, error: err.to_string() }
            }
        };

        println!("{}", outcome.status_line());
        outcomes.push(outcome);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{
        group_rows, Attendee, GroupingOptions, MeetingDetails, MeetingRow, Occurrence, Platform,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn group(occurrence: Occurrence, platform: Option<Platform>, url: Option<&str>) -> MeetingGroup {
        let start_date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let details = MeetingDetails {
            subject: "Design Review".to_string(),
            body: "<b>Agenda</b>".to_string(),
            occurrence,
            start_date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 4, 29).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            time_zone: "Asia/Kolkata".to_string(),
            platform,
            meeting_url: url.map(str::to_string),
        };
        let rows = vec![
            MeetingRow {
                line: 2,
                recipient: Attendee::required("A", "a@x.com"),
                cc: Some(Attendee::optional("C", "c@x.com")),
                details: details.clone(),
            },
            MeetingRow { line: 3, recipient: Attendee::required("B", "b@x.com"), cc: None, details },
        ];
        group_rows(rows, &GroupingOptions::default()).unwrap().iter().next().unwrap().clone()
    }

    #[test]
    fn teams_meeting_payload() {
        let payload = build_event_payload(&group(Occurrence::Weekly, Some(Platform::Teams), None), 30);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "subject": "Design Review",
                "body": { "contentType": "HTML", "content": "<b>Agenda</b>" },
                "start": { "dateTime": "2024-03-04T10:00:00", "timeZone": "Asia/Kolkata" },
                "end": { "dateTime": "2024-03-04T11:00:00", "timeZone": "Asia/Kolkata" },
                "recurrence": {
                    "pattern": { "type": "weekly", "interval": 1, "daysOfWeek": ["monday"] },
                    "range": { "type": "endDate", "startDate": "2024-03-04", "endDate": "2024-04-29" }
                },
                "attendees": [
                    { "emailAddress": { "address": "a@x.com", "name": "A" }, "type": "required" },
                    { "emailAddress": { "address": "b@x.com", "name": "B" }, "type": "required" },
                    { "emailAddress": { "address": "c@x.com", "name": "C" }, "type": "optional" }
                ],
                "allowNewTimeProposals": false,
                "hideAttendees": true,
                "reminderMinutesBeforeStart": 30,
                "isOnlineMeeting": true,
                "onlineMeetingProvider": "teamsForBusiness"
            })
        );
    }

    #[test]
    fn one_off_meeting_has_no_recurrence() {
        let payload = build_event_payload(&group(Occurrence::Once, Some(Platform::Teams), None), 15);
        assert_eq!(payload.recurrence, None);
        assert_eq!(payload.reminder_minutes_before_start, 15);
        assert!(serde_json::to_value(&payload).unwrap().get("recurrence").is_none());
    }

    #[test]
    fn unsupported_platform_uses_meeting_url_as_location() {
        let payload = build_event_payload(
            &group(Occurrence::Once, Some(Platform::Unsupported("Zoom".to_string())), Some("https://zoom.us/j/1")),
            30,
        );
        assert!(!payload.is_online_meeting);
        assert_eq!(payload.online_meeting_provider, None);
        assert_eq!(payload.location, Some(Location { display_name: "https://zoom.us/j/1".to_string() }));
    }

    #[test]
    fn status_lines() {
        let ok = InviteOutcome::Invited { subject: "Sync".to_string(), event_id: Some("1".to_string()) };
        let rejected = InviteOutcome::Rejected { subject: "Sync".to_string(), message: "quota".to_string() };
        assert_eq!(ok.status_line(), "Success: Invited attendees for Sync");
        assert_eq!(rejected.status_line(), "Failed: Couldn't invite attendees for Sync\nquota");
        assert_eq!(ok.event_id(), Some("1"));
        assert_eq!(rejected.event_id(), None);
    }
}
