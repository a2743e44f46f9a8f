//! Feedback requests for existing events whose subject carries a marker.

use crate::services::{
    AttendeeType, BodyType, CalendarService, EmailAddress, EventAttendee, ItemBody, ListedEvent, MailMessage,
    MailPayload, Recipient, ServiceError,
};
use log::{debug, error, info, warn};

pub const DEFAULT_MARKER: &str = "review";

/// `sendMail` answers 202 Accepted when the message is queued.
const ACCEPTED: u16 = 202;
const LIST_FIELDS: &[&str] = &["id", "subject", "attendees"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRequest {
    pub subject: String,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Sent { subject: String },
    Rejected { subject: String, status: u16 },
    /// The event had no one to ask.
    Skipped { subject: String },
    Failed { subject: String, error: String },
}

impl FeedbackOutcome {
    pub fn subject(&self) -> &str {
        match self {
            FeedbackOutcome::Sent { subject }
            | FeedbackOutcome::Rejected { subject, .. }
            | FeedbackOutcome::Skipped { subject }
            | FeedbackOutcome::Failed { subject, .. } => subject,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, FeedbackOutcome::Sent { .. })
    }

    /// Rejected or never answered; skipped events are not failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, FeedbackOutcome::Rejected { .. } | FeedbackOutcome::Failed { .. })
    }

    pub fn status_line(&self) -> String {
        match self {
            FeedbackOutcome::Sent { subject } => {
                format!("Success: Feedback request email sent successfully for {}", subject)
            }
            FeedbackOutcome::Rejected { subject, status } => format!(
                "Failed: Couldn't send feedback request email for {}\nStatus code: {}",
                subject, status
            ),
            FeedbackOutcome::Skipped { subject } => {
                format!("Skipped: No attendees to ask for feedback on {}", subject)
            }
            FeedbackOutcome::Failed { subject, error } => {
                format!("Failed: Couldn't send feedback request email for {}\n{}", subject, error)
            }
        }
    }
}

/// Case-insensitive substring match of `marker` in `subject`.
pub fn matches_marker(subject: &str, marker: &str) -> bool {
    subject.to_lowercase().contains(&marker.to_lowercase())
}

/// Split attendees into required (To) and optional (CC); resources are dropped.
pub fn split_attendees(attendees: &[EventAttendee]) -> (Vec<EmailAddress>, Vec<EmailAddress>) {
    let mut to = Vec::new();
    let mut cc = Vec::new();
    for attendee in attendees {
        match attendee.kind {
            AttendeeType::Required => to.push(attendee.email_address.clone()),
            AttendeeType::Optional => cc.push(attendee.email_address.clone()),
            AttendeeType::Resource => {}
        }
    }
    (to, cc)
}

/// Requests for every event whose subject contains `marker`.
pub fn select_feedback_requests(events: &[ListedEvent], marker: &str) -> Vec<FeedbackRequest> {
    events
        .iter()
        .filter_map(|event| {
            let subject = event.subject.as_deref().unwrap_or_default();
            if !matches_marker(subject, marker) {
                return None;
            }
            let (to, cc) = split_attendees(&event.attendees);
            Some(FeedbackRequest { subject: subject.to_string(), to, cc })
        })
        .collect()
}

fn recipients(addresses: &[EmailAddress]) -> Vec<Recipient> {
    addresses.iter().map(|a| Recipient { email_address: a.clone() }).collect()
}

pub fn build_mail_payload(request: &FeedbackRequest) -> MailPayload {
    MailPayload {
        message: MailMessage {
            subject: format!("Feedback Request for {}", request.subject),
            body: ItemBody {
                content_type: BodyType::Text,
                content: format!("We would appreciate your feedback on the {}. Thank you!", request.subject),
            },
            to_recipients: recipients(&request.to),
            cc_recipients: recipients(&request.cc),
        },
        save_to_sent_items: true,
    }
}

/// List events and send a feedback request for each one matching `marker`.
///
/// Only a failure to list events is returned as an error; per-event send
/// failures are reported in the outcomes.
pub async fn request_feedback(
    service: &dyn CalendarService,
    marker: &str,
) -> Result<Vec<FeedbackOutcome>, ServiceError> {
    let events = service.list_events(LIST_FIELDS).await?;
    let requests = select_feedback_requests(&events, marker);
    info!("{} of {} events match feedback marker '{}'", requests.len(), events.len(), marker);

    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let subject = request.subject.clone();

        let outcome = if request.to.is_empty() && request.cc.is_empty() {
            warn!("Event '{}' has no attendees; not sending a feedback request", subject);
            FeedbackOutcome::Skipped { subject }
        } else {
            debug!("Requesting feedback on '{}' from {} + {} recipient(s)", subject, request.to.len(), request.cc.len());
            match service.send_mail(&build_mail_payload(&request)).await {
                Ok(ACCEPTED) => FeedbackOutcome::Sent { subject },
                Ok(status) => {
                    error!("Feedback request for '{}' was not accepted (HTTP {})", subject, status);
                    FeedbackOutcome::Rejected { subject, status }
                }
                Err(err) => {
                    error!("Feedback request for '{}' failed: {}", subject, err);
                    FeedbackOutcome::Failed { subject, error: err.to_string() }
                }
            }
        };

        println!("{}", outcome.status_line());
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attendee(name: &str, kind: AttendeeType) -> EventAttendee {
        EventAttendee {
            email_address: EmailAddress { address: format!("{}@x.com", name.to_lowercase()), name: name.to_string() },
            kind,
        }
    }

    fn event(subject: &str, attendees: Vec<EventAttendee>) -> ListedEvent {
        ListedEvent { id: subject.to_string(), subject: Some(subject.to_string()), attendees }
    }

    #[test]
    fn marker_match_ignores_case() {
        assert!(matches_marker("Sprint Review", "review"));
        assert!(matches_marker("sprint review", "REVIEW"));
        assert!(!matches_marker("Planning", "review"));
    }

    #[test]
    fn selects_only_marked_events() {
        let events = vec![
            event("Sprint Review", vec![attendee("A", AttendeeType::Required)]),
            event("Planning", vec![attendee("B", AttendeeType::Required)]),
            ListedEvent { id: "3".to_string(), subject: None, attendees: vec![] },
        ];
        let requests = select_feedback_requests(&events, "review");
        let subjects: Vec<_> = requests.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Sprint Review"]);
    }

    #[test]
    fn attendees_split_by_type() {
        let (to, cc) = split_attendees(&[
            attendee("A", AttendeeType::Required),
            attendee("Room", AttendeeType::Resource),
            attendee("B", AttendeeType::Optional),
            attendee("C", AttendeeType::Required),
        ]);
        let to: Vec<_> = to.iter().map(|a| a.name.as_str()).collect();
        let cc: Vec<_> = cc.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(to, vec!["A", "C"]);
        assert_eq!(cc, vec!["B"]);
    }

    #[test]
    fn mail_payload_shape() {
        let request = FeedbackRequest {
            subject: "Sprint Review".to_string(),
            to: vec![EmailAddress { address: "a@x.com".to_string(), name: "A".to_string() }],
            cc: vec![],
        };
        assert_eq!(
            serde_json::to_value(build_mail_payload(&request)).unwrap(),
            json!({
                "message": {
                    "subject": "Feedback Request for Sprint Review",
                    "body": {
                        "contentType": "Text",
                        "content": "We would appreciate your feedback on the Sprint Review. Thank you!"
                    },
                    "toRecipients": [{ "emailAddress": { "address": "a@x.com", "name": "A" } }],
                    "ccRecipients": []
                },
                "saveToSentItems": true
            })
        );
    }
}
