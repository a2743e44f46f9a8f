//! Remote collaborators: the calendar/mail service and its credentials.

pub mod auth;
pub mod graph;
pub mod payload;

pub use auth::{AuthError, ClientCredentialsProvider, Credentials, Session, TokenProvider};
pub use graph::{GraphClient, RetryPolicy};
pub use payload::*;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Calendar service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("Invalid service URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ServiceError {
    /// Network failures, throttling and server errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Transport { .. } => true,
            ServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result of an event-creation request that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { id: Option<String> },
    /// The service answered with an error body.
    Rejected { message: String },
}

/// Calendar and mail operations on one mailbox.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Create one event. Never retried: a repeat would duplicate the event.
    async fn create_event(&self, event: &EventPayload) -> Result<CreateOutcome, ServiceError>;

    /// List events with the given `$select` fields, following every page.
    async fn list_events(&self, fields: &[&str]) -> Result<Vec<ListedEvent>, ServiceError>;

    /// Send one email, returning the HTTP status code.
    async fn send_mail(&self, mail: &MailPayload) -> Result<u16, ServiceError>;
}
