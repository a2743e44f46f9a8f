//! Microsoft Graph implementation of [`CalendarService`].

use crate::services::auth::Session;
use crate::services::payload::{EventPage, EventPayload, GraphErrorBody, ListedEvent, MailPayload};
use crate::services::{CalendarService, CreateOutcome, ServiceError};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

/// Bounded retry for idempotent reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, backoff: Duration::from_millis(500) }
    }
}

pub struct GraphClient {
    http: Client,
    mailbox_url: Url,
    session: Session,
    retry: RetryPolicy,
}

impl GraphClient {
    /// Client for the mailbox `mailbox` under `graph_url`.
    pub fn new(
        graph_url: &str,
        mailbox: &str,
        session: Session,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ServiceError> {
        let mut mailbox_url = Url::parse(&format!("{}/", graph_url.trim_end_matches('/')))?;
        mailbox_url
            .path_segments_mut()
            .map_err(|_| ServiceError::Decode { endpoint: graph_url.to_string(), reason: "URL cannot be a base".to_string() })?
            .pop_if_empty()
            .extend(["users", mailbox, ""]);

        let http = Client::builder().timeout(timeout).build().map_err(|source| ServiceError::Transport {
            endpoint: graph_url.to_string(),
            source,
        })?;

        Ok(Self { http, mailbox_url, session, retry })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.mailbox_url.join(path)?)
    }

    async fn post_json<T: Serialize + Sync>(&self, url: &Url, body: &T) -> Result<Response, ServiceError> {
        let token = self.session.bearer().await?;
        self.http
            .post(url.clone())
            .bearer_auth(token.expose_secret())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { endpoint: url.path().to_string(), source })
    }

    async fn fetch_page(&self, url: &Url) -> Result<EventPage, ServiceError> {
        let token = self.session.bearer().await?;
        let endpoint = url.path().to_string();

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| ServiceError::Transport { endpoint: endpoint.clone(), source })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ServiceError::Transport { endpoint: endpoint.clone(), source })?;

        if !status.is_success() {
            return Err(ServiceError::Api { status: status.as_u16(), message: error_message(&text, status.as_u16()) });
        }

        serde_json::from_str(&text).map_err(|e| ServiceError::Decode { endpoint, reason: e.to_string() })
    }

    async fn fetch_page_with_retry(&self, url: &Url) -> Result<EventPage, ServiceError> {
        let mut attempt = 0;
        loop {
            match self.fetch_page(url).await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "Listing events failed ({}); retry {}/{} in {:?}",
                        err, attempt, self.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Best-effort message from a Graph error body.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<GraphErrorBody>(body)
        .map(|b| b.error.describe())
        .unwrap_or_else(|_| format!("HTTP {}", status))
}

#[async_trait]
impl CalendarService for GraphClient {
    async fn create_event(&self, event: &EventPayload) -> Result<CreateOutcome, ServiceError> {
        let url = self.endpoint("events")?;
        debug!("POST {} for '{}'", url.path(), event.subject);

        let response = self.post_json(&url, event).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ServiceError::Transport { endpoint: url.path().to_string(), source })?;

        let value: serde_json::Value = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
        if value.get("error").is_some() || !status.is_success() {
            return Ok(CreateOutcome::Rejected { message: error_message(&text, status.as_u16()) });
        }

        Ok(CreateOutcome::Created { id: value.get("id").and_then(|id| id.as_str()).map(str::to_string) })
    }

    async fn list_events(&self, fields: &[&str]) -> Result<Vec<ListedEvent>, ServiceError> {
        let mut url = self.endpoint("events")?;
        if !fields.is_empty() {
            url.query_pairs_mut().append_pair("$select", &fields.join(","));
        }

        let mut events = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            let page = self.fetch_page_with_retry(&page_url).await?;
            visited.insert(page_url);
            events.extend(page.value);

            if let Some(link) = page.next_link {
                let link = Url::parse(&link)?;
                // The bearer token only goes to the Graph host, and each page once.
                if link.origin() != self.mailbox_url.origin() {
                    return Err(ServiceError::Decode {
                        endpoint: link.path().to_string(),
                        reason: format!("next page link points to another host: {}", link.origin().ascii_serialization()),
                    });
                }
                if visited.contains(&link) {
                    return Err(ServiceError::Decode {
                        endpoint: link.path().to_string(),
                        reason: "next page link repeats an earlier page".to_string(),
                    });
                }
                next = Some(link);
            }
        }
        let pages = visited.len();

        debug!("Listed {} events across {} page(s)", events.len(), pages);
        Ok(events)
    }

    async fn send_mail(&self, mail: &MailPayload) -> Result<u16, ServiceError> {
        let url = self.endpoint("sendMail")?;
        debug!("POST {} for '{}'", url.path(), mail.message.subject);

        let response = self.post_json(&url, mail).await?;
        Ok(response.status().as_u16())
    }
}
