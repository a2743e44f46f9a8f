//! Pause between invite dispatch and the feedback scan so new events show up
//! in the listing.

use crate::services::CalendarService;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    Fixed(Duration),
    /// List event ids every `interval` until all created ids are visible.
    Poll { interval: Duration, timeout: Duration },
}

/// Wait for created events to become visible.
///
/// Returns `false` when polling timed out or the listing kept failing; the
/// caller carries on either way.
pub async fn wait_for_consistency(
    service: &dyn CalendarService,
    created_ids: &[String],
    strategy: WaitStrategy,
) -> bool {
    match strategy {
        WaitStrategy::Fixed(delay) => {
            info!("Waiting {}s for new events to propagate", delay.as_secs());
            tokio::time::sleep(delay).await;
            true
        }
        WaitStrategy::Poll { interval, timeout } => poll(service, created_ids, interval, timeout).await,
    }
}

async fn poll(service: &dyn CalendarService, created_ids: &[String], interval: Duration, timeout: Duration) -> bool {
    if created_ids.is_empty() {
        return true;
    }

    let deadline = Instant::now() + timeout;
    loop {
        match service.list_events(&["id"]).await {
            Ok(events) => {
                let visible: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
                let pending = created_ids.iter().filter(|id| !visible.contains(id.as_str())).count();
                if pending == 0 {
                    info!("All {} new event(s) are visible", created_ids.len());
                    return true;
                }
                debug!("{} of {} new event(s) not yet visible", pending, created_ids.len());
            }
            Err(err) => warn!("Listing events while waiting failed: {}", err),
        }

        if Instant::now() + interval > deadline {
            warn!("Gave up waiting for new events after {}s", timeout.as_secs());
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CreateOutcome, EventPayload, ListedEvent, MailPayload, ServiceError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lists one more of `ids` on every call.
    struct EventuallyConsistent {
        ids: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CalendarService for EventuallyConsistent {
        async fn create_event(&self, _event: &EventPayload) -> Result<CreateOutcome, ServiceError> {
            unreachable!()
        }

        async fn list_events(&self, fields: &[&str]) -> Result<Vec<ListedEvent>, ServiceError> {
            assert_eq!(fields, ["id"]);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .ids
                .iter()
                .take(n)
                .map(|id| ListedEvent { id: id.clone(), subject: None, attendees: vec![] })
                .collect())
        }

        async fn send_mail(&self, _mail: &MailPayload) -> Result<u16, ServiceError> {
            unreachable!()
        }
    }

    fn ids() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[tokio::test]
    async fn poll_returns_once_all_ids_are_listed() {
        let service = EventuallyConsistent { ids: ids(), calls: AtomicUsize::new(0) };
        let strategy = WaitStrategy::Poll { interval: Duration::from_millis(1), timeout: Duration::from_secs(5) };

        assert!(wait_for_consistency(&service, &ids(), strategy).await);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_times_out() {
        let service = EventuallyConsistent { ids: vec![], calls: AtomicUsize::new(0) };
        let strategy = WaitStrategy::Poll { interval: Duration::from_millis(5), timeout: Duration::from_millis(20) };

        assert!(!wait_for_consistency(&service, &ids(), strategy).await);
    }

    #[tokio::test]
    async fn nothing_to_poll_for() {
        let service = EventuallyConsistent { ids: vec![], calls: AtomicUsize::new(0) };
        let strategy = WaitStrategy::Poll { interval: Duration::from_secs(1), timeout: Duration::from_secs(1) };

        assert!(wait_for_consistency(&service, &[], strategy).await);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fixed_delay_always_succeeds() {
        let service = EventuallyConsistent { ids: vec![], calls: AtomicUsize::new(0) };
        assert!(wait_for_consistency(&service, &ids(), WaitStrategy::Fixed(Duration::from_millis(1))).await);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
