//! Notification sinks for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use relief_desk_core::environment::{BoxFuture, NotificationSink};
use relief_desk_core::error::NotificationError;
use relief_desk_core::types::IssuedTicket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sink that records every delivered ticket.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotificationSink {
    delivered: Arc<Mutex<Vec<IssuedTicket>>>,
}

impl RecordingNotificationSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets delivered so far, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<IssuedTicket> {
        self.delivered.lock().unwrap().clone()
    }

    /// Wait until at least `count` notifications arrived or `timeout` passes.
    ///
    /// Notifications are spawned, so a test must yield before asserting.
    /// Returns the number delivered.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> usize {
        let poll = async {
            loop {
                let delivered = self.delivered.lock().unwrap().len();
                if delivered >= count {
                    return delivered;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(delivered) => delivered,
            Err(_) => self.delivered.lock().unwrap().len(),
        }
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify_ticket_issued(
        &self,
        ticket: IssuedTicket,
    ) -> BoxFuture<'_, Result<(), NotificationError>> {
        self.delivered.lock().unwrap().push(ticket);
        Box::pin(async { Ok(()) })
    }
}

/// Sink whose every delivery fails.
#[derive(Clone, Debug, Default)]
pub struct FailingNotificationSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingNotificationSink {
    /// Create a failing sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries attempted so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationSink for FailingNotificationSink {
    fn notify_ticket_issued(
        &self,
        ticket: IssuedTicket,
    ) -> BoxFuture<'_, Result<(), NotificationError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Err(NotificationError::Delivery(format!(
                "gateway unavailable for {}",
                ticket.ticket_number
            )))
        })
    }
}
