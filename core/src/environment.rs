//! Injected dependencies for the release engine.
//!
//! Every collaborator the engine talks to sits behind a trait so production
//! code can plug in `PostgreSQL` adapters while tests use the in-memory
//! implementations from `relief-desk-testing`.
//!
//! # Dyn Compatibility
//!
//! The store traits return `Pin<Box<dyn Future>>` instead of using `async fn`
//! so they can be shared as `Arc<dyn RequestStore>` inside
//! [`ReleaseEnvironment`].

use crate::error::{NotificationError, StoreError};
use crate::types::{
    CapacityDay, Category, IssuedTicket, Priority, RequestId, RequestStatus, ServiceRequest,
    StaffingDay, TicketCode, TicketNumber,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future returned by the store traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Clock
// ============================================================================

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Request store
// ============================================================================

/// Optional narrowing of the approved queue.
///
/// The default filter admits everything. Setting `min_priority` carves out an
/// emergency-only batch; the carved batch keeps submission order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueFilter {
    /// Only requests at or above this priority
    pub min_priority: Option<Priority>,
}

impl QueueFilter {
    /// Filter admitting every request.
    #[must_use]
    pub const fn all() -> Self {
        Self { min_priority: None }
    }

    /// Filter admitting requests at or above `priority`.
    #[must_use]
    pub const fn at_least(priority: Priority) -> Self {
        Self {
            min_priority: Some(priority),
        }
    }

    /// Whether `request` passes the filter.
    #[must_use]
    pub fn admits(&self, request: &ServiceRequest) -> bool {
        self.min_priority
            .is_none_or(|floor| request.priority >= floor)
    }
}

/// Ticket fields written together with the `TicketIssued` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketFields {
    /// Newly generated ticket number
    pub ticket_number: TicketNumber,
    /// Code derived from the number
    pub ticket_code: TicketCode,
    /// Issue timestamp
    pub issued_at: DateTime<Utc>,
}

/// Slot capacity the conditional write must respect.
///
/// The store counts requests in [`RequestStatus::HOLDING_CAPACITY`] for the
/// slot and refuses the transition once `limit` is reached, inside the same
/// atomic unit as the status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityGuard {
    /// Visit date of the slot
    pub visit_date: NaiveDate,
    /// Category of the slot
    pub category: Category,
    /// Maximum tickets for the slot
    pub limit: u32,
}

/// A compare-and-set on a request's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Request to update
    pub request_id: RequestId,
    /// Status the row must currently have
    pub from: RequestStatus,
    /// Status to write
    pub to: RequestStatus,
    /// Ticket fields written in the same unit
    pub ticket: Option<TicketFields>,
    /// Optional slot capacity check
    pub guard: Option<CapacityGuard>,
}

/// Result of a conditional transition. Only `Applied` mutated anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The row matched and was updated.
    Applied,
    /// The row was not in the expected status (`None` if it does not exist).
    StatusMismatch {
        /// Status found instead
        current: Option<RequestStatus>,
    },
    /// The slot is full.
    CapacityReached {
        /// Tickets already holding capacity
        issued: u32,
    },
    /// The generated ticket number already exists.
    DuplicateTicketNumber,
}

/// Storage for service requests.
pub trait RequestStore: Send + Sync {
    /// Load approved requests queued for `(date, category)`, earliest
    /// submission first, at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn load_approved(
        &self,
        date: NaiveDate,
        category: Category,
        filter: QueueFilter,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ServiceRequest>, StoreError>>;

    /// Atomically apply `request` if the row is still in `request.from` (and
    /// the capacity guard, if any, still has room).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails; nothing is changed in that case.
    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, StoreError>>;

    /// Count requests for `(date, category)` whose status is in `statuses`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn count_by_status(
        &self,
        date: NaiveDate,
        category: Category,
        statuses: &'static [RequestStatus],
    ) -> BoxFuture<'_, Result<u32, StoreError>>;

    /// Load a single request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get(&self, id: RequestId) -> BoxFuture<'_, Result<Option<ServiceRequest>, StoreError>>;
}

// ============================================================================
// Capacity and staffing stores
// ============================================================================

/// Storage for per-date capacity overrides.
pub trait CapacityStore: Send + Sync {
    /// Load the capacity row for `date`, if one was configured.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get_capacity_day(
        &self,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>>;
}

/// Read access to volunteer staffing (owned by the rota system).
pub trait StaffingStore: Send + Sync {
    /// Staffing figures for every scheduled date in `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn load_staffing(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<StaffingDay>, StoreError>>;
}

// ============================================================================
// Notification sink
// ============================================================================

/// Downstream notification of issued tickets (email/SMS/push live elsewhere).
pub trait NotificationSink: Send + Sync {
    /// Tell the requester their ticket is ready. Best effort.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails; callers log and move on.
    fn notify_ticket_issued(
        &self,
        ticket: IssuedTicket,
    ) -> BoxFuture<'_, Result<(), NotificationError>>;
}

/// Sink that only records the notification in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify_ticket_issued(
        &self,
        ticket: IssuedTicket,
    ) -> BoxFuture<'_, Result<(), NotificationError>> {
        Box::pin(async move {
            tracing::info!(
                request_id = %ticket.request_id,
                requester_id = %ticket.requester_id,
                ticket_number = %ticket.ticket_number,
                visit_date = %ticket.visit_date,
                "Ticket issued notification"
            );
            Ok(())
        })
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the release engine
#[derive(Clone)]
pub struct ReleaseEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Service request storage
    pub requests: Arc<dyn RequestStore>,
    /// Capacity override storage
    pub capacity: Arc<dyn CapacityStore>,
    /// Volunteer staffing source
    pub staffing: Arc<dyn StaffingStore>,
    /// Ticket notification sink
    pub notifier: Arc<dyn NotificationSink>,
}

impl ReleaseEnvironment {
    /// Creates a new `ReleaseEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        requests: Arc<dyn RequestStore>,
        capacity: Arc<dyn CapacityStore>,
        staffing: Arc<dyn StaffingStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            clock,
            requests,
            capacity,
            staffing,
            notifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequesterId;

    #[test]
    fn test_queue_filter_priority_floor() {
        let mut request = ServiceRequest::new(
            RequesterId::new(),
            Category::Food,
            Priority::High,
            Utc::now(),
        );

        assert!(QueueFilter::all().admits(&request));
        assert!(QueueFilter::at_least(Priority::High).admits(&request));
        assert!(!QueueFilter::at_least(Priority::Urgent).admits(&request));

        request.priority = Priority::Urgent;
        assert!(QueueFilter::at_least(Priority::Urgent).admits(&request));
    }
}
