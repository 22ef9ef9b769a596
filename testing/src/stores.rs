//! In-memory store implementations.
//!
//! - [`InMemoryRequestStore`]: `HashMap`-backed requests with the same
//!   conditional-write and capacity-guard semantics as the `PostgreSQL` store
//! - [`InMemoryCapacityStore`]: per-date capacity rows
//! - [`InMemoryStaffingStore`]: volunteer staffing figures

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use chrono::NaiveDate;
use relief_desk_core::environment::{
    BoxFuture, CapacityStore, QueueFilter, RequestStore, StaffingStore, TransitionOutcome,
    TransitionRequest,
};
use relief_desk_core::error::StoreError;
use relief_desk_core::queue::fifo_order;
use relief_desk_core::types::{
    CapacityDay, Category, RequestId, RequestStatus, ServiceRequest, StaffingDay,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// Requests
// ============================================================================

/// In-memory request store for fast, deterministic testing.
///
/// Every conditional transition runs under one write lock, so the status
/// check, capacity count and ticket-number uniqueness check are atomic with
/// the update, matching the transactional `PostgreSQL` adapter.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRequestStore {
    requests: Arc<RwLock<HashMap<RequestId, ServiceRequest>>>,
}

impl InMemoryRequestStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateActiveRequest`] if the requester already
    /// holds an active request for the same date and category.
    pub fn insert(&self, request: ServiceRequest) -> Result<(), StoreError> {
        let mut requests = self.requests.write().unwrap();

        if let Some(visit_date) = request.visit_date {
            let clash = request.is_active()
                && requests.values().any(|existing| {
                    existing.id != request.id
                        && existing.is_active()
                        && existing.requester_id == request.requester_id
                        && existing.category == request.category
                        && existing.visit_date == Some(visit_date)
                });
            if clash {
                return Err(StoreError::DuplicateActiveRequest {
                    requester_id: request.requester_id,
                    visit_date,
                    category: request.category,
                });
            }
        }

        requests.insert(request.id, request);
        Ok(())
    }

    /// Overwrite a request's status, as the approval workflow would.
    pub fn set_status(&self, id: RequestId, status: RequestStatus) {
        if let Some(request) = self.requests.write().unwrap().get_mut(&id) {
            request.status = status;
        }
    }

    /// Look up a request without going through the async trait.
    #[must_use]
    pub fn snapshot(&self, id: RequestId) -> Option<ServiceRequest> {
        self.requests.read().unwrap().get(&id).cloned()
    }

    /// Requests holding a ticket for the slot.
    #[must_use]
    pub fn ticketed(&self, date: NaiveDate, category: Category) -> Vec<ServiceRequest> {
        let mut tickets: Vec<ServiceRequest> = self
            .requests
            .read()
            .unwrap()
            .values()
            .filter(|r| r.has_ticket() && r.visit_date == Some(date) && r.category == category)
            .cloned()
            .collect();
        tickets.sort_by(fifo_order);
        tickets
    }

    /// Number of stored requests
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.read().unwrap().is_empty()
    }

    fn count(
        requests: &HashMap<RequestId, ServiceRequest>,
        date: NaiveDate,
        category: Category,
        statuses: &[RequestStatus],
    ) -> u32 {
        let count = requests
            .values()
            .filter(|r| {
                r.visit_date == Some(date) && r.category == category && statuses.contains(&r.status)
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn apply(&self, transition: &TransitionRequest) -> TransitionOutcome {
        let mut requests = self.requests.write().unwrap();

        let current = requests.get(&transition.request_id).map(|r| r.status);
        if current != Some(transition.from) {
            return TransitionOutcome::StatusMismatch { current };
        }

        if let Some(guard) = transition.guard {
            let issued = Self::count(
                &requests,
                guard.visit_date,
                guard.category,
                RequestStatus::HOLDING_CAPACITY,
            );
            if issued >= guard.limit {
                return TransitionOutcome::CapacityReached { issued };
            }
        }

        if let Some(ticket) = &transition.ticket {
            let taken = requests
                .values()
                .any(|r| r.ticket_number.as_ref() == Some(&ticket.ticket_number));
            if taken {
                return TransitionOutcome::DuplicateTicketNumber;
            }
        }

        if let Some(request) = requests.get_mut(&transition.request_id) {
            request.status = transition.to;
            if let Some(ticket) = &transition.ticket {
                request.ticket_number = Some(ticket.ticket_number.clone());
                request.ticket_code = Some(ticket.ticket_code.clone());
                request.ticket_issued_at = Some(ticket.issued_at);
            }
        }
        TransitionOutcome::Applied
    }
}

impl RequestStore for InMemoryRequestStore {
    fn load_approved(
        &self,
        date: NaiveDate,
        category: Category,
        filter: QueueFilter,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ServiceRequest>, StoreError>> {
        let mut approved: Vec<ServiceRequest> = self
            .requests
            .read()
            .unwrap()
            .values()
            .filter(|r| {
                r.status == RequestStatus::Approved
                    && r.visit_date == Some(date)
                    && r.category == category
                    && filter.admits(r)
            })
            .cloned()
            .collect();
        approved.sort_by(fifo_order);
        approved.truncate(limit as usize);
        Box::pin(async move { Ok(approved) })
    }

    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, StoreError>> {
        Box::pin(async move { Ok(self.apply(&request)) })
    }

    fn count_by_status(
        &self,
        date: NaiveDate,
        category: Category,
        statuses: &'static [RequestStatus],
    ) -> BoxFuture<'_, Result<u32, StoreError>> {
        let count = Self::count(&self.requests.read().unwrap(), date, category, statuses);
        Box::pin(async move { Ok(count) })
    }

    fn get(&self, id: RequestId) -> BoxFuture<'_, Result<Option<ServiceRequest>, StoreError>> {
        let request = self.snapshot(id);
        Box::pin(async move { Ok(request) })
    }
}

// ============================================================================
// Capacity
// ============================================================================

/// In-memory capacity rows keyed by date.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCapacityStore {
    days: Arc<RwLock<HashMap<NaiveDate, CapacityDay>>>,
}

impl InMemoryCapacityStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the row for `day.date`.
    pub fn upsert(&self, day: CapacityDay) {
        self.days.write().unwrap().insert(day.date, day);
    }

    /// Remove the row for `date`.
    pub fn remove(&self, date: NaiveDate) {
        self.days.write().unwrap().remove(&date);
    }
}

impl CapacityStore for InMemoryCapacityStore {
    fn get_capacity_day(
        &self,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
        let day = self.days.read().unwrap().get(&date).cloned();
        Box::pin(async move { Ok(day) })
    }
}

// ============================================================================
// Staffing
// ============================================================================

/// In-memory volunteer staffing figures.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStaffingStore {
    days: Arc<RwLock<HashMap<NaiveDate, StaffingDay>>>,
}

impl InMemoryStaffingStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staffing figures for `day.date`.
    pub fn set(&self, day: StaffingDay) {
        self.days.write().unwrap().insert(day.date, day);
    }
}

impl StaffingStore for InMemoryStaffingStore {
    fn load_staffing(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<StaffingDay>, StoreError>> {
        let mut days: Vec<StaffingDay> = self
            .days
            .read()
            .unwrap()
            .values()
            .filter(|day| day.date >= from && day.date <= to)
            .copied()
            .collect();
        days.sort_by_key(|day| day.date);
        Box::pin(async move { Ok(days) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{approved_request, at, date};
    use relief_desk_core::environment::{CapacityGuard, TicketFields};
    use relief_desk_core::types::{RequesterId, TicketCode, TicketNumber};

    fn ticket_fields(visit_date: NaiveDate) -> TicketFields {
        let ticket_number = TicketNumber::generate(visit_date);
        TicketFields {
            ticket_code: TicketCode::derive(&ticket_number),
            ticket_number,
            issued_at: at(2025, 1, 7, 8, 0),
        }
    }

    #[test]
    fn test_insert_rejects_second_active_request_for_slot() {
        let store = InMemoryRequestStore::new();
        let wednesday = date(2025, 1, 8);
        let first = approved_request(Category::Food, wednesday, at(2025, 1, 2, 9, 0));
        let mut second = approved_request(Category::Food, wednesday, at(2025, 1, 2, 10, 0));
        second.requester_id = first.requester_id;

        store.insert(first).unwrap();
        assert!(matches!(
            store.insert(second.clone()),
            Err(StoreError::DuplicateActiveRequest { .. })
        ));

        second.requester_id = RequesterId::new();
        assert!(store.insert(second).is_ok());
    }

    #[tokio::test]
    async fn test_transition_checks_status_then_guard() {
        let store = InMemoryRequestStore::new();
        let wednesday = date(2025, 1, 8);
        let first = approved_request(Category::Food, wednesday, at(2025, 1, 2, 9, 0));
        let second = approved_request(Category::Food, wednesday, at(2025, 1, 2, 9, 5));
        store.insert(first.clone()).unwrap();
        store.insert(second.clone()).unwrap();

        let guard = CapacityGuard {
            visit_date: wednesday,
            category: Category::Food,
            limit: 1,
        };
        let issue = |id| TransitionRequest {
            request_id: id,
            from: RequestStatus::Approved,
            to: RequestStatus::TicketIssued,
            ticket: Some(ticket_fields(wednesday)),
            guard: Some(guard),
        };

        let applied = store.conditional_transition(issue(first.id)).await.unwrap();
        assert_eq!(applied, TransitionOutcome::Applied);

        let again = store.conditional_transition(issue(first.id)).await.unwrap();
        assert_eq!(
            again,
            TransitionOutcome::StatusMismatch {
                current: Some(RequestStatus::TicketIssued)
            }
        );

        let full = store.conditional_transition(issue(second.id)).await.unwrap();
        assert_eq!(full, TransitionOutcome::CapacityReached { issued: 1 });
        assert_eq!(store.snapshot(second.id).unwrap().status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn test_transition_rejects_duplicate_ticket_number() {
        let store = InMemoryRequestStore::new();
        let wednesday = date(2025, 1, 8);
        let first = approved_request(Category::General, wednesday, at(2025, 1, 2, 9, 0));
        let second = approved_request(Category::General, wednesday, at(2025, 1, 2, 9, 5));
        store.insert(first.clone()).unwrap();
        store.insert(second.clone()).unwrap();

        let fields = ticket_fields(wednesday);
        let transition = |id| TransitionRequest {
            request_id: id,
            from: RequestStatus::Approved,
            to: RequestStatus::TicketIssued,
            ticket: Some(fields.clone()),
            guard: None,
        };

        assert_eq!(
            store.conditional_transition(transition(first.id)).await.unwrap(),
            TransitionOutcome::Applied
        );
        assert_eq!(
            store.conditional_transition(transition(second.id)).await.unwrap(),
            TransitionOutcome::DuplicateTicketNumber
        );
    }

    #[tokio::test]
    async fn test_staffing_range_is_inclusive() {
        let store = InMemoryStaffingStore::new();
        for day in 6..=9 {
            store.set(StaffingDay {
                date: date(2025, 1, day),
                required_volunteers: 4,
                assigned_volunteers: 4,
            });
        }
        let days = store
            .load_staffing(date(2025, 1, 7), date(2025, 1, 8))
            .await
            .unwrap();
        assert_eq!(
            days.iter().map(|d| d.date).collect::<Vec<_>>(),
            vec![date(2025, 1, 7), date(2025, 1, 8)]
        );
    }
}
