//! Fault injection for partial-failure tests.
//!
//! [`FailingRequestStore`] wraps an [`InMemoryRequestStore`] and fails chosen
//! operations while delegating everything else, so a test can check that one
//! bad row or one broken category does not take down a whole release.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use crate::stores::InMemoryRequestStore;
use chrono::NaiveDate;
use relief_desk_core::environment::{
    BoxFuture, CapacityStore, QueueFilter, RequestStore, TransitionOutcome, TransitionRequest,
};
use relief_desk_core::error::StoreError;
use relief_desk_core::types::{CapacityDay, Category, RequestId, RequestStatus, ServiceRequest};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Request store that fails selected operations.
#[derive(Clone, Debug)]
pub struct FailingRequestStore {
    inner: InMemoryRequestStore,
    failing_requests: Arc<RwLock<HashSet<RequestId>>>,
    failing_categories: Arc<RwLock<HashSet<Category>>>,
    ticket_collisions: Arc<AtomicU32>,
    transition_delay: Option<Duration>,
}

impl FailingRequestStore {
    /// Wrap `inner` with no faults configured.
    #[must_use]
    pub fn new(inner: InMemoryRequestStore) -> Self {
        Self {
            inner,
            failing_requests: Arc::new(RwLock::new(HashSet::new())),
            failing_categories: Arc::new(RwLock::new(HashSet::new())),
            ticket_collisions: Arc::new(AtomicU32::new(0)),
            transition_delay: None,
        }
    }

    /// Fail every transition for `id` with a database error.
    #[must_use]
    pub fn fail_transition_for(self, id: RequestId) -> Self {
        self.failing_requests.write().unwrap().insert(id);
        self
    }

    /// Fail every read (load and count) for `category`.
    #[must_use]
    pub fn fail_reads_for(self, category: Category) -> Self {
        self.failing_categories.write().unwrap().insert(category);
        self
    }

    /// Report the next `count` ticket numbers as already taken.
    #[must_use]
    pub fn collide_ticket_numbers(self, count: u32) -> Self {
        self.ticket_collisions.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep before every transition (use with paused tokio time).
    #[must_use]
    pub const fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = Some(delay);
        self
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryRequestStore {
        &self.inner
    }

    fn category_fails(&self, category: Category) -> bool {
        self.failing_categories.read().unwrap().contains(&category)
    }

    fn take_collision(&self) -> bool {
        self.ticket_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

fn injected(operation: &str) -> StoreError {
    StoreError::Database(format!("injected failure: {operation}"))
}

impl RequestStore for FailingRequestStore {
    fn load_approved(
        &self,
        date: NaiveDate,
        category: Category,
        filter: QueueFilter,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ServiceRequest>, StoreError>> {
        if self.category_fails(category) {
            return Box::pin(async { Err(injected("load_approved")) });
        }
        self.inner.load_approved(date, category, filter, limit)
    }

    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, StoreError>> {
        Box::pin(async move {
            if let Some(delay) = self.transition_delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing_requests.read().unwrap().contains(&request.request_id) {
                return Err(injected("conditional_transition"));
            }
            if request.ticket.is_some() && self.take_collision() {
                return Ok(TransitionOutcome::DuplicateTicketNumber);
            }
            self.inner.conditional_transition(request).await
        })
    }

    fn count_by_status(
        &self,
        date: NaiveDate,
        category: Category,
        statuses: &'static [RequestStatus],
    ) -> BoxFuture<'_, Result<u32, StoreError>> {
        if self.category_fails(category) {
            return Box::pin(async { Err(injected("count_by_status")) });
        }
        self.inner.count_by_status(date, category, statuses)
    }

    fn get(&self, id: RequestId) -> BoxFuture<'_, Result<Option<ServiceRequest>, StoreError>> {
        self.inner.get(id)
    }
}

/// Capacity store whose every lookup fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingCapacityStore;

impl CapacityStore for FailingCapacityStore {
    fn get_capacity_day(
        &self,
        _date: NaiveDate,
    ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
        Box::pin(async { Err(injected("get_capacity_day")) })
    }
}
