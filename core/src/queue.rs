//! Request queue: the ordered view over approved, unticketed requests.
//!
//! Ordering is ascending submission time with ties broken by request id, so
//! the same pool always yields the same sequence. Priority never reorders the
//! queue; a [`QueueFilter`] can only narrow it.

use crate::environment::{QueueFilter, RequestStore};
use crate::error::StoreError;
use crate::types::{Category, RequestStatus, ServiceRequest};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;

/// FIFO comparison: submission time, then id.
#[must_use]
pub fn fifo_order(a: &ServiceRequest, b: &ServiceRequest) -> Ordering {
    a.submitted_at
        .cmp(&b.submitted_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Read view over the request store for one slot at a time.
#[derive(Clone)]
pub struct RequestQueue {
    store: Arc<dyn RequestStore>,
}

impl RequestQueue {
    /// Create a queue over a request store.
    #[must_use]
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    /// Up to `limit` approved requests for `(date, category)` in FIFO order.
    ///
    /// Rows the store returns are re-checked and re-sorted, so the contract
    /// holds whatever the adapter does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store query fails.
    pub async fn fetch(
        &self,
        date: NaiveDate,
        category: Category,
        limit: u32,
        filter: QueueFilter,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = self
            .store
            .load_approved(date, category, filter, limit)
            .await?;

        candidates.retain(|request| {
            request.status == RequestStatus::Approved
                && request.visit_date == Some(date)
                && request.category == category
                && filter.admits(request)
        });
        candidates.sort_by(fifo_order);
        candidates.truncate(limit as usize);

        tracing::debug!(
            %date,
            %category,
            limit,
            fetched = candidates.len(),
            "Fetched release candidates"
        );

        Ok(candidates)
    }

    /// Approved requests still waiting for a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the count fails.
    pub async fn awaiting_ticket(
        &self,
        date: NaiveDate,
        category: Category,
    ) -> Result<u32, StoreError> {
        self.store
            .count_by_status(date, category, RequestStatus::AWAITING_TICKET)
            .await
    }

    /// Tickets already holding capacity for the slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the count fails.
    pub async fn issued(&self, date: NaiveDate, category: Category) -> Result<u32, StoreError> {
        self.store
            .count_by_status(date, category, RequestStatus::HOLDING_CAPACITY)
            .await
    }
}
