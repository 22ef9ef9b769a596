//! Release scheduler.
//!
//! Runs one batch release for a date: for each category it resolves the
//! slot's capacity, subtracts tickets already out, pulls candidates from the
//! queue in FIFO order and issues them one at a time until that budget is met
//! or the queue runs dry. Per-item failures are collected, never fatal, and a
//! failed candidate does not use up a seat. The capacity invariant is enforced by
//! the guarded conditional write, so concurrent batches for the same slot can
//! never overshoot it.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = ReleaseScheduler::new(env, registry);
//! let result = scheduler
//!     .release(date, &[Category::Food], ReleaseOptions::default())
//!     .await?;
//! println!("released {}", result.total_released);
//! ```

use crate::capacity::CapacityRegistry;
use crate::environment::{CapacityGuard, QueueFilter, ReleaseEnvironment};
use crate::error::{IssueError, ReleaseError, StoreError};
use crate::metrics;
use crate::queue::RequestQueue;
use crate::ticket::TicketIssuer;
use crate::types::{Category, IssuedTicket, RequestId};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Options and results
// ============================================================================

/// Knobs for a single release call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseOptions {
    /// Stop issuing once this instant passes; already issued tickets stand.
    pub deadline: Option<Instant>,
    /// Narrow the queue (e.g. an emergency-only batch).
    pub filter: QueueFilter,
}

impl ReleaseOptions {
    /// Set a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set the queue filter.
    #[must_use]
    pub const fn with_filter(mut self, filter: QueueFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Outcome for one category of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRelease {
    /// Category
    pub category: Category,
    /// Resolved capacity for the slot
    pub limit: u32,
    /// Tickets already holding capacity before this batch
    pub already_issued: u32,
    /// Tickets issued by this batch
    pub released: u32,
    /// Approved requests still waiting after this batch
    pub remaining_in_queue: u32,
}

impl CategoryRelease {
    const fn new(category: Category, limit: u32) -> Self {
        Self {
            category,
            limit,
            already_issued: 0,
            released: 0,
            remaining_in_queue: 0,
        }
    }
}

/// Why a single request was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request was no longer approved at write time.
    InvalidState,
    /// The request had no visit date.
    Unscheduled,
    /// Storage failed while writing the ticket.
    Persistence,
}

impl FailureKind {
    /// Classify an issue error. `None` means the slot is full, which is a
    /// stop signal rather than a failure.
    #[must_use]
    pub const fn of(error: &IssueError) -> Option<Self> {
        match error {
            IssueError::InvalidState { .. } => Some(Self::InvalidState),
            IssueError::Unscheduled { .. } => Some(Self::Unscheduled),
            IssueError::Persistence(_) => Some(Self::Persistence),
            IssueError::CapacityExhausted { .. } => None,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidState => "invalid_state",
            Self::Unscheduled => "unscheduled",
            Self::Persistence => "persistence",
        }
    }
}

/// A request the batch could not ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseFailure {
    /// Request that failed
    pub request_id: RequestId,
    /// Its category
    pub category: Category,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable reason
    pub reason: String,
}

/// A category whose storage reads failed; other categories still ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryError {
    /// Affected category
    pub category: Category,
    /// Error message
    pub message: String,
}

/// Report of one release batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseResult {
    /// Release date
    pub date: NaiveDate,
    /// Tickets issued across all categories
    pub total_released: u32,
    /// Per-category breakdown, in processing order
    pub per_category: Vec<CategoryRelease>,
    /// Every ticket issued, in issue order
    pub released: Vec<IssuedTicket>,
    /// Requests skipped because of per-item errors
    pub failures: Vec<ReleaseFailure>,
    /// Categories whose storage reads failed
    pub category_errors: Vec<CategoryError>,
    /// Whether the deadline cut the batch short
    pub timed_out: bool,
    /// Categories never started because of the deadline
    pub unprocessed: Vec<Category>,
}

impl ReleaseResult {
    const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_released: 0,
            per_category: Vec::new(),
            released: Vec::new(),
            failures: Vec::new(),
            category_errors: Vec::new(),
            timed_out: false,
            unprocessed: Vec::new(),
        }
    }

    /// Tickets issued for `category` by this batch.
    #[must_use]
    pub fn released_for(&self, category: Category) -> u32 {
        self.category(category).map_or(0, |c| c.released)
    }

    /// Approved requests left for `category`, if the category was processed.
    #[must_use]
    pub fn remaining_for(&self, category: Category) -> Option<u32> {
        self.category(category).map(|c| c.remaining_in_queue)
    }

    fn category(&self, category: Category) -> Option<&CategoryRelease> {
        self.per_category.iter().find(|c| c.category == category)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Batch ticket release over the injected environment.
#[derive(Clone)]
pub struct ReleaseScheduler {
    env: ReleaseEnvironment,
    registry: CapacityRegistry,
    queue: RequestQueue,
    issuer: TicketIssuer,
}

impl ReleaseScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(env: ReleaseEnvironment, registry: CapacityRegistry) -> Self {
        let queue = RequestQueue::new(Arc::clone(&env.requests));
        let issuer = TicketIssuer::new(Arc::clone(&env.requests), Arc::clone(&env.clock));
        Self {
            env,
            registry,
            queue,
            issuer,
        }
    }

    /// The capacity registry used for limits.
    #[must_use]
    pub const fn registry(&self) -> &CapacityRegistry {
        &self.registry
    }

    /// Release tickets for `date`.
    ///
    /// An empty `categories` slice means every category. Duplicate entries are
    /// processed once.
    ///
    /// # Errors
    ///
    /// - [`ReleaseError::InvalidReleaseDay`]: `date` is not an operating day
    /// - [`ReleaseError::Store`]: the operating-day lookup failed
    ///
    /// Everything after the day check is reported inside [`ReleaseResult`].
    #[tracing::instrument(skip(self, categories, options))]
    pub async fn release(
        &self,
        date: NaiveDate,
        categories: &[Category],
        options: ReleaseOptions,
    ) -> Result<ReleaseResult, ReleaseError> {
        let started = std::time::Instant::now();

        let day = self
            .registry
            .resolve_day(self.env.capacity.as_ref(), date)
            .await?;
        if !day.is_operating_day {
            tracing::warn!(source = ?day.source, "Release refused on non-operating day");
            return Err(ReleaseError::InvalidReleaseDay { date });
        }

        let categories = normalize(categories);
        let mut result = ReleaseResult::empty(date);

        for (index, &category) in categories.iter().enumerate() {
            if result.timed_out || options.is_expired() {
                result.timed_out = true;
                result.unprocessed.extend_from_slice(&categories[index..]);
                break;
            }

            let limit = self.registry.resolve_limit(&day, category);
            let mut summary = CategoryRelease::new(category, limit);

            // A failed category keeps `remaining_in_queue` at 0; its one error
            // is already recorded.
            match self
                .release_category(date, &options, &mut summary, &mut result)
                .await
            {
                Ok(()) => match self.queue.awaiting_ticket(date, category).await {
                    Ok(remaining) => summary.remaining_in_queue = remaining,
                    Err(error) => record_category_error(&mut result, category, &error),
                },
                Err(error) => record_category_error(&mut result, category, &error),
            }

            metrics::record_tickets_released(category, summary.released);
            result.total_released += summary.released;
            result.per_category.push(summary);
        }

        metrics::record_release_duration(started.elapsed());
        tracing::info!(
            total_released = result.total_released,
            failures = result.failures.len(),
            timed_out = result.timed_out,
            "Release finished"
        );

        Ok(result)
    }

    async fn release_category(
        &self,
        date: NaiveDate,
        options: &ReleaseOptions,
        summary: &mut CategoryRelease,
        result: &mut ReleaseResult,
    ) -> Result<(), StoreError> {
        let category = summary.category;
        if summary.limit == 0 {
            tracing::debug!(%category, "No capacity, skipping");
            return Ok(());
        }

        summary.already_issued = self.queue.issued(date, category).await?;
        let budget = summary.limit.saturating_sub(summary.already_issued);
        if budget == 0 {
            tracing::debug!(%category, limit = summary.limit, "Slot already full");
            return Ok(());
        }

        let guard = CapacityGuard {
            visit_date: date,
            category,
            limit: summary.limit,
        };

        // Failed requests stay approved and come back in the next page, so
        // each page asks for the open budget plus everything already skipped.
        let mut skipped: HashSet<RequestId> = HashSet::new();
        while summary.released < budget {
            let page = (budget - summary.released)
                .saturating_add(u32::try_from(skipped.len()).unwrap_or(u32::MAX));
            let candidates = self
                .queue
                .fetch(date, category, page, options.filter)
                .await?;
            let exhausted = candidates.len() < page as usize;
            let mut attempted = false;

            for request in candidates {
                if skipped.contains(&request.id) {
                    continue;
                }
                if summary.released >= budget {
                    return Ok(());
                }
                if options.is_expired() {
                    tracing::warn!(%category, released = summary.released, "Release deadline reached");
                    result.timed_out = true;
                    return Ok(());
                }
                attempted = true;

                match self.issuer.issue(&request, Some(guard)).await {
                    Ok(ticket) => {
                        summary.released += 1;
                        self.dispatch_notification(ticket.clone());
                        result.released.push(ticket);
                    }
                    Err(error) => {
                        let Some(kind) = FailureKind::of(&error) else {
                            tracing::debug!(%category, %error, "Slot filled by a concurrent release");
                            return Ok(());
                        };
                        tracing::warn!(
                            request_id = %request.id,
                            %category,
                            reason = kind.as_str(),
                            %error,
                            "Request skipped"
                        );
                        metrics::record_release_failure(kind.as_str());
                        skipped.insert(request.id);
                        result.failures.push(ReleaseFailure {
                            request_id: request.id,
                            category,
                            kind,
                            reason: error.to_string(),
                        });
                    }
                }
            }

            if exhausted || !attempted {
                break;
            }
        }

        Ok(())
    }

    fn dispatch_notification(&self, ticket: IssuedTicket) {
        let notifier = Arc::clone(&self.env.notifier);
        tokio::spawn(async move {
            let request_id = ticket.request_id;
            if let Err(error) = notifier.notify_ticket_issued(ticket).await {
                tracing::warn!(%request_id, %error, "Ticket notification failed");
            }
        });
    }
}

fn normalize(categories: &[Category]) -> Vec<Category> {
    if categories.is_empty() {
        return Category::ALL.to_vec();
    }
    let mut unique = Vec::with_capacity(categories.len());
    for category in categories {
        if !unique.contains(category) {
            unique.push(*category);
        }
    }
    unique
}

fn record_category_error(result: &mut ReleaseResult, category: Category, error: &StoreError) {
    tracing::error!(%category, %error, "Category release failed");
    result.category_errors.push(CategoryError {
        category,
        message: error.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_categories_means_all() {
        assert_eq!(normalize(&[]), Category::ALL.to_vec());
        assert_eq!(
            normalize(&[Category::General, Category::General, Category::Food]),
            vec![Category::General, Category::Food]
        );
    }

    #[test]
    fn test_capacity_exhausted_is_not_a_failure() {
        let full = IssueError::CapacityExhausted {
            visit_date: NaiveDate::MIN,
            category: Category::Food,
            limit: 2,
        };
        assert_eq!(FailureKind::of(&full), None);

        let lost_race = IssueError::InvalidState {
            request_id: RequestId::new(),
            current: None,
        };
        assert_eq!(FailureKind::of(&lost_race), Some(FailureKind::InvalidState));
    }

    #[test]
    fn test_result_lookup_helpers() {
        let mut result = ReleaseResult::empty(NaiveDate::MIN);
        result.per_category.push(CategoryRelease {
            category: Category::Food,
            limit: 2,
            already_issued: 0,
            released: 2,
            remaining_in_queue: 1,
        });

        assert_eq!(result.released_for(Category::Food), 2);
        assert_eq!(result.remaining_for(Category::Food), Some(1));
        assert_eq!(result.released_for(Category::General), 0);
        assert_eq!(result.remaining_for(Category::General), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_options_deadline_expiry() {
        let options = ReleaseOptions::default().with_timeout(Duration::from_secs(5));
        assert!(!options.is_expired());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(options.is_expired());
        assert!(!ReleaseOptions::default().is_expired());
    }
}
