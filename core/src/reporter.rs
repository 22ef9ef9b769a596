//! Queue status reporting.
//!
//! Read-only figures for staff dashboards: queue depth, overbooking, rough
//! wait estimates and volunteer coverage gaps. Nothing here takes locks or
//! writes, so reports can run alongside a release and may be slightly stale.

use crate::capacity::CapacityRegistry;
use crate::environment::ReleaseEnvironment;
use crate::error::StoreError;
use crate::metrics;
use crate::types::{Category, RequestStatus};
use chrono::NaiveDate;
use serde::Serialize;

/// Demand versus capacity for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverbookingWarning {
    /// Pending plus approved requests
    pub depth: u32,
    /// Resolved capacity
    pub limit: u32,
    /// Whether demand exceeds capacity
    pub overbooked: bool,
    /// Requests beyond capacity (`0` when not overbooked)
    pub excess: u32,
}

impl OverbookingWarning {
    /// Compare a depth against a limit.
    #[must_use]
    pub const fn new(depth: u32, limit: u32) -> Self {
        Self {
            depth,
            limit,
            overbooked: depth > limit,
            excess: depth.saturating_sub(limit),
        }
    }
}

/// A date with too few volunteers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageGap {
    /// Affected date
    pub date: NaiveDate,
    /// Volunteers required
    pub required: u32,
    /// Volunteers assigned
    pub assigned: u32,
    /// `assigned / required`
    pub ratio: f64,
}

/// Everything a dashboard shows for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    /// Visit date
    pub date: NaiveDate,
    /// Category
    pub category: Category,
    /// Whether the service runs that day
    pub is_operating_day: bool,
    /// Tickets already holding capacity
    pub issued: u32,
    /// Demand versus capacity
    pub overbooking: OverbookingWarning,
    /// Estimated wait for the last person in the queue (position `depth - 1`), in minutes
    pub last_in_line_wait_minutes: i64,
}

/// Read-only reporting over the request, capacity and staffing stores.
#[derive(Clone)]
pub struct QueueStatusReporter {
    env: ReleaseEnvironment,
    registry: CapacityRegistry,
    average_service: chrono::Duration,
    coverage_threshold: f64,
}

impl QueueStatusReporter {
    /// Default coverage ratio below which a date is flagged.
    pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.8;

    /// Create a reporter.
    #[must_use]
    pub const fn new(
        env: ReleaseEnvironment,
        registry: CapacityRegistry,
        average_service: chrono::Duration,
        coverage_threshold: f64,
    ) -> Self {
        Self {
            env,
            registry,
            average_service,
            coverage_threshold,
        }
    }

    /// Requests still waiting (pending or approved) for the slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the count fails.
    pub async fn depth(&self, date: NaiveDate, category: Category) -> Result<u32, StoreError> {
        let depth = self
            .env
            .requests
            .count_by_status(date, category, RequestStatus::QUEUED)
            .await?;
        metrics::update_queue_depth(category, depth);
        Ok(depth)
    }

    /// Compare the slot's depth against its capacity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the depth count fails. Capacity resolution
    /// itself never fails.
    pub async fn overbooking_warning(
        &self,
        date: NaiveDate,
        category: Category,
    ) -> Result<OverbookingWarning, StoreError> {
        let depth = self.depth(date, category).await?;
        let limit = self
            .registry
            .limit_for(self.env.capacity.as_ref(), date, category)
            .await;
        Ok(flag_overbooking(date, category, OverbookingWarning::new(depth, limit)))
    }

    /// Rough wait for someone at `position` in the queue.
    #[must_use]
    pub fn estimated_wait(&self, position: u32) -> chrono::Duration {
        i32::try_from(position)
            .ok()
            .and_then(|position| self.average_service.checked_mul(position))
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Dates in `from..=to` where assigned volunteers fall below the
    /// threshold share of those required.
    ///
    /// Dates requiring nobody are never flagged; an inverted range is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if staffing cannot be loaded.
    pub async fn coverage_gaps(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CoverageGap>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }

        let mut days = self.env.staffing.load_staffing(from, to).await?;
        days.sort_by_key(|day| day.date);

        let gaps: Vec<CoverageGap> = days
            .into_iter()
            .filter(|day| day.required_volunteers > 0)
            .filter_map(|day| {
                let ratio = day.coverage_ratio();
                (ratio < self.coverage_threshold).then_some(CoverageGap {
                    date: day.date,
                    required: day.required_volunteers,
                    assigned: day.assigned_volunteers,
                    ratio,
                })
            })
            .collect();

        if !gaps.is_empty() {
            tracing::info!(%from, %to, gaps = gaps.len(), "Volunteer coverage gaps found");
        }
        Ok(gaps)
    }

    /// Depth, capacity, overbooking and wait for one slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any read fails.
    pub async fn slot_status(
        &self,
        date: NaiveDate,
        category: Category,
    ) -> Result<SlotStatus, StoreError> {
        let day = self
            .registry
            .resolve_day(self.env.capacity.as_ref(), date)
            .await?;
        let limit = self.registry.resolve_limit(&day, category);
        let depth = self.depth(date, category).await?;
        let issued = self
            .env
            .requests
            .count_by_status(date, category, RequestStatus::HOLDING_CAPACITY)
            .await?;

        Ok(SlotStatus {
            date,
            category,
            is_operating_day: day.is_operating_day,
            issued,
            overbooking: flag_overbooking(
                date,
                category,
                OverbookingWarning::new(depth, limit),
            ),
            last_in_line_wait_minutes: self
                .estimated_wait(depth.saturating_sub(1))
                .num_minutes(),
        })
    }
}

fn flag_overbooking(
    date: NaiveDate,
    category: Category,
    warning: OverbookingWarning,
) -> OverbookingWarning {
    metrics::update_overbooked(category, warning.overbooked);
    if warning.overbooked {
        tracing::warn!(
            %date,
            %category,
            depth = warning.depth,
            limit = warning.limit,
            excess = warning.excess,
            "Slot overbooked"
        );
    }
    warning
}
