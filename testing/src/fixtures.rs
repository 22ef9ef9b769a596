//! Fixtures and builders for release scenarios.

#![allow(clippy::expect_used)] // Test infrastructure uses expect for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on invalid literal dates

use crate::mocks::{FixedClock, test_clock};
use crate::notifications::RecordingNotificationSink;
use crate::stores::{InMemoryCapacityStore, InMemoryRequestStore, InMemoryStaffingStore};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use relief_desk_core::calendar::OperatingCalendar;
use relief_desk_core::capacity::CapacityRegistry;
use relief_desk_core::environment::{
    CapacityStore, NotificationSink, ReleaseEnvironment, RequestStore,
};
use relief_desk_core::reporter::QueueStatusReporter;
use relief_desk_core::scheduler::ReleaseScheduler;
use relief_desk_core::types::{
    Category, Priority, RequestId, RequestStatus, RequesterId, ServiceRequest,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Default Food capacity used by [`TestHarness::registry`].
pub const DEFAULT_FOOD_LIMIT: u32 = 40;
/// Default General capacity used by [`TestHarness::registry`].
pub const DEFAULT_GENERAL_LIMIT: u32 = 25;

/// A calendar date from literal parts.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid literal date")
}

/// A UTC timestamp from literal parts.
#[must_use]
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid literal timestamp")
}

/// An approved request queued for `visit_date`.
#[must_use]
pub fn approved_request(
    category: Category,
    visit_date: NaiveDate,
    submitted_at: DateTime<Utc>,
) -> ServiceRequest {
    let mut request =
        ServiceRequest::new(RequesterId::new(), category, Priority::Medium, submitted_at);
    request.status = RequestStatus::Approved;
    request.visit_date = Some(visit_date);
    request
}

/// In-memory stores, a fixed clock and a recording sink, wired together.
#[derive(Clone, Debug)]
pub struct TestHarness {
    /// Request storage
    pub requests: InMemoryRequestStore,
    /// Capacity rows
    pub capacity: InMemoryCapacityStore,
    /// Staffing figures
    pub staffing: InMemoryStaffingStore,
    /// Delivered notifications
    pub notifier: RecordingNotificationSink,
    /// Fixed time source
    pub clock: FixedClock,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Empty stores, clock at 2025-01-01. Installs the test subscriber on
    /// first use so `RUST_LOG` works in every harness-based test.
    #[must_use]
    pub fn new() -> Self {
        crate::init_test_tracing();
        Self {
            requests: InMemoryRequestStore::new(),
            capacity: InMemoryCapacityStore::new(),
            staffing: InMemoryStaffingStore::new(),
            notifier: RecordingNotificationSink::new(),
            clock: test_clock(),
        }
    }

    /// Environment over the harness stores.
    #[must_use]
    pub fn environment(&self) -> ReleaseEnvironment {
        self.environment_with(Arc::new(self.requests.clone()))
    }

    /// Environment with a replacement request store (e.g. a fault injector).
    #[must_use]
    pub fn environment_with(&self, requests: Arc<dyn RequestStore>) -> ReleaseEnvironment {
        self.custom_environment(
            requests,
            Arc::new(self.capacity.clone()),
            Arc::new(self.notifier.clone()),
        )
    }

    /// Environment with replacement request, capacity and notification collaborators.
    #[must_use]
    pub fn custom_environment(
        &self,
        requests: Arc<dyn RequestStore>,
        capacity: Arc<dyn CapacityStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> ReleaseEnvironment {
        ReleaseEnvironment::new(
            Arc::new(self.clock.clone()),
            requests,
            capacity,
            Arc::new(self.staffing.clone()),
            notifier,
        )
    }

    /// Registry with the default Tuesday to Thursday calendar.
    #[must_use]
    pub fn registry() -> CapacityRegistry {
        CapacityRegistry::new(
            OperatingCalendar::default(),
            HashMap::from([
                (Category::Food, DEFAULT_FOOD_LIMIT),
                (Category::General, DEFAULT_GENERAL_LIMIT),
            ]),
        )
    }

    /// Scheduler over the harness environment.
    #[must_use]
    pub fn scheduler(&self) -> ReleaseScheduler {
        ReleaseScheduler::new(self.environment(), Self::registry())
    }

    /// Reporter over the harness environment (15 minute service, 0.8 threshold).
    #[must_use]
    pub fn reporter(&self) -> QueueStatusReporter {
        QueueStatusReporter::new(
            self.environment(),
            Self::registry(),
            Duration::minutes(15),
            QueueStatusReporter::DEFAULT_COVERAGE_THRESHOLD,
        )
    }

    /// Insert `count` approved requests, one minute apart from 2025-01-02
    /// 09:00 UTC. Returns ids in submission order.
    pub fn seed_approved(
        &self,
        category: Category,
        visit_date: NaiveDate,
        count: u32,
    ) -> Vec<RequestId> {
        self.seed_approved_from(category, visit_date, at(2025, 1, 2, 9, 0), count)
    }

    /// Insert `count` approved requests, one minute apart from `start`.
    pub fn seed_approved_from(
        &self,
        category: Category,
        visit_date: NaiveDate,
        start: DateTime<Utc>,
        count: u32,
    ) -> Vec<RequestId> {
        (0..count)
            .map(|offset| {
                let request = approved_request(
                    category,
                    visit_date,
                    start + Duration::minutes(i64::from(offset)),
                );
                let id = request.id;
                self.requests.insert(request).expect("fresh requester");
                id
            })
            .collect()
    }

    /// Insert a single request as-is.
    pub fn insert(&self, request: ServiceRequest) -> RequestId {
        let id = request.id;
        self.requests.insert(request).expect("fresh requester");
        id
    }
}
