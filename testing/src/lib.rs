//! # Relief Desk Testing
//!
//! Testing utilities for the Relief Desk release engine.
//!
//! This crate provides:
//! - In-memory implementations of the store traits
//! - Fault-injecting wrappers for partial-failure tests
//! - Recording and failing notification sinks
//! - Fixtures and a [`TestHarness`] wiring everything together
//!
//! ## Example
//!
//! ```ignore
//! use relief_desk_testing::{TestHarness, fixtures::date};
//! use relief_desk_core::{Category, ReleaseOptions};
//!
//! #[tokio::test]
//! async fn test_release() {
//!     let harness = TestHarness::new();
//!     let wednesday = date(2025, 1, 8);
//!     harness.seed_approved(Category::Food, wednesday, 3);
//!
//!     let result = harness
//!         .scheduler()
//!         .release(wednesday, &[Category::Food], ReleaseOptions::default())
//!         .await
//!         .unwrap();
//!     assert_eq!(result.total_released, 3);
//! }
//! ```

pub mod faults;
pub mod fixtures;
pub mod notifications;
pub mod stores;

use chrono::{DateTime, Utc};
use relief_desk_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use relief_desk_testing::mocks::FixedClock;
    /// use relief_desk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a test tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use faults::{FailingCapacityStore, FailingRequestStore};
pub use fixtures::TestHarness;
pub use mocks::{FixedClock, test_clock};
pub use notifications::{FailingNotificationSink, RecordingNotificationSink};
pub use stores::{InMemoryCapacityStore, InMemoryRequestStore, InMemoryStaffingStore};
