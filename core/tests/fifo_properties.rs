//! Property tests for queue ordering and release fairness.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use proptest::prelude::*;
use proptest::test_runner::Config;
use relief_desk_core::queue::fifo_order;
use relief_desk_core::{
    CapacityDay, Category, Priority, QueueFilter, ReleaseOptions, RequestQueue, ServiceRequest,
};
use relief_desk_testing::TestHarness;
use relief_desk_testing::fixtures::{approved_request, at, date};
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn priority_from(index: u8) -> Priority {
    match index % 4 {
        0 => Priority::Low,
        1 => Priority::Medium,
        2 => Priority::High,
        _ => Priority::Urgent,
    }
}

/// Seed one approved Food request per `(minute, priority)` pair, all for the
/// same Wednesday. Minutes may repeat, exercising the id tie-break.
fn seed(harness: &TestHarness, entries: &[(u8, u8)]) -> Vec<ServiceRequest> {
    let wednesday = date(2025, 1, 8);
    let base = at(2025, 1, 2, 9, 0);
    entries
        .iter()
        .map(|(minute, priority)| {
            let mut request = approved_request(
                Category::Food,
                wednesday,
                base + Duration::minutes(i64::from(*minute)),
            );
            request.priority = priority_from(*priority);
            harness.insert(request.clone());
            request
        })
        .collect()
}

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn fetch_is_fifo_and_bounded(
        entries in prop::collection::vec((0_u8..30, 0_u8..4), 0..40),
        limit in 0_u32..50,
    ) {
        let harness = TestHarness::new();
        let mut expected = seed(&harness, &entries);
        expected.sort_by(fifo_order);
        expected.truncate(limit as usize);

        let queue = RequestQueue::new(Arc::new(harness.requests.clone()));
        let fetched = runtime()
            .block_on(queue.fetch(date(2025, 1, 8), Category::Food, limit, QueueFilter::all()))
            .unwrap();

        prop_assert_eq!(fetched, expected);
    }

    #[test]
    fn filtered_fetch_keeps_submission_order(
        entries in prop::collection::vec((0_u8..30, 0_u8..4), 0..40),
    ) {
        let harness = TestHarness::new();
        let mut expected: Vec<_> = seed(&harness, &entries)
            .into_iter()
            .filter(|r| r.priority >= Priority::High)
            .collect();
        expected.sort_by(fifo_order);

        let queue = RequestQueue::new(Arc::new(harness.requests.clone()));
        let fetched = runtime()
            .block_on(queue.fetch(
                date(2025, 1, 8),
                Category::Food,
                100,
                QueueFilter::at_least(Priority::High),
            ))
            .unwrap();

        prop_assert_eq!(fetched, expected);
    }

    #[test]
    fn release_tickets_the_earliest_requests(
        entries in prop::collection::vec((0_u8..30, 0_u8..4), 0..30),
        capacity in 0_i32..20,
    ) {
        let harness = TestHarness::new();
        let wednesday = date(2025, 1, 8);
        harness
            .capacity
            .upsert(CapacityDay::new(wednesday, true, false).with_limit(Category::Food, capacity));
        let mut requests = seed(&harness, &entries);
        requests.sort_by(fifo_order);

        let result = runtime()
            .block_on(harness.scheduler().release(
                wednesday,
                &[Category::Food],
                ReleaseOptions::default(),
            ))
            .unwrap();

        let expected: Vec<_> = requests
            .iter()
            .take(capacity.unsigned_abs() as usize)
            .map(|r| r.id)
            .collect();
        let released: Vec<_> = result.released.iter().map(|t| t.request_id).collect();
        prop_assert_eq!(&released, &expected);
        prop_assert_eq!(
            result.remaining_for(Category::Food),
            Some(u32::try_from(requests.len() - expected.len()).unwrap())
        );
    }
}
