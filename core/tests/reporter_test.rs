//! Queue status reporting scenarios.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use relief_desk_core::{
    CapacityDay, Category, QueueStatusReporter, ReleaseOptions, RequestStatus, StaffingDay,
};
use relief_desk_testing::TestHarness;
use relief_desk_testing::fixtures::{approved_request, at, date};

/// General capacity 5 with 8 waiting: overbooked by 3.
#[tokio::test]
async fn test_overbooking_warning_reports_excess() {
    let harness = TestHarness::new();
    let thursday = date(2025, 1, 9);
    harness
        .capacity
        .upsert(CapacityDay::new(thursday, true, false).with_limit(Category::General, 5));
    harness.seed_approved(Category::General, thursday, 8);

    let warning = harness
        .reporter()
        .overbooking_warning(thursday, Category::General)
        .await
        .unwrap();

    assert!(warning.overbooked);
    assert_eq!(warning.depth, 8);
    assert_eq!(warning.limit, 5);
    assert_eq!(warning.excess, 3);
}

/// Pending requests count toward depth; issued and terminal ones do not.
#[tokio::test]
async fn test_depth_counts_pending_and_approved_only() {
    let harness = TestHarness::new();
    let wednesday = date(2025, 1, 8);
    let ids = harness.seed_approved(Category::Food, wednesday, 4);
    harness.requests.set_status(ids[0], RequestStatus::Pending);
    harness.requests.set_status(ids[1], RequestStatus::Rejected);
    harness.requests.set_status(ids[2], RequestStatus::TicketIssued);

    let depth = harness
        .reporter()
        .depth(wednesday, Category::Food)
        .await
        .unwrap();
    assert_eq!(depth, 2);
}

/// Nothing configured and nothing queued is zero, not an error.
#[tokio::test]
async fn test_empty_slot_reports_zero() {
    let harness = TestHarness::new();
    let sunday = date(2025, 1, 5);

    let warning = harness
        .reporter()
        .overbooking_warning(sunday, Category::Food)
        .await
        .unwrap();
    assert_eq!(warning.depth, 0);
    assert_eq!(warning.limit, 0);
    assert!(!warning.overbooked);
}

#[test]
fn test_estimated_wait_scales_with_position() {
    let harness = TestHarness::new();
    let reporter = harness.reporter();

    assert_eq!(reporter.estimated_wait(0), Duration::zero());
    assert_eq!(reporter.estimated_wait(4), Duration::minutes(60));
    assert_eq!(reporter.estimated_wait(u32::MAX), Duration::MAX);
}

#[tokio::test]
async fn test_coverage_gaps_use_threshold() {
    let harness = TestHarness::new();
    let staffing = [
        (7, 10, 8),  // exactly 0.8: covered
        (8, 10, 7),  // 0.7: gap
        (9, 0, 0),   // nothing required: never a gap
        (10, 4, 1),  // 0.25: gap
        (14, 2, 0),  // outside the range
    ];
    for (day, required, assigned) in staffing {
        harness.staffing.set(StaffingDay {
            date: date(2025, 1, day),
            required_volunteers: required,
            assigned_volunteers: assigned,
        });
    }

    let gaps = harness
        .reporter()
        .coverage_gaps(date(2025, 1, 6), date(2025, 1, 12))
        .await
        .unwrap();

    let dates: Vec<_> = gaps.iter().map(|g| g.date).collect();
    assert_eq!(dates, vec![date(2025, 1, 8), date(2025, 1, 10)]);
    assert_eq!(gaps[1].required, 4);
    assert_eq!(gaps[1].assigned, 1);
    assert!((gaps[1].ratio - 0.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_coverage_gaps_inverted_range_is_empty() {
    let harness = TestHarness::new();
    harness.staffing.set(StaffingDay {
        date: date(2025, 1, 8),
        required_volunteers: 5,
        assigned_volunteers: 0,
    });

    let gaps = harness
        .reporter()
        .coverage_gaps(date(2025, 1, 9), date(2025, 1, 7))
        .await
        .unwrap();
    assert!(gaps.is_empty());
}

#[tokio::test]
async fn test_custom_threshold() {
    let harness = TestHarness::new();
    harness.staffing.set(StaffingDay {
        date: date(2025, 1, 8),
        required_volunteers: 10,
        assigned_volunteers: 9,
    });

    let strict = QueueStatusReporter::new(
        harness.environment(),
        TestHarness::registry(),
        Duration::minutes(15),
        1.0,
    );
    let gaps = strict
        .coverage_gaps(date(2025, 1, 8), date(2025, 1, 8))
        .await
        .unwrap();
    assert_eq!(gaps.len(), 1);
}

/// Slot status bundles everything a dashboard shows, before and after a release.
#[tokio::test]
async fn test_slot_status_tracks_release() {
    let harness = TestHarness::new();
    let wednesday = date(2025, 1, 8);
    harness
        .capacity
        .upsert(CapacityDay::new(wednesday, true, false).with_limit(Category::Food, 2));
    harness.seed_approved(Category::Food, wednesday, 3);
    let mut pending = approved_request(Category::Food, wednesday, at(2025, 1, 3, 10, 0));
    pending.status = RequestStatus::Pending;
    harness.insert(pending);

    let reporter = harness.reporter();
    let before = reporter.slot_status(wednesday, Category::Food).await.unwrap();
    assert!(before.is_operating_day);
    assert_eq!(before.issued, 0);
    assert_eq!(before.overbooking.depth, 4);
    assert_eq!(before.overbooking.excess, 2);
    assert_eq!(before.last_in_line_wait_minutes, 45);

    harness
        .scheduler()
        .release(wednesday, &[Category::Food], ReleaseOptions::default())
        .await
        .unwrap();

    let after = reporter.slot_status(wednesday, Category::Food).await.unwrap();
    assert_eq!(after.issued, 2);
    assert_eq!(after.overbooking.depth, 2);
    assert!(!after.overbooking.overbooked);
    assert_eq!(after.last_in_line_wait_minutes, 15);
}

/// The first person in line waits nothing, so a one-request queue reports zero.
#[tokio::test]
async fn test_last_in_line_wait_is_zero_based() {
    let harness = TestHarness::new();
    let wednesday = date(2025, 1, 8);
    let reporter = harness.reporter();

    let empty = reporter.slot_status(wednesday, Category::Food).await.unwrap();
    assert_eq!(empty.last_in_line_wait_minutes, 0);

    harness.seed_approved(Category::Food, wednesday, 1);
    let single = reporter.slot_status(wednesday, Category::Food).await.unwrap();
    assert_eq!(single.overbooking.depth, 1);
    assert_eq!(single.last_in_line_wait_minutes, 0);

    harness.seed_approved(Category::Food, wednesday, 2);
    let three = reporter.slot_status(wednesday, Category::Food).await.unwrap();
    assert_eq!(three.last_in_line_wait_minutes, 30);
}
