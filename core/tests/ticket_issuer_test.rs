//! Ticket issuer behaviour at the single-request level.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use relief_desk_core::{
    CapacityGuard, Category, IssueError, RequestStatus, TicketCode, TicketIssuer,
};
use relief_desk_testing::fixtures::{approved_request, at, date};
use relief_desk_testing::{FailingRequestStore, InMemoryRequestStore, test_clock};
use std::sync::Arc;

fn issuer_over(store: Arc<dyn relief_desk_core::RequestStore>) -> TicketIssuer {
    TicketIssuer::new(store, Arc::new(test_clock()))
}

#[tokio::test]
async fn test_issue_writes_ticket_fields_atomically() {
    let store = InMemoryRequestStore::new();
    let wednesday = date(2025, 1, 8);
    let request = approved_request(Category::Food, wednesday, at(2025, 1, 2, 9, 0));
    store.insert(request.clone()).unwrap();

    let ticket = issuer_over(Arc::new(store.clone()))
        .issue(&request, None)
        .await
        .unwrap();

    let stored = store.snapshot(request.id).unwrap();
    assert_eq!(stored.status, RequestStatus::TicketIssued);
    assert_eq!(stored.ticket_number, Some(ticket.ticket_number.clone()));
    assert_eq!(stored.ticket_code, Some(TicketCode::derive(&ticket.ticket_number)));
    assert_eq!(ticket.visit_date, wednesday);
    assert_eq!(ticket.requester_id, request.requester_id);
}

#[tokio::test]
async fn test_issue_rejects_non_approved_snapshot() {
    let store = InMemoryRequestStore::new();
    let mut request = approved_request(Category::Food, date(2025, 1, 8), at(2025, 1, 2, 9, 0));
    request.status = RequestStatus::Pending;
    store.insert(request.clone()).unwrap();

    let err = issuer_over(Arc::new(store.clone()))
        .issue(&request, None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IssueError::InvalidState {
            request_id: request.id,
            current: Some(RequestStatus::Pending),
        }
    );
}

/// The snapshot says approved but the row was cancelled in the meantime.
#[tokio::test]
async fn test_issue_loses_to_concurrent_cancellation() {
    let store = InMemoryRequestStore::new();
    let request = approved_request(Category::General, date(2025, 1, 8), at(2025, 1, 2, 9, 0));
    store.insert(request.clone()).unwrap();
    store.set_status(request.id, RequestStatus::Cancelled);

    let err = issuer_over(Arc::new(store.clone()))
        .issue(&request, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IssueError::InvalidState {
            current: Some(RequestStatus::Cancelled),
            ..
        }
    ));
    assert!(!store.snapshot(request.id).unwrap().has_ticket());
}

#[tokio::test]
async fn test_issue_requires_visit_date() {
    let store = InMemoryRequestStore::new();
    let mut request = approved_request(Category::Food, date(2025, 1, 8), at(2025, 1, 2, 9, 0));
    request.visit_date = None;
    store.insert(request.clone()).unwrap();

    let err = issuer_over(Arc::new(store))
        .issue(&request, None)
        .await
        .unwrap_err();
    assert_eq!(err, IssueError::Unscheduled { request_id: request.id });
}

#[tokio::test]
async fn test_guard_refuses_full_slot() {
    let store = InMemoryRequestStore::new();
    let wednesday = date(2025, 1, 8);
    let first = approved_request(Category::Food, wednesday, at(2025, 1, 2, 9, 0));
    let second = approved_request(Category::Food, wednesday, at(2025, 1, 2, 9, 1));
    store.insert(first.clone()).unwrap();
    store.insert(second.clone()).unwrap();

    let guard = CapacityGuard {
        visit_date: wednesday,
        category: Category::Food,
        limit: 1,
    };
    let issuer = issuer_over(Arc::new(store.clone()));
    issuer.issue(&first, Some(guard)).await.unwrap();

    let err = issuer.issue(&second, Some(guard)).await.unwrap_err();
    assert_eq!(
        err,
        IssueError::CapacityExhausted {
            visit_date: wednesday,
            category: Category::Food,
            limit: 1,
        }
    );
    assert_eq!(store.snapshot(second.id).unwrap().status, RequestStatus::Approved);
}

#[tokio::test]
async fn test_ticket_number_collision_is_retried() {
    let inner = InMemoryRequestStore::new();
    let request = approved_request(Category::Food, date(2025, 1, 8), at(2025, 1, 2, 9, 0));
    inner.insert(request.clone()).unwrap();

    let store = FailingRequestStore::new(inner.clone()).collide_ticket_numbers(2);
    let ticket = issuer_over(Arc::new(store))
        .issue(&request, None)
        .await
        .unwrap();

    assert_eq!(
        inner.snapshot(request.id).unwrap().ticket_number,
        Some(ticket.ticket_number)
    );
}

#[tokio::test]
async fn test_ticket_number_collisions_exhaust_attempts() {
    let inner = InMemoryRequestStore::new();
    let request = approved_request(Category::Food, date(2025, 1, 8), at(2025, 1, 2, 9, 0));
    inner.insert(request.clone()).unwrap();

    let store = FailingRequestStore::new(inner.clone()).collide_ticket_numbers(3);
    let err = issuer_over(Arc::new(store))
        .issue(&request, None)
        .await
        .unwrap_err();

    assert!(matches!(err, IssueError::Persistence(_)));
    assert_eq!(inner.snapshot(request.id).unwrap().status, RequestStatus::Approved);
}
