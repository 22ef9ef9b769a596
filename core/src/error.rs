//! Error types for the release engine.
//!
//! Only batch-level preconditions ([`ReleaseError`]) abort a release. Per-item
//! problems ([`IssueError`]) are collected into the release report, and
//! malformed capacity configuration ([`ConfigurationError`]) is logged and
//! clamped rather than propagated.

use crate::types::{Category, RequestId, RequestStatus, RequesterId};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the storage collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database connection or query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The requester already holds a non-terminal request for the slot.
    #[error(
        "Requester {requester_id} already has an active {category} request for {visit_date}"
    )]
    DuplicateActiveRequest {
        /// Requester holding the slot
        requester_id: RequesterId,
        /// Visit date of the slot
        visit_date: NaiveDate,
        /// Category of the slot
        category: Category,
    },

    /// No request with this identifier exists.
    #[error("Service request not found: {0}")]
    NotFound(RequestId),
}

/// Why a single ticket could not be issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueError {
    /// The request is no longer `Approved` (lost a race, or was cancelled or
    /// rejected concurrently).
    #[error("Request {request_id} is not approved (current status: {})", status_label(.current.as_ref()))]
    InvalidState {
        /// Request that failed the precondition
        request_id: RequestId,
        /// Status observed at the time of the write, if the row still exists
        current: Option<RequestStatus>,
    },

    /// The request is approved but has no visit date to issue against.
    #[error("Request {request_id} has no visit date")]
    Unscheduled {
        /// Request without a visit date
        request_id: RequestId,
    },

    /// The slot already holds as many tickets as its capacity allows.
    #[error("Capacity of {limit} tickets reached for {category} on {visit_date}")]
    CapacityExhausted {
        /// Visit date of the slot
        visit_date: NaiveDate,
        /// Category of the slot
        category: Category,
        /// The capacity that was hit
        limit: u32,
    },

    /// Storage failed while writing the ticket; nothing was changed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

fn status_label(status: Option<&RequestStatus>) -> &'static str {
    status.map_or("missing", RequestStatus::as_str)
}

/// Errors that abort a whole release batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    /// The date is not an operating day and no override opens it.
    #[error("{date} is not an operating day; tickets cannot be released")]
    InvalidReleaseDay {
        /// Requested release date
        date: NaiveDate,
    },

    /// The operating-day lookup itself failed.
    #[error("Could not resolve release day: {0}")]
    Store(#[from] StoreError),
}

/// Malformed capacity configuration. Never propagated: the affected limit is
/// clamped to zero and the problem is logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A configured category maximum is negative.
    #[error("Negative capacity {value} configured for {category} on {date}")]
    NegativeLimit {
        /// Configured date
        date: NaiveDate,
        /// Affected category
        category: Category,
        /// The offending value
        value: i32,
    },
}

/// Delivery failure reported by a notification sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The downstream transport rejected or dropped the message.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Invalid release configuration detected at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A weekday name could not be parsed.
    #[error("Invalid weekday '{0}' in RELEASE_OPERATING_WEEKDAYS")]
    InvalidWeekday(String),

    /// The weekday rule would never open the service.
    #[error("RELEASE_OPERATING_WEEKDAYS names no operating days")]
    NoOperatingDays,

    /// The coverage threshold is outside `0.0..=1.0`.
    #[error("Coverage threshold must be between 0 and 1, got {0}")]
    InvalidCoverageThreshold(f64),

    /// The average service duration is zero.
    #[error("Average service duration must be at least one minute")]
    ZeroServiceDuration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message_names_status() {
        let request_id = RequestId::new();
        let err = IssueError::InvalidState {
            request_id,
            current: Some(RequestStatus::TicketIssued),
        };
        assert_eq!(
            err.to_string(),
            format!("Request {request_id} is not approved (current status: ticket_issued)")
        );

        let gone = IssueError::InvalidState {
            request_id,
            current: None,
        };
        assert!(gone.to_string().ends_with("(current status: missing)"));
    }

    #[test]
    fn test_store_error_converts_into_issue_error() {
        let err: IssueError = StoreError::Database("connection reset".to_string()).into();
        assert_eq!(err.to_string(), "Persistence error: Database error: connection reset");
    }
}
