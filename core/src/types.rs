//! Domain types for the ticket release engine.
//!
//! Value objects, entities and status enums shared by every component: the
//! allocatable [`ServiceRequest`], the per-date [`CapacityDay`] configuration,
//! staffing figures for coverage reporting, and the issued ticket identifiers.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a service request
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random `RequestId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequestId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the person who submitted a request (owned by the user system)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(Uuid);

impl RequesterId {
    /// Creates a new random `RequesterId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequesterId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequesterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Error returned when parsing one of the domain enums from its string form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

/// Service category a request is queued under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Food parcel collection
    Food,
    /// General assistance visit
    General,
}

impl Category {
    /// Every category, in a stable order.
    pub const ALL: [Self; 2] = [Self::Food, Self::General];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::General => "general",
        }
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "food" => Ok(Self::Food),
            "general" => Ok(Self::General),
            _ => Err(ParseEnumError {
                kind: "category",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a service request.
///
/// ```text
/// Pending --> Approved --> TicketIssued --> Completed
///    |           |
///    +--> Rejected  +--> Cancelled
/// ```
///
/// Only `Approved -> TicketIssued` is owned by the release engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Submitted, awaiting review
    Pending,
    /// Approved and queued for a visit date
    Approved,
    /// Holds a visit ticket
    TicketIssued,
    /// Visit took place
    Completed,
    /// Withdrawn by the requester or staff
    Cancelled,
    /// Refused during review
    Rejected,
}

impl RequestStatus {
    /// Statuses that make up the visible queue for a slot.
    pub const QUEUED: &'static [Self] = &[Self::Pending, Self::Approved];

    /// Statuses still waiting for a ticket.
    pub const AWAITING_TICKET: &'static [Self] = &[Self::Approved];

    /// Statuses whose tickets consume slot capacity.
    pub const HOLDING_CAPACITY: &'static [Self] = &[Self::TicketIssued, Self::Completed];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::TicketIssued => "ticket_issued",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal statuses never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rejected)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::TicketIssued | Self::Cancelled)
                | (Self::TicketIssued, Self::Completed | Self::Cancelled)
        )
    }
}

impl FromStr for RequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "ticket_issued" => Ok(Self::TicketIssued),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError {
                kind: "request status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency hint attached to a request.
///
/// Ordered `Low < Medium < High < Urgent`. Never used to reorder the queue;
/// only to carve out emergency-only batches on request.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Routine request
    Low,
    /// Default priority
    #[default]
    Medium,
    /// Elevated need
    High,
    /// Emergency
    Urgent,
}

impl Priority {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// Human-readable ticket number, unique across the system.
///
/// Format: `RD-YYYYMMDD-XXXXXXXXXX` where the suffix is ten upper-case hex
/// characters taken from a random v4 UUID. The storage layer holds the
/// uniqueness constraint; the format only has to make collisions rare.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketNumber(String);

impl TicketNumber {
    /// Prefix shared by all ticket numbers.
    pub const PREFIX: &'static str = "RD";

    /// Generate a fresh ticket number for a visit date.
    #[must_use]
    pub fn generate(visit_date: NaiveDate) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}-{}",
            Self::PREFIX,
            visit_date.format("%Y%m%d"),
            suffix[..10].to_ascii_uppercase()
        ))
    }

    /// Wrap an existing number (e.g. loaded from storage).
    #[must_use]
    pub const fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Borrow the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scannable payload printed as a QR code on the visit ticket.
///
/// `RDT1:<ticket number>:<check>` where `check` is the first eight hex
/// characters of SHA-256 over the ticket number. Deriving twice from the same
/// number yields the same code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketCode(String);

impl TicketCode {
    const SCHEME: &'static str = "RDT1";

    /// Derive the code for a ticket number.
    #[must_use]
    pub fn derive(number: &TicketNumber) -> Self {
        Self(format!(
            "{}:{}:{}",
            Self::SCHEME,
            number.as_str(),
            Self::checksum(number.as_str())
        ))
    }

    /// Validate a scanned payload and return the ticket number it carries.
    #[must_use]
    pub fn verify(payload: &str) -> Option<TicketNumber> {
        let mut parts = payload.splitn(3, ':');
        let scheme = parts.next()?;
        let number = parts.next()?;
        let check = parts.next()?;
        (scheme == Self::SCHEME && !number.is_empty() && check == Self::checksum(number))
            .then(|| TicketNumber(number.to_string()))
    }

    /// Wrap an existing code (e.g. loaded from storage).
    #[must_use]
    pub const fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Borrow the payload as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn checksum(number: &str) -> String {
        let digest = Sha256::digest(number.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A help request: the unit the release engine allocates tickets to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Request identifier
    pub id: RequestId,
    /// Who asked for help
    pub requester_id: RequesterId,
    /// Service category
    pub category: Category,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Date the request is queued against (set on approval)
    pub visit_date: Option<NaiveDate>,
    /// Urgency hint
    pub priority: Priority,
    /// Ticket number, once issued
    pub ticket_number: Option<TicketNumber>,
    /// Scannable code derived from the ticket number
    pub ticket_code: Option<TicketCode>,
    /// Submission time (primary queue ordering key)
    pub submitted_at: DateTime<Utc>,
    /// When the ticket was issued
    pub ticket_issued_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    /// Create a freshly submitted (pending) request.
    #[must_use]
    pub fn new(
        requester_id: RequesterId,
        category: Category,
        priority: Priority,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            requester_id,
            category,
            status: RequestStatus::Pending,
            visit_date: None,
            priority,
            ticket_number: None,
            ticket_code: None,
            submitted_at,
            ticket_issued_at: None,
        }
    }

    /// Whether a ticket number has been assigned.
    #[must_use]
    pub const fn has_ticket(&self) -> bool {
        self.ticket_number.is_some()
    }

    /// True when the request occupies its (requester, date, category) slot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Per-date capacity configuration written by administrators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityDay {
    /// The configured date
    pub date: NaiveDate,
    /// Weekday of `date`
    pub day_of_week: Weekday,
    /// Maximum tickets per category, as stored (may be malformed)
    pub max_by_category: HashMap<Category, i32>,
    /// Whether visits happen on this date at all
    pub is_operating_day: bool,
    /// Manual adjustment overriding the weekday rule
    pub is_override: bool,
}

impl CapacityDay {
    /// Create a capacity row with no category limits.
    #[must_use]
    pub fn new(date: NaiveDate, is_operating_day: bool, is_override: bool) -> Self {
        Self {
            date,
            day_of_week: date.weekday(),
            max_by_category: HashMap::new(),
            is_operating_day,
            is_override,
        }
    }

    /// Set the configured maximum for a category.
    #[must_use]
    pub fn with_limit(mut self, category: Category, max: i32) -> Self {
        self.max_by_category.insert(category, max);
        self
    }
}

/// Volunteer staffing figures for a single date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffingDay {
    /// Service date
    pub date: NaiveDate,
    /// Volunteers needed
    pub required_volunteers: u32,
    /// Volunteers signed up
    pub assigned_volunteers: u32,
}

impl StaffingDay {
    /// Fraction of the requirement covered; `1.0` when nothing is required.
    #[must_use]
    pub fn coverage_ratio(&self) -> f64 {
        if self.required_volunteers == 0 {
            return 1.0;
        }
        f64::from(self.assigned_volunteers) / f64::from(self.required_volunteers)
    }
}

/// A ticket handed out by a release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTicket {
    /// The request the ticket belongs to
    pub request_id: RequestId,
    /// Ticket holder
    pub requester_id: RequesterId,
    /// Service category
    pub category: Category,
    /// Visit date
    pub visit_date: NaiveDate,
    /// Unique ticket number
    pub ticket_number: TicketNumber,
    /// Scannable code
    pub ticket_code: TicketCode,
    /// Issue time
    pub issued_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::TicketIssued,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
            RequestStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("issued".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_lifecycle_edges() {
        assert!(RequestStatus::Approved.can_transition_to(RequestStatus::TicketIssued));
        assert!(RequestStatus::TicketIssued.can_transition_to(RequestStatus::Completed));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::TicketIssued));
        assert!(!RequestStatus::Completed.can_transition_to(RequestStatus::Cancelled));
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::TicketIssued.is_terminal());
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Medium);
        assert_eq!("URGENT".parse::<Priority>().unwrap(), Priority::Urgent);
    }

    #[test]
    fn test_ticket_number_format() {
        let number = TicketNumber::generate(date(2025, 3, 4));
        let parts: Vec<&str> = number.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "RD");
        assert_eq!(parts[1], "20250304");
        assert_eq!(parts[2].len(), 10);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_ticket_numbers_differ() {
        let a = TicketNumber::generate(date(2025, 3, 4));
        let b = TicketNumber::generate(date(2025, 3, 4));
        assert_ne!(a, b);
    }

    #[test]
    fn test_ticket_code_is_deterministic_and_verifiable() {
        let number = TicketNumber::from_string("RD-20250304-0A1B2C3D4E".to_string());
        let first = TicketCode::derive(&number);
        let second = TicketCode::derive(&number);
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("RDT1:RD-20250304-0A1B2C3D4E:"));
        assert_eq!(TicketCode::verify(first.as_str()), Some(number));
    }

    #[test]
    fn test_ticket_code_rejects_tampering() {
        let number = TicketNumber::from_string("RD-20250304-0A1B2C3D4E".to_string());
        let code = TicketCode::derive(&number);
        let tampered = code.as_str().replace("0A1B", "0A1C");
        assert_eq!(TicketCode::verify(&tampered), None);
        assert_eq!(TicketCode::verify("RDT1:only-two"), None);
        assert_eq!(TicketCode::verify("garbage"), None);
    }

    #[test]
    fn test_capacity_day_derives_weekday() {
        let day = CapacityDay::new(date(2025, 1, 5), false, true).with_limit(Category::Food, 3);
        assert_eq!(day.day_of_week, Weekday::Sun);
        assert_eq!(day.max_by_category.get(&Category::Food), Some(&3));
    }

    #[test]
    fn test_capacity_day_json_uses_category_keys() {
        let day = CapacityDay::new(date(2025, 1, 7), true, false).with_limit(Category::General, 5);
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json["max_by_category"]["general"], 5);
    }

    #[test]
    fn test_coverage_ratio() {
        let staffed = StaffingDay {
            date: date(2025, 1, 7),
            required_volunteers: 10,
            assigned_volunteers: 7,
        };
        assert!((staffed.coverage_ratio() - 0.7).abs() < f64::EPSILON);

        let idle = StaffingDay {
            required_volunteers: 0,
            assigned_volunteers: 0,
            ..staffed
        };
        assert!((idle.coverage_ratio() - 1.0).abs() < f64::EPSILON);
    }
}
