//! # Relief Desk Core
//!
//! Capacity-constrained ticket release for a charity's help-request queue.
//!
//! Requesters submit help requests for a visit date and a service category;
//! staff approve them; on operating days a release turns the earliest
//! approved requests into tickets, never more than the slot's capacity.
//!
//! ## Components
//!
//! - [`OperatingCalendar`]: which dates the service runs on
//! - [`CapacityRegistry`]: how many tickets a slot may hold
//! - [`RequestQueue`]: approved requests in FIFO order
//! - [`TicketIssuer`]: atomic `Approved → TicketIssued` with number and code
//! - [`ReleaseScheduler`]: the batch release algorithm
//! - [`QueueStatusReporter`]: depth, overbooking, wait and coverage figures
//!
//! Storage and notification sit behind the traits in [`environment`], so the
//! same engine runs against `PostgreSQL` in production and in-memory stores
//! in tests.
//!
//! ## Example
//!
//! ```ignore
//! use relief_desk_core::*;
//!
//! let services = ReleaseServices::new(env, ReleaseConfig::from_env())?;
//! let result = services
//!     .scheduler
//!     .release(date, &[], services.release_options())
//!     .await?;
//!
//! for ticket in &result.released {
//!     println!("{} -> {}", ticket.request_id, ticket.ticket_number);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calendar;
pub mod capacity;
pub mod config;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod reporter;
pub mod scheduler;
pub mod services;
pub mod ticket;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};

pub use calendar::{DayResolution, DaySource, OperatingCalendar};
pub use capacity::CapacityRegistry;
pub use config::ReleaseConfig;
pub use environment::{
    BoxFuture, CapacityGuard, CapacityStore, Clock, NotificationSink, QueueFilter,
    ReleaseEnvironment, RequestStore, StaffingStore, SystemClock, TicketFields,
    TracingNotificationSink, TransitionOutcome, TransitionRequest,
};
pub use error::{
    ConfigError, ConfigurationError, IssueError, NotificationError, ReleaseError, StoreError,
};
pub use queue::RequestQueue;
pub use reporter::{CoverageGap, OverbookingWarning, QueueStatusReporter, SlotStatus};
pub use scheduler::{
    CategoryError, CategoryRelease, FailureKind, ReleaseFailure, ReleaseOptions, ReleaseResult,
    ReleaseScheduler,
};
pub use services::ReleaseServices;
pub use ticket::TicketIssuer;
pub use types::{
    CapacityDay, Category, IssuedTicket, Priority, RequestId, RequestStatus, RequesterId,
    ServiceRequest, StaffingDay, TicketCode, TicketNumber,
};
