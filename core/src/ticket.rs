//! Ticket issuer.
//!
//! Turns one approved request into a ticket with a single conditional write:
//! the status check, the capacity check and the ticket fields land together
//! or not at all. Two releases racing for the same request produce exactly one
//! winner; the loser sees [`IssueError::InvalidState`].

use crate::environment::{
    CapacityGuard, Clock, RequestStore, TicketFields, TransitionOutcome, TransitionRequest,
};
use crate::error::{IssueError, StoreError};
use crate::types::{IssuedTicket, RequestStatus, ServiceRequest, TicketCode, TicketNumber};
use std::sync::Arc;

/// Attempts at generating a ticket number the store has not seen.
pub const MAX_NUMBER_ATTEMPTS: u32 = 3;

/// Assigns ticket numbers and codes and performs the status transition.
#[derive(Clone)]
pub struct TicketIssuer {
    store: Arc<dyn RequestStore>,
    clock: Arc<dyn Clock>,
}

impl TicketIssuer {
    /// Create an issuer writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RequestStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a ticket for `request`.
    ///
    /// With a `guard`, the write is refused once the slot holds `guard.limit`
    /// tickets.
    ///
    /// # Errors
    ///
    /// - [`IssueError::InvalidState`]: the request is not (or no longer) approved
    /// - [`IssueError::Unscheduled`]: the request has no visit date
    /// - [`IssueError::CapacityExhausted`]: the guard's slot is full
    /// - [`IssueError::Persistence`]: storage failed; nothing was written
    pub async fn issue(
        &self,
        request: &ServiceRequest,
        guard: Option<CapacityGuard>,
    ) -> Result<IssuedTicket, IssueError> {
        if request.status != RequestStatus::Approved {
            return Err(IssueError::InvalidState {
                request_id: request.id,
                current: Some(request.status),
            });
        }

        let Some(visit_date) = request.visit_date else {
            return Err(IssueError::Unscheduled {
                request_id: request.id,
            });
        };

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let ticket_number = TicketNumber::generate(visit_date);
            let ticket_code = TicketCode::derive(&ticket_number);
            let issued_at = self.clock.now();

            let outcome = self
                .store
                .conditional_transition(TransitionRequest {
                    request_id: request.id,
                    from: RequestStatus::Approved,
                    to: RequestStatus::TicketIssued,
                    ticket: Some(TicketFields {
                        ticket_number: ticket_number.clone(),
                        ticket_code: ticket_code.clone(),
                        issued_at,
                    }),
                    guard,
                })
                .await?;

            match outcome {
                TransitionOutcome::Applied => {
                    tracing::debug!(
                        request_id = %request.id,
                        %ticket_number,
                        "Ticket issued"
                    );
                    return Ok(IssuedTicket {
                        request_id: request.id,
                        requester_id: request.requester_id,
                        category: request.category,
                        visit_date,
                        ticket_number,
                        ticket_code,
                        issued_at,
                    });
                }
                TransitionOutcome::StatusMismatch { current } => {
                    return Err(IssueError::InvalidState {
                        request_id: request.id,
                        current,
                    });
                }
                TransitionOutcome::CapacityReached { issued } => {
                    let limit = guard.map_or(issued, |g| g.limit);
                    return Err(IssueError::CapacityExhausted {
                        visit_date,
                        category: request.category,
                        limit,
                    });
                }
                TransitionOutcome::DuplicateTicketNumber => {
                    tracing::warn!(
                        request_id = %request.id,
                        %ticket_number,
                        attempt,
                        "Ticket number collision, regenerating"
                    );
                }
            }
        }

        Err(IssueError::Persistence(StoreError::Database(format!(
            "could not allocate a unique ticket number after {MAX_NUMBER_ATTEMPTS} attempts"
        ))))
    }
}
