//! Service request storage.
//!
//! The guarded transition runs in one transaction: a per-slot advisory lock
//! serialises issuers for the same `(visit_date, category)`, the row is locked
//! with `FOR UPDATE`, the slot's tickets are counted, and only then is the
//! status written. Concurrent releases for one slot therefore see each
//! other's tickets and can never overbook it.

use crate::{database_error, decode_error, violates};
use chrono::{DateTime, NaiveDate, Utc};
use relief_desk_core::{
    BoxFuture, CapacityGuard, Category, Priority, QueueFilter, RequestId, RequestStatus,
    RequestStore, RequesterId, ServiceRequest, StoreError, TicketCode, TicketNumber,
    TransitionOutcome, TransitionRequest,
};
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

const TICKET_NUMBER_KEY: &str = "service_requests_ticket_number_key";
const ACTIVE_SLOT_INDEX: &str = "service_requests_active_slot_idx";

const PRIORITIES: [Priority; 4] = [
    Priority::Low,
    Priority::Medium,
    Priority::High,
    Priority::Urgent,
];

const SELECT_COLUMNS: &str = r"
    SELECT id, requester_id, category, status, visit_date, priority,
           ticket_number, ticket_code, submitted_at, ticket_issued_at
    FROM service_requests
";

/// `PostgreSQL`-backed [`RequestStore`].
#[derive(Clone, Debug)]
pub struct PostgresRequestStore {
    pool: PgPool,
}

impl PostgresRequestStore {
    /// Connect to `database_url` with a default pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        crate::connect(database_url, 10).await.map(Self::from_pool)
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a request, as the intake workflow does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateActiveRequest`] if the requester already
    /// holds a live request for the same date and category, or
    /// [`StoreError::Database`] if the insert fails.
    pub async fn insert(&self, request: &ServiceRequest) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO service_requests (
                id, requester_id, category, status, visit_date, priority,
                ticket_number, ticket_code, submitted_at, ticket_issued_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(*request.id.as_uuid())
        .bind(*request.requester_id.as_uuid())
        .bind(request.category.as_str())
        .bind(request.status.as_str())
        .bind(request.visit_date)
        .bind(request.priority.as_str())
        .bind(request.ticket_number.as_ref().map(TicketNumber::as_str))
        .bind(request.ticket_code.as_ref().map(TicketCode::as_str))
        .bind(request.submitted_at)
        .bind(request.ticket_issued_at)
        .execute(&self.pool)
        .await;

        match (result, request.visit_date) {
            (Ok(_), _) => Ok(()),
            (Err(e), Some(visit_date)) if violates(&e, ACTIVE_SLOT_INDEX) => {
                Err(StoreError::DuplicateActiveRequest {
                    requester_id: request.requester_id,
                    visit_date,
                    category: request.category,
                })
            }
            (Err(e), _) => Err(database_error(e)),
        }
    }

    /// Overwrite a request's status outside the release path (approval,
    /// cancellation, check-in).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such request exists, or
    /// [`StoreError::Database`] if the update fails.
    pub async fn set_status(&self, id: RequestId, status: RequestStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE service_requests SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(request_id = %id, status = status.as_str(), "Request status set");
        Ok(())
    }

    async fn fetch_approved(
        &self,
        date: NaiveDate,
        category: Category,
        filter: QueueFilter,
        limit: u32,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        let rows = sqlx::query(&format!(
            r"{SELECT_COLUMNS}
            WHERE visit_date = $1
              AND category = $2
              AND status = 'approved'
              AND priority = ANY($3)
            ORDER BY submitted_at ASC, id ASC
            LIMIT $4
            "
        ))
        .bind(date)
        .bind(category.as_str())
        .bind(admitted_priorities(filter))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter().map(row_to_request).collect()
    }

    async fn fetch_one(&self, id: RequestId) -> Result<Option<ServiceRequest>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn apply(&self, request: TransitionRequest) -> Result<TransitionOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        if let Some(guard) = request.guard {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(slot_lock_key(&guard))
                .execute(&mut *tx)
                .await
                .map_err(database_error)?;
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM service_requests WHERE id = $1 FOR UPDATE")
                .bind(*request.request_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(database_error)?;
        let current = current
            .map(|s| s.parse::<RequestStatus>().map_err(|e| decode_error("status", e)))
            .transpose()?;

        if current != Some(request.from) {
            tx.rollback().await.map_err(database_error)?;
            return Ok(TransitionOutcome::StatusMismatch { current });
        }

        if let Some(guard) = request.guard {
            let issued = count_in(
                &mut *tx,
                guard.visit_date,
                guard.category,
                RequestStatus::HOLDING_CAPACITY,
            )
            .await?;
            if issued >= guard.limit {
                tx.rollback().await.map_err(database_error)?;
                return Ok(TransitionOutcome::CapacityReached { issued });
            }
        }

        let ticket = request.ticket.as_ref();
        let result = sqlx::query(
            r"
            UPDATE service_requests
            SET status = $2,
                ticket_number = COALESCE($3, ticket_number),
                ticket_code = COALESCE($4, ticket_code),
                ticket_issued_at = COALESCE($5, ticket_issued_at),
                updated_at = now()
            WHERE id = $1 AND status = $6
            ",
        )
        .bind(*request.request_id.as_uuid())
        .bind(request.to.as_str())
        .bind(ticket.map(|t| t.ticket_number.as_str()))
        .bind(ticket.map(|t| t.ticket_code.as_str()))
        .bind(ticket.map(|t| t.issued_at))
        .bind(request.from.as_str())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {
                tx.commit().await.map_err(database_error)?;
                Ok(TransitionOutcome::Applied)
            }
            Err(e) if violates(&e, TICKET_NUMBER_KEY) => {
                tx.rollback().await.map_err(database_error)?;
                tracing::warn!(
                    request_id = %request.request_id,
                    "Ticket number collision"
                );
                metrics::counter!("relief_desk_ticket_number_collisions_total").increment(1);
                Ok(TransitionOutcome::DuplicateTicketNumber)
            }
            Err(e) => Err(database_error(e)),
        }
    }
}

impl RequestStore for PostgresRequestStore {
    fn load_approved(
        &self,
        date: NaiveDate,
        category: Category,
        filter: QueueFilter,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<ServiceRequest>, StoreError>> {
        Box::pin(self.fetch_approved(date, category, filter, limit))
    }

    fn conditional_transition(
        &self,
        request: TransitionRequest,
    ) -> BoxFuture<'_, Result<TransitionOutcome, StoreError>> {
        Box::pin(self.apply(request))
    }

    fn count_by_status(
        &self,
        date: NaiveDate,
        category: Category,
        statuses: &'static [RequestStatus],
    ) -> BoxFuture<'_, Result<u32, StoreError>> {
        Box::pin(async move { count_in(&self.pool, date, category, statuses).await })
    }

    fn get(&self, id: RequestId) -> BoxFuture<'_, Result<Option<ServiceRequest>, StoreError>> {
        Box::pin(self.fetch_one(id))
    }
}

async fn count_in<'e, E>(
    executor: E,
    date: NaiveDate,
    category: Category,
    statuses: &[RequestStatus],
) -> Result<u32, StoreError>
where
    E: PgExecutor<'e>,
{
    let labels: Vec<&'static str> = statuses.iter().map(RequestStatus::as_str).collect();
    let count: i64 = sqlx::query_scalar(
        r"
        SELECT COUNT(*)
        FROM service_requests
        WHERE visit_date = $1 AND category = $2 AND status = ANY($3)
        ",
    )
    .bind(date)
    .bind(category.as_str())
    .bind(labels)
    .fetch_one(executor)
    .await
    .map_err(database_error)?;

    u32::try_from(count).map_err(|e| decode_error("count", e))
}

fn slot_lock_key(guard: &CapacityGuard) -> String {
    format!("relief_desk:{}:{}", guard.visit_date, guard.category)
}

fn admitted_priorities(filter: QueueFilter) -> Vec<&'static str> {
    PRIORITIES
        .iter()
        .filter(|p| filter.min_priority.is_none_or(|floor| **p >= floor))
        .map(Priority::as_str)
        .collect()
}

fn row_to_request(row: &PgRow) -> Result<ServiceRequest, StoreError> {
    let id: Uuid = row.try_get("id").map_err(database_error)?;
    let requester_id: Uuid = row.try_get("requester_id").map_err(database_error)?;
    let category: String = row.try_get("category").map_err(database_error)?;
    let status: String = row.try_get("status").map_err(database_error)?;
    let priority: String = row.try_get("priority").map_err(database_error)?;
    let ticket_number: Option<String> = row.try_get("ticket_number").map_err(database_error)?;
    let ticket_code: Option<String> = row.try_get("ticket_code").map_err(database_error)?;
    let submitted_at: DateTime<Utc> = row.try_get("submitted_at").map_err(database_error)?;
    let ticket_issued_at: Option<DateTime<Utc>> =
        row.try_get("ticket_issued_at").map_err(database_error)?;

    Ok(ServiceRequest {
        id: RequestId::from_uuid(id),
        requester_id: RequesterId::from_uuid(requester_id),
        category: category.parse().map_err(|e| decode_error("category", e))?,
        status: status.parse().map_err(|e| decode_error("status", e))?,
        visit_date: row.try_get("visit_date").map_err(database_error)?,
        priority: priority.parse().map_err(|e| decode_error("priority", e))?,
        ticket_number: ticket_number.map(TicketNumber::from_string),
        ticket_code: ticket_code.map(TicketCode::from_string),
        submitted_at,
        ticket_issued_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_admitted_priorities() {
        assert_eq!(
            admitted_priorities(QueueFilter::all()),
            vec!["low", "medium", "high", "urgent"]
        );
        assert_eq!(
            admitted_priorities(QueueFilter::at_least(Priority::High)),
            vec!["high", "urgent"]
        );
    }

    #[test]
    fn test_slot_lock_key_is_per_slot() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let food = CapacityGuard {
            visit_date: date,
            category: Category::Food,
            limit: 5,
        };
        let general = CapacityGuard {
            category: Category::General,
            ..food
        };
        assert_eq!(slot_lock_key(&food), "relief_desk:2025-01-08:food");
        assert_ne!(slot_lock_key(&food), slot_lock_key(&general));
        assert_eq!(
            slot_lock_key(&food),
            slot_lock_key(&CapacityGuard { limit: 9, ..food })
        );
    }
}
