//! Read-only view over the volunteer rota.

use crate::{database_error, decode_error};
use chrono::NaiveDate;
use relief_desk_core::{BoxFuture, StaffingDay, StaffingStore, StoreError};
use sqlx::{PgPool, Row};

/// `PostgreSQL`-backed [`StaffingStore`].
///
/// Sums `volunteer_shifts` per date; the table itself is maintained by the
/// staffing system.
#[derive(Clone, Debug)]
pub struct PostgresStaffingStore {
    pool: PgPool,
}

impl PostgresStaffingStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<StaffingDay>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT shift_date,
                   COALESCE(SUM(required_volunteers), 0)::BIGINT AS required,
                   COALESCE(SUM(assigned_volunteers), 0)::BIGINT AS assigned
            FROM volunteer_shifts
            WHERE shift_date BETWEEN $1 AND $2
            GROUP BY shift_date
            ORDER BY shift_date ASC
            ",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter()
            .map(|row| {
                let required: i64 = row.try_get("required").map_err(database_error)?;
                let assigned: i64 = row.try_get("assigned").map_err(database_error)?;
                Ok(StaffingDay {
                    date: row.try_get("shift_date").map_err(database_error)?,
                    required_volunteers: u32::try_from(required)
                        .map_err(|e| decode_error("required_volunteers", e))?,
                    assigned_volunteers: u32::try_from(assigned)
                        .map_err(|e| decode_error("assigned_volunteers", e))?,
                })
            })
            .collect()
    }
}

impl StaffingStore for PostgresStaffingStore {
    fn load_staffing(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<StaffingDay>, StoreError>> {
        Box::pin(self.fetch(from, to))
    }
}
