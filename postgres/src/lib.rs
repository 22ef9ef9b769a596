//! `PostgreSQL` storage for the Relief Desk release engine.
//!
//! Implements the store traits from `relief-desk-core` on top of a shared
//! sqlx [`PgPool`]:
//!
//! - [`PostgresRequestStore`]: service requests, including the guarded
//!   `Approved → TicketIssued` write used by the ticket issuer
//! - [`PostgresCapacityStore`]: per-date capacity rows (`capacity_days`)
//! - [`PostgresStaffingStore`]: read-only view over the volunteer rota
//!
//! Schema lives in `migrations/` and is applied with [`migrate`].
//!
//! # Example
//!
//! ```ignore
//! use relief_desk_postgres::{connect, migrate, PostgresRequestStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/relief_desk", 10).await?;
//!     migrate(&pool).await?;
//!     let requests = PostgresRequestStore::from_pool(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod capacity;
mod requests;
mod staffing;

pub use capacity::PostgresCapacityStore;
pub use requests::PostgresRequestStore;
pub use staffing::PostgresStaffingStore;

use relief_desk_core::StoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the database is unreachable.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(database_error)
}

/// Apply the bundled migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
}

pub(crate) fn database_error(error: sqlx::Error) -> StoreError {
    StoreError::Database(error.to_string())
}

/// Whether `error` is a unique violation of the named constraint or index.
pub(crate) fn violates(error: &sqlx::Error, constraint: &str) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

pub(crate) fn decode_error(field: &str, error: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(format!("{field}: {error}"))
}
