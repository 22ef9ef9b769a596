//! Axum admin API for the Relief Desk release engine.
//!
//! A thin HTTP shell over [`relief_desk_core::ReleaseServices`]: staff
//! trigger releases and read the queue dashboards, everything else happens in
//! the core.
//!
//! # Endpoints
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET` | `/health` | liveness |
//! | `POST` | `/api/releases` | run a release batch |
//! | `GET` | `/api/capacity/:date` | operating status and limits |
//! | `GET` | `/api/queue/:date/:category` | slot status |
//! | `GET` | `/api/queue/:date/:category/wait?position=N` | wait estimate |
//! | `GET` | `/api/coverage?from=&to=` | volunteer coverage gaps |
//!
//! Errors are JSON `{"code": "...", "message": "..."}` (see [`AppError`]).

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use config::Config;
pub use error::AppError;
pub use middleware::{correlation_id_layer, CorrelationId, CORRELATION_ID_HEADER};
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
