//! Release trigger endpoint.
//!
//! - POST /api/releases - run a release batch for a date

use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use relief_desk_core::{Category, NaiveDate, Priority, QueueFilter, ReleaseOptions, ReleaseResult};
use serde::Deserialize;
use std::time::Duration;

/// Body of `POST /api/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRequest {
    /// Visit date to release tickets for
    pub date: NaiveDate,
    /// Categories to release; empty or absent means all
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Only ticket requests at or above this priority
    pub min_priority: Option<Priority>,
    /// Batch deadline in milliseconds; `0` disables it, absent uses the configured one
    pub timeout_ms: Option<u64>,
}

impl ReleaseRequest {
    fn options(&self, configured: ReleaseOptions) -> ReleaseOptions {
        let options = match self.timeout_ms {
            None => configured,
            Some(0) => ReleaseOptions::default(),
            Some(ms) => ReleaseOptions::default().with_timeout(Duration::from_millis(ms)),
        };
        match self.min_priority {
            Some(priority) => options.with_filter(QueueFilter::at_least(priority)),
            None => options,
        }
    }
}

/// Run a release batch.
///
/// Responds with the full [`ReleaseResult`]; per-request failures are part of
/// a successful response. A closed day is `422 INVALID_RELEASE_DAY`.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/releases \
///   -H 'Content-Type: application/json' \
///   -d '{"date":"2025-01-08","categories":["food"]}'
/// ```
pub async fn trigger_release(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    Json(request): Json<ReleaseRequest>,
) -> Result<Json<ReleaseResult>, AppError> {
    tracing::info!(
        %correlation_id,
        date = %request.date,
        categories = ?request.categories,
        min_priority = ?request.min_priority,
        "Release requested"
    );

    let options = request.options(state.services.release_options());
    let result = state
        .services
        .scheduler
        .release(request.date, &request.categories, options)
        .await?;

    Ok(Json(result))
}
