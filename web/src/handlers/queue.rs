//! Queue status endpoints.
//!
//! - GET /api/queue/:date/:category - depth, capacity and overbooking for a slot
//! - GET /api/queue/:date/:category/wait?position=N - wait estimate for a position

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use relief_desk_core::{Category, NaiveDate, SlotStatus};
use serde::{Deserialize, Serialize};

/// Query string for the wait estimate.
#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    /// Zero-based position in the queue
    pub position: u32,
}

/// Response for the wait estimate.
#[derive(Debug, Serialize)]
pub struct WaitResponse {
    /// Visit date
    pub date: NaiveDate,
    /// Category
    pub category: Category,
    /// Queried position
    pub position: u32,
    /// Estimated wait in minutes
    pub estimated_wait_minutes: i64,
}

/// Dashboard figures for one slot.
///
/// ```bash
/// curl http://localhost:8080/api/queue/2025-01-08/food
/// ```
pub async fn get_slot_status(
    Path((date, category)): Path<(NaiveDate, Category)>,
    State(state): State<AppState>,
) -> Result<Json<SlotStatus>, AppError> {
    let status = state.services.reporter.slot_status(date, category).await?;
    Ok(Json(status))
}

/// Estimated wait for someone at `position`.
///
/// ```bash
/// curl 'http://localhost:8080/api/queue/2025-01-08/food/wait?position=4'
/// # {"date":"2025-01-08","category":"food","position":4,"estimated_wait_minutes":60}
/// ```
#[allow(clippy::unused_async)]
pub async fn get_estimated_wait(
    Path((date, category)): Path<(NaiveDate, Category)>,
    Query(query): Query<WaitQuery>,
    State(state): State<AppState>,
) -> Json<WaitResponse> {
    let wait = state.services.reporter.estimated_wait(query.position);
    Json(WaitResponse {
        date,
        category,
        position: query.position,
        estimated_wait_minutes: wait.num_minutes(),
    })
}
