//! Capacity query endpoint.
//!
//! - GET /api/capacity/:date - operating status and per-category limits

use crate::state::AppState;
use crate::WebResult;
use axum::{
    extract::{Path, State},
    Json,
};
use relief_desk_core::{Category, DaySource, NaiveDate, RequestStatus};
use serde::Serialize;

/// Capacity of one category on the requested date.
#[derive(Debug, Serialize)]
pub struct CategoryCapacity {
    /// Category
    pub category: Category,
    /// Tickets the slot may hold
    pub limit: u32,
    /// Tickets already holding capacity
    pub issued: u32,
    /// `limit - issued`, never negative
    pub available: u32,
}

/// Response for `GET /api/capacity/:date`.
#[derive(Debug, Serialize)]
pub struct CapacityResponse {
    /// Requested date
    pub date: NaiveDate,
    /// Whether the service runs that day
    pub is_operating_day: bool,
    /// Weekday rule or administrator override
    pub source: DaySource,
    /// Per-category figures
    pub categories: Vec<CategoryCapacity>,
    /// Next operating day after `date`, if one is within the lookahead
    pub next_operating_day: Option<NaiveDate>,
}

/// Show what a release on `date` would be allowed to issue.
///
/// ```bash
/// curl http://localhost:8080/api/capacity/2025-01-08
/// ```
pub async fn get_capacity(
    Path(date): Path<NaiveDate>,
    State(state): State<AppState>,
) -> WebResult<Json<CapacityResponse>> {
    let registry = state.services.scheduler.registry();
    let capacity_store = state.env.capacity.as_ref();

    let day = registry.resolve_day(capacity_store, date).await?;

    let mut categories = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let limit = registry.resolve_limit(&day, category);
        let issued = state
            .env
            .requests
            .count_by_status(date, category, RequestStatus::HOLDING_CAPACITY)
            .await?;
        categories.push(CategoryCapacity {
            category,
            limit,
            issued,
            available: limit.saturating_sub(issued),
        });
    }

    let next_operating_day = registry
        .calendar()
        .next_operating_day(capacity_store, date)
        .await;

    Ok(Json(CapacityResponse {
        date,
        is_operating_day: day.is_operating_day,
        source: day.source,
        categories,
        next_operating_day,
    }))
}
