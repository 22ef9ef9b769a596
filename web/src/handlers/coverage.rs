//! Volunteer coverage endpoint.
//!
//! - GET /api/coverage?from=YYYY-MM-DD&to=YYYY-MM-DD

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use relief_desk_core::{CoverageGap, NaiveDate};
use serde::{Deserialize, Serialize};

/// Query string for the coverage report.
#[derive(Debug, Deserialize)]
pub struct CoverageQuery {
    /// First date, inclusive
    pub from: NaiveDate,
    /// Last date, inclusive
    pub to: NaiveDate,
}

/// Response for the coverage report.
#[derive(Debug, Serialize)]
pub struct CoverageResponse {
    /// First date, inclusive
    pub from: NaiveDate,
    /// Last date, inclusive
    pub to: NaiveDate,
    /// Ratio below which a date is reported
    pub threshold: f64,
    /// Under-staffed dates, in date order
    pub gaps: Vec<CoverageGap>,
}

/// Dates in the range whose volunteer coverage is below the threshold.
///
/// An inverted range is a `400`.
pub async fn get_coverage_gaps(
    Query(query): Query<CoverageQuery>,
    State(state): State<AppState>,
) -> Result<Json<CoverageResponse>, AppError> {
    if query.from > query.to {
        return Err(AppError::bad_request(format!(
            "from ({}) must not be after to ({})",
            query.from, query.to
        )));
    }

    let gaps = state
        .services
        .reporter
        .coverage_gaps(query.from, query.to)
        .await?;

    Ok(Json(CoverageResponse {
        from: query.from,
        to: query.to,
        threshold: state.services.config.coverage_threshold,
        gaps,
    }))
}
