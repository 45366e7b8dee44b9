use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::Caller;
use crate::errors::AppError;
use crate::services::booking::{self, AvailabilityMap, AvailabilityQuery};
use crate::state::AppState;

// GET /courts/:id/availability?date_start=YYYY-MM-DD&date_end=YYYY-MM-DD
pub async fn court_availability(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(court_id): Path<i64>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<AvailabilityMap>, AppError> {
    let Query(query) = query
        .map_err(|e| AppError::Validation(format!("invalid query string: {}", e.body_text())))?;

    let slots = booking::court_availability(&state, &caller, court_id, query).await?;
    Ok(Json(slots))
}
