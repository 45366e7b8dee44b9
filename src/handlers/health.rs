use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let conn = state.conn()?;
    queries::ping(&conn)?;
    Ok(Json(json!({ "status": "ok" })))
}
