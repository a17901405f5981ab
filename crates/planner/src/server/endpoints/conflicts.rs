use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::conflicts::{ConflictFilter, NewConflict};
use crate::server::state::PlannerState;
use crate::server::types::ApiErrorType;

/// GET /conflicts
///
/// Query parameters (all optional):
/// - `type`: exact conflict type
/// - `entity_type`: `professor` or `student`
/// - `entity_id`
pub async fn get_conflicts(
    State(s): State<Arc<PlannerState>>,
    Query(filter): Query<ConflictFilter>,
) -> Response {
    info!("GET /conflicts ({:?})", filter);

    match s.conflicts.list(&filter).await {
        Ok(conflicts) => (StatusCode::OK, Json(conflicts)).into_response(),
        Err(e) => {
            error!("Failed to list conflicts: {}", e);
            ApiErrorType::from(e).into_response()
        }
    }
}

/// POST /conflicts
pub async fn post_conflict(
    State(s): State<Arc<PlannerState>>,
    Json(conflict): Json<NewConflict>,
) -> Response {
    info!("POST /conflicts (type={})", conflict.conflict_type);

    match s.conflicts.create(conflict).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => ApiErrorType::from(e).into_response(),
    }
}
