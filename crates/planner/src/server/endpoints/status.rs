use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::server::state::PlannerState;

/// GET /health
/// Reports liveness and how many repairs are waiting for an operator
pub async fn get_health(State(s): State<Arc<PlannerState>>) -> Response {
    info!("GET /health");

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "pending_repairs": s.coordinator.pending_repairs().len(),
        })),
    )
        .into_response()
}
