//! Endpoints for schedule assignments and their pending repairs.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::coordinator::{Assignment, AssignmentChanges};
use crate::error::PlannerError;
use crate::model::{Id, ScheduleKey};
use crate::server::state::PlannerState;
use crate::server::types::ApiErrorType;

fn assignment_error(e: PlannerError) -> Response {
    if e.needs_operator() {
        error!("Schedule assignment needs an operator: {}", e);
    } else {
        warn!("Schedule assignment request failed: {}", e);
    }
    ApiErrorType::from(e).into_response()
}

/// GET /assignments
/// Returns paired assignments, unpaired projections and pending repairs
pub async fn get_assignments(State(s): State<Arc<PlannerState>>) -> Response {
    info!("GET /assignments");

    match s.coordinator.list().await {
        Ok(ledger) => (StatusCode::OK, Json(ledger)).into_response(),
        Err(e) => assignment_error(e),
    }
}

/// POST /assignments
pub async fn post_assignment(
    State(s): State<Arc<PlannerState>>,
    Json(assignment): Json<Assignment>,
) -> Response {
    info!("POST /assignments ({})", assignment.key());

    match s.coordinator.create(assignment).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => assignment_error(e),
    }
}

/// PUT /assignments/:room_schedule_id
pub async fn put_assignment(
    Path(room_schedule_id): Path<Id>,
    State(s): State<Arc<PlannerState>>,
    Json(changes): Json<AssignmentChanges>,
) -> Response {
    info!("PUT /assignments/{}", room_schedule_id);

    match s.coordinator.update(room_schedule_id, changes).await {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => assignment_error(e),
    }
}

/// DELETE /assignments/:room_schedule_id
pub async fn delete_assignment(
    Path(room_schedule_id): Path<Id>,
    State(s): State<Arc<PlannerState>>,
) -> Response {
    info!("DELETE /assignments/{}", room_schedule_id);

    match s.coordinator.delete(room_schedule_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => assignment_error(e),
    }
}

/// GET /assignments/repairs
pub async fn get_repairs(State(s): State<Arc<PlannerState>>) -> Response {
    info!("GET /assignments/repairs");

    (StatusCode::OK, Json(s.coordinator.pending_repairs())).into_response()
}

/// POST /assignments/repairs/reconcile
pub async fn post_reconcile(
    State(s): State<Arc<PlannerState>>,
    Json(key): Json<ScheduleKey>,
) -> Response {
    info!("POST /assignments/repairs/reconcile ({})", key);

    match s.coordinator.reconcile(key).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => assignment_error(e),
    }
}

/// POST /assignments/repairs/abandon
pub async fn post_abandon(
    State(s): State<Arc<PlannerState>>,
    Json(key): Json<ScheduleKey>,
) -> Response {
    info!("POST /assignments/repairs/abandon ({})", key);

    match s.coordinator.abandon(key).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => assignment_error(e),
    }
}
