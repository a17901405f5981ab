use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::availability;
use crate::error::PlannerError;
use crate::loader::PlanningSnapshot;
use crate::model::Id;
use crate::server::state::PlannerState;
use crate::server::types::ApiErrorType;

pub(super) async fn load_snapshot(s: &PlannerState) -> Result<PlanningSnapshot, Response> {
    PlanningSnapshot::load(s.store.as_ref()).await.map_err(|e| {
        error!("Failed to load planning snapshot: {}", e);
        ApiErrorType::from(PlannerError::from(e)).into_response()
    })
}

/// GET /sections/:section_id/remaining_seats
/// Returns the remaining seats of one section; unknown sections have no capacity
pub async fn get_remaining_seats(
    Path(section_id): Path<Id>,
    State(s): State<Arc<PlannerState>>,
) -> Response {
    info!("GET /sections/{}/remaining_seats", section_id);

    match load_snapshot(&s).await {
        Ok(snapshot) => {
            let remaining = availability::remaining_seats_by_id(
                section_id,
                &snapshot.sections,
                &snapshot.enrollments,
            );
            (
                StatusCode::OK,
                Json(json!({
                    "section_id": section_id,
                    "remaining_seats": remaining,
                })),
            )
                .into_response()
        }
        Err(response) => response,
    }
}

/// GET /offerings/:offering_id/selectable_sections
/// Returns the offering's sections that still have free seats
pub async fn get_selectable_sections(
    Path(offering_id): Path<Id>,
    State(s): State<Arc<PlannerState>>,
) -> Response {
    info!("GET /offerings/{}/selectable_sections", offering_id);

    match load_snapshot(&s).await {
        Ok(snapshot) => {
            let sections = availability::selectable_sections(
                offering_id,
                &snapshot.sections,
                &snapshot.enrollments,
            );
            (StatusCode::OK, Json(sections)).into_response()
        }
        Err(response) => response,
    }
}

/// GET /offerings/:offering_id/eligible_students
/// Returns students not yet enrolled in the offering
pub async fn get_eligible_students(
    Path(offering_id): Path<Id>,
    State(s): State<Arc<PlannerState>>,
) -> Response {
    info!("GET /offerings/{}/eligible_students", offering_id);

    match load_snapshot(&s).await {
        Ok(snapshot) => {
            let students = availability::eligible_students(
                offering_id,
                &snapshot.students,
                &snapshot.enrollments,
            );
            (StatusCode::OK, Json(students)).into_response()
        }
        Err(response) => response,
    }
}
