use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::availability::load_snapshot;
use crate::error::PlannerError;
use crate::model::{Id, WeekInstant};
use crate::occupancy;
use crate::server::state::PlannerState;
use crate::server::types::ApiErrorType;
use crate::store::Collection;

/// Query parameters for occupancy endpoints.
#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    /// Local wall-clock instant to evaluate, e.g. `2024-05-07T11:00:00`; defaults to now
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

impl OccupancyQuery {
    fn instant(&self) -> WeekInstant {
        match self.at {
            Some(at) => WeekInstant::from(at),
            None => WeekInstant::from(&Local::now()),
        }
    }
}

/// GET /rooms/occupancy
/// Returns occupancy and the next schedule of every room
pub async fn get_room_board(
    State(s): State<Arc<PlannerState>>,
    Query(params): Query<OccupancyQuery>,
) -> Response {
    info!("GET /rooms/occupancy (at={:?})", params.at);

    let now = params.instant();
    match load_snapshot(&s).await {
        Ok(snapshot) => {
            let board = occupancy::room_board(
                &snapshot.rooms,
                &snapshot.room_schedules,
                &snapshot.timeslots,
                now,
            );
            (StatusCode::OK, Json(board)).into_response()
        }
        Err(response) => response,
    }
}

/// GET /rooms/:room_id/occupancy
/// Returns occupancy and the next schedule of one room
pub async fn get_room_occupancy(
    Path(room_id): Path<Id>,
    State(s): State<Arc<PlannerState>>,
    Query(params): Query<OccupancyQuery>,
) -> Response {
    info!("GET /rooms/{}/occupancy (at={:?})", room_id, params.at);

    let now = params.instant();
    let snapshot = match load_snapshot(&s).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    match snapshot.rooms.iter().find(|r| r.id == room_id) {
        Some(room) => {
            let status = occupancy::room_status(
                room,
                &snapshot.room_schedules,
                &snapshot.timeslots,
                now,
            );
            (StatusCode::OK, Json(status)).into_response()
        }
        None => ApiErrorType::from(PlannerError::NotFound {
            collection: Collection::Rooms,
            id: room_id,
        })
        .into_response(),
    }
}
