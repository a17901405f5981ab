use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::server::endpoints::{assignments, availability, conflicts, occupancy, status};

mod endpoints;
mod state;
mod types;

pub use state::PlannerState;
pub use types::ApiErrorType;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<PlannerState>) -> Router {
    let availability_router = Router::new()
        .route(
            "/sections/:section_id/remaining_seats",
            get(availability::get_remaining_seats),
        )
        .route(
            "/offerings/:offering_id/selectable_sections",
            get(availability::get_selectable_sections),
        )
        .route(
            "/offerings/:offering_id/eligible_students",
            get(availability::get_eligible_students),
        );

    let occupancy_router = Router::new()
        .route("/rooms/occupancy", get(occupancy::get_room_board))
        .route("/rooms/:room_id/occupancy", get(occupancy::get_room_occupancy));

    // Repair routes are static, so they win over `/assignments/:room_schedule_id`.
    let assignment_router = Router::new()
        .route(
            "/assignments",
            get(assignments::get_assignments).post(assignments::post_assignment),
        )
        .route("/assignments/repairs", get(assignments::get_repairs))
        .route(
            "/assignments/repairs/reconcile",
            post(assignments::post_reconcile),
        )
        .route(
            "/assignments/repairs/abandon",
            post(assignments::post_abandon),
        )
        .route(
            "/assignments/:room_schedule_id",
            put(assignments::put_assignment).delete(assignments::delete_assignment),
        );

    Router::new()
        .route("/health", get(status::get_health))
        .route(
            "/conflicts",
            get(conflicts::get_conflicts).post(conflicts::post_conflict),
        )
        .merge(availability_router)
        .merge(occupancy_router)
        .merge(assignment_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::model::{
        ClockTime, Enrollment, IsoWeekday, Room, RoomSchedule, Section, Teacher, Timeslot,
    };
    use crate::store::{self, SqliteEntityStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> (Arc<SqliteEntityStore>, Arc<PlannerState>) {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let state = Arc::new(PlannerState::new(
            store.clone(),
            CoordinatorConfig::default(),
        ));
        (store, state)
    }

    async fn call(
        state: &Arc<PlannerState>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (_, state) = state();
        let (status, body) = call(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pending_repairs"], 0);
    }

    #[tokio::test]
    async fn test_remaining_seats_and_selectable_sections() {
        let (store, state) = state();
        let section = store::insert(
            store.as_ref(),
            &Section {
                id: 0,
                offering_id: 9,
                code: "G1".to_string(),
                capacity: Some(2),
                assigned_room: None,
                assigned_timeslot_id: None,
            },
        )
        .await
        .unwrap();
        store::insert(
            store.as_ref(),
            &Enrollment {
                id: 0,
                student_id: 1,
                offering_id: 9,
                section_id: section.id,
            },
        )
        .await
        .unwrap();

        let uri = format!("/sections/{}/remaining_seats", section.id);
        let (status, body) = call(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remaining_seats"], 1);

        let (status, body) =
            call(&state, Method::GET, "/offerings/9/selectable_sections", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["section"]["code"], "G1");
        assert_eq!(body[0]["remaining_seats"], 1);
    }

    #[tokio::test]
    async fn test_room_occupancy_at_instant() {
        let (store, state) = state();
        let room = store::insert(
            store.as_ref(),
            &Room {
                id: 0,
                name: "A101".to_string(),
                capacity: Some(30),
                building: None,
            },
        )
        .await
        .unwrap();
        let slot = store::insert(
            store.as_ref(),
            &Timeslot {
                id: 0,
                day_of_week: IsoWeekday::TUESDAY,
                start_time: ClockTime::from_hm(10, 0).unwrap(),
                end_time: ClockTime::from_hm(12, 0).unwrap(),
                duration_minutes: 120,
            },
        )
        .await
        .unwrap();
        store::insert(
            store.as_ref(),
            &RoomSchedule {
                id: 0,
                room_id: room.id,
                timeslot_id: slot.id,
                section_id: 4,
                semester_id: 5,
            },
        )
        .await
        .unwrap();

        // 2024-05-07 is a Tuesday.
        let uri = format!("/rooms/{}/occupancy?at=2024-05-07T11:00:00", room.id);
        let (status, body) = call(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["occupied"], true);

        let (_, body) = call(
            &state,
            Method::GET,
            "/rooms/occupancy?at=2024-05-07T13:00:00",
            None,
        )
        .await;
        assert_eq!(body[0]["occupied"], false);

        let (status, body) = call(&state, Method::GET, "/rooms/999/occupancy", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_assignment_lifecycle() {
        let (_, state) = state();
        let payload = json!({
            "room_id": 1,
            "teacher_id": 2,
            "timeslot_id": 3,
            "section_id": 4,
            "semester_id": 5
        });

        let (status, created) =
            call(&state, Method::POST, "/assignments", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["state"], "committed");

        let (status, body) = call(&state, Method::POST, "/assignments", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("already exists"));

        let uri = format!("/assignments/{}", created["room_schedule_id"]);
        let (status, updated) =
            call(&state, Method::PUT, &uri, Some(json!({"timeslot_id": 6}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["timeslot_id"], 6);

        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, ledger) = call(&state, Method::GET, "/assignments", None).await;
        assert_eq!(ledger["assignments"], json!([]));
        assert_eq!(ledger["issues"], json!([]));
    }

    #[tokio::test]
    async fn test_reconcile_unknown_key_is_bad_request() {
        let (_, state) = state();
        let (status, body) = call(
            &state,
            Method::POST,
            "/assignments/repairs/reconcile",
            Some(json!({"section_id": 4, "timeslot_id": 3, "semester_id": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");

        let (status, body) = call(&state, Method::GET, "/assignments/repairs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_conflicts_round_trip() {
        let (store, state) = state();
        let teacher = store::insert(
            store.as_ref(),
            &Teacher {
                id: 0,
                name: "Marta Ruiz".to_string(),
                email: None,
            },
        )
        .await
        .unwrap();

        let (status, _) = call(
            &state,
            Method::POST,
            "/conflicts",
            Some(json!({
                "type": "Aula ocupada",
                "entity_type": "professor",
                "entity_id": teacher.id,
                "description": "Room taken on Tuesday"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &state,
            Method::POST,
            "/conflicts",
            Some(json!({"type": "", "description": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, body) = call(
            &state,
            Method::GET,
            "/conflicts?entity_type=professor",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["entity_name"], "Marta Ruiz");
    }
}
