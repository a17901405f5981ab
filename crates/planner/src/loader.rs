//! Page-level reads fanned out concurrently.

use crate::model::{Enrollment, Room, RoomSchedule, Section, Student, Timeslot};
use crate::store::{self, EntityStore, StoreError};
use std::time::Instant;
use tracing::debug;

/// Everything the availability and occupancy views read, fetched in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanningSnapshot {
    pub rooms: Vec<Room>,
    pub students: Vec<Student>,
    pub sections: Vec<Section>,
    pub enrollments: Vec<Enrollment>,
    pub timeslots: Vec<Timeslot>,
    pub room_schedules: Vec<RoomSchedule>,
}

impl PlanningSnapshot {
    /// Reads all collections concurrently. Any failed read fails the whole load.
    pub async fn load(store: &dyn EntityStore) -> Result<Self, StoreError> {
        let start = Instant::now();
        let (rooms, students, sections, enrollments, timeslots, room_schedules) = futures::try_join!(
            store::fetch_all::<Room>(store),
            store::fetch_all::<Student>(store),
            store::fetch_all::<Section>(store),
            store::fetch_all::<Enrollment>(store),
            store::fetch_all::<Timeslot>(store),
            store::fetch_all::<RoomSchedule>(store),
        )?;

        debug!(
            rooms = rooms.len(),
            sections = sections.len(),
            enrollments = enrollments.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded planning snapshot"
        );

        Ok(Self {
            rooms,
            students,
            sections,
            enrollments,
            timeslots,
            room_schedules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;
    use crate::testing::{FaultyStore, Operation};

    #[tokio::test]
    async fn test_load_reads_every_collection() {
        let store = FaultyStore::in_memory().unwrap();
        store::insert(
            store.inner(),
            &Room {
                id: 0,
                name: "A101".to_string(),
                capacity: Some(30),
                building: None,
            },
        )
        .await
        .unwrap();

        let snapshot = PlanningSnapshot::load(&store).await.unwrap();
        assert_eq!(snapshot.rooms.len(), 1);
        assert!(snapshot.sections.is_empty());
        for collection in [Collection::Enrollments, Collection::Timeslots] {
            assert_eq!(store.calls(collection, Operation::List), 1);
        }
    }

    #[tokio::test]
    async fn test_one_failed_read_fails_the_load() {
        let store = FaultyStore::in_memory().unwrap();
        store.fail_next(Collection::Enrollments, Operation::List);

        let err = PlanningSnapshot::load(&store).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
