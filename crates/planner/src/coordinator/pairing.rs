/// Matching room and teacher projections by schedule key
use super::types::{Assignment, BookedResource, DoubleBooking};
use crate::model::{Id, RoomSchedule, ScheduleKey, TeacherSchedule};
use serde::Serialize;
use std::collections::BTreeMap;

/// A store state that breaks the one-room-half, one-teacher-half rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    UnpairedRoom {
        key: ScheduleKey,
        room_schedule_id: Id,
    },
    UnpairedTeacher {
        key: ScheduleKey,
        teacher_schedule_id: Id,
    },
    DuplicateKey {
        key: ScheduleKey,
        room_schedule_ids: Vec<Id>,
        teacher_schedule_ids: Vec<Id>,
    },
}

impl ConsistencyIssue {
    pub fn key(&self) -> ScheduleKey {
        match self {
            ConsistencyIssue::UnpairedRoom { key, .. }
            | ConsistencyIssue::UnpairedTeacher { key, .. }
            | ConsistencyIssue::DuplicateKey { key, .. } => *key,
        }
    }
}

#[derive(Debug, Default)]
pub struct Pairing<'a> {
    /// Ordered by schedule key
    pub pairs: Vec<(&'a RoomSchedule, &'a TeacherSchedule)>,
    pub issues: Vec<ConsistencyIssue>,
}

pub fn pair_projections<'a>(
    rooms: &'a [RoomSchedule],
    teachers: &'a [TeacherSchedule],
) -> Pairing<'a> {
    let mut by_key: BTreeMap<ScheduleKey, (Vec<&'a RoomSchedule>, Vec<&'a TeacherSchedule>)> =
        BTreeMap::new();
    for room in rooms {
        by_key.entry(room.key()).or_default().0.push(room);
    }
    for teacher in teachers {
        by_key.entry(teacher.key()).or_default().1.push(teacher);
    }

    let mut pairing = Pairing::default();
    for (key, (rooms, teachers)) in by_key {
        match (rooms.as_slice(), teachers.as_slice()) {
            ([room], [teacher]) => pairing.pairs.push((room, teacher)),
            ([room], []) => pairing.issues.push(ConsistencyIssue::UnpairedRoom {
                key,
                room_schedule_id: room.id,
            }),
            ([], [teacher]) => pairing.issues.push(ConsistencyIssue::UnpairedTeacher {
                key,
                teacher_schedule_id: teacher.id,
            }),
            _ => pairing.issues.push(ConsistencyIssue::DuplicateKey {
                key,
                room_schedule_ids: rooms.iter().map(|r| r.id).collect(),
                teacher_schedule_ids: teachers.iter().map(|t| t.id).collect(),
            }),
        }
    }
    pairing
}

/// Teacher halves sharing the room half's key.
pub fn teacher_halves<'a>(
    room: &RoomSchedule,
    teachers: &'a [TeacherSchedule],
) -> Vec<&'a TeacherSchedule> {
    teachers.iter().filter(|t| t.key() == room.key()).collect()
}

/// Existing schedules holding the assignment's room or teacher in its timeslot and semester.
///
/// `exclude` names the `(room_schedule_id, teacher_schedule_id)` of the assignment
/// being updated so it does not clash with itself.
pub fn find_double_bookings(
    assignment: &Assignment,
    rooms: &[RoomSchedule],
    teachers: &[TeacherSchedule],
    exclude: Option<(Id, Id)>,
) -> Vec<DoubleBooking> {
    let (skip_room, skip_teacher) = exclude.unwrap_or_default();

    let room_clashes = rooms
        .iter()
        .filter(|r| r.id != skip_room)
        .filter(|r| {
            r.room_id == assignment.room_id
                && r.timeslot_id == assignment.timeslot_id
                && r.semester_id == assignment.semester_id
        })
        .map(|r| DoubleBooking {
            resource: BookedResource::Room(r.room_id),
            timeslot_id: r.timeslot_id,
            semester_id: r.semester_id,
            existing_schedule_id: r.id,
            existing_section_id: r.section_id,
        });

    let teacher_clashes = teachers
        .iter()
        .filter(|t| t.id != skip_teacher)
        .filter(|t| {
            t.teacher_id == assignment.teacher_id
                && t.timeslot_id == assignment.timeslot_id
                && t.semester_id == assignment.semester_id
        })
        .map(|t| DoubleBooking {
            resource: BookedResource::Teacher(t.teacher_id),
            timeslot_id: t.timeslot_id,
            semester_id: t.semester_id,
            existing_schedule_id: t.id,
            existing_section_id: t.section_id,
        });

    room_clashes.chain(teacher_clashes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: Id, room_id: Id, section_id: Id) -> RoomSchedule {
        RoomSchedule {
            id,
            room_id,
            timeslot_id: 3,
            section_id,
            semester_id: 5,
        }
    }

    fn teacher(id: Id, teacher_id: Id, section_id: Id) -> TeacherSchedule {
        TeacherSchedule {
            id,
            teacher_id,
            timeslot_id: 3,
            section_id,
            semester_id: 5,
        }
    }

    #[test]
    fn test_pairs_by_key_not_by_id() {
        let rooms = vec![room(1, 10, 4), room(2, 11, 6)];
        let teachers = vec![teacher(7, 20, 6), teacher(8, 21, 4)];

        let pairing = pair_projections(&rooms, &teachers);
        assert!(pairing.issues.is_empty());
        let ids: Vec<(Id, Id)> = pairing.pairs.iter().map(|(r, t)| (r.id, t.id)).collect();
        assert_eq!(ids, vec![(1, 8), (2, 7)]);
    }

    #[test]
    fn test_reports_orphans_and_duplicates() {
        let rooms = vec![room(1, 10, 4), room(2, 10, 6), room(3, 12, 6)];
        let teachers = vec![teacher(7, 20, 6), teacher(8, 21, 9)];

        let pairing = pair_projections(&rooms, &teachers);
        assert!(pairing.pairs.is_empty());
        assert_eq!(pairing.issues.len(), 3);
        assert!(matches!(
            pairing.issues[0],
            ConsistencyIssue::UnpairedRoom {
                room_schedule_id: 1,
                ..
            }
        ));
        assert!(matches!(
            &pairing.issues[1],
            ConsistencyIssue::DuplicateKey { room_schedule_ids, .. } if room_schedule_ids == &vec![2, 3]
        ));
        assert!(matches!(
            pairing.issues[2],
            ConsistencyIssue::UnpairedTeacher {
                teacher_schedule_id: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_double_bookings_skip_the_updated_pair() {
        let rooms = vec![room(1, 10, 4)];
        let teachers = vec![teacher(7, 20, 4)];
        let moved = Assignment {
            room_id: 10,
            teacher_id: 20,
            timeslot_id: 3,
            section_id: 4,
            semester_id: 5,
        };

        assert_eq!(find_double_bookings(&moved, &rooms, &teachers, None).len(), 2);
        assert!(find_double_bookings(&moved, &rooms, &teachers, Some((1, 7))).is_empty());

        let other_term = Assignment {
            semester_id: 6,
            ..moved
        };
        assert!(find_double_bookings(&other_term, &rooms, &teachers, None).is_empty());
    }
}
