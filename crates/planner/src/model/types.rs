/// Records held by the entity store, in their wire shape
use super::refs;
use super::time::{ClockTime, IsoWeekday};
use super::Id;
use crate::store::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Ids are assigned by the store; an unassigned (zero) id is left out of request bodies.
fn is_unassigned(id: &Id) -> bool {
    *id == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
}

/// A course taught in a given semester, before it is split into sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    #[serde(rename = "course", with = "refs")]
    pub course_id: Id,
    #[serde(rename = "semester", with = "refs")]
    pub semester_id: Id,
}

/// The room reference embedded in a section read, carrying the room's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedRoom {
    pub id: Id,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    #[serde(rename = "offering", with = "refs")]
    pub offering_id: Id,
    pub code: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_room: Option<AssignedRoom>,
    #[serde(
        rename = "assigned_timeslot",
        default,
        with = "refs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_timeslot_id: Option<Id>,
}

impl Section {
    /// Capacity of the assigned room, when a room is assigned and its capacity is known.
    pub fn assigned_room_capacity(&self) -> Option<u32> {
        self.assigned_room.and_then(|room| room.capacity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    #[serde(rename = "student", with = "refs")]
    pub student_id: Id,
    #[serde(rename = "offering", with = "refs")]
    pub offering_id: Id,
    #[serde(rename = "section", with = "refs")]
    pub section_id: Id,
}

/// A recurring weekly window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslot {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    pub day_of_week: IsoWeekday,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub duration_minutes: u32,
}

impl Timeslot {
    /// A timeslot is usable only when it starts strictly before it ends.
    pub fn is_well_formed(&self) -> bool {
        self.start_time < self.end_time && self.duration_minutes > 0
    }
}

/// The three ids both projections of a logical schedule assignment share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub section_id: Id,
    pub timeslot_id: Id,
    pub semester_id: Id,
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "section {} / timeslot {} / semester {}",
            self.section_id, self.timeslot_id, self.semester_id
        )
    }
}

/// Room projection of a logical schedule assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSchedule {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    #[serde(rename = "room", with = "refs")]
    pub room_id: Id,
    #[serde(rename = "timeslot", with = "refs")]
    pub timeslot_id: Id,
    #[serde(rename = "section", with = "refs")]
    pub section_id: Id,
    #[serde(rename = "semester", with = "refs")]
    pub semester_id: Id,
}

impl RoomSchedule {
    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            section_id: self.section_id,
            timeslot_id: self.timeslot_id,
            semester_id: self.semester_id,
        }
    }
}

/// Teacher projection of a logical schedule assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherSchedule {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    #[serde(rename = "teacher", with = "refs")]
    pub teacher_id: Id,
    #[serde(rename = "timeslot", with = "refs")]
    pub timeslot_id: Id,
    #[serde(rename = "section", with = "refs")]
    pub section_id: Id,
    #[serde(rename = "semester", with = "refs")]
    pub semester_id: Id,
}

impl TeacherSchedule {
    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            section_id: self.section_id,
            timeslot_id: self.timeslot_id,
            semester_id: self.semester_id,
        }
    }
}

/// Kind of record a conflict points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictEntityType {
    Professor,
    Student,
}

impl ConflictEntityType {
    pub fn collection(self) -> Collection {
        match self {
            ConflictEntityType::Professor => Collection::Teachers,
            ConflictEntityType::Student => Collection::Students,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(default, skip_serializing_if = "is_unassigned")]
    pub id: Id,
    #[serde(rename = "type")]
    pub conflict_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<ConflictEntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Id>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

macro_rules! impl_record {
    ($($ty:ty => $collection:ident),+ $(,)?) => {
        $(
            impl Record for $ty {
                const COLLECTION: Collection = Collection::$collection;

                fn id(&self) -> Id {
                    self.id
                }
            }
        )+
    };
}

impl_record! {
    Room => Rooms,
    Teacher => Teachers,
    Student => Students,
    Semester => Semesters,
    Course => Courses,
    Offering => Offerings,
    Section => Sections,
    Enrollment => Enrollments,
    Timeslot => Timeslots,
    RoomSchedule => RoomSchedules,
    TeacherSchedule => TeacherSchedules,
    Conflict => Conflicts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_read_shape() {
        let section: Section = serde_json::from_value(json!({
            "id": 9,
            "code": "G1",
            "capacity": 25,
            "offering": {"id": 3},
            "assigned_room": {"id": 4, "capacity": 40},
            "assigned_timeslot": {"id": 2}
        }))
        .unwrap();

        assert_eq!(section.id, 9);
        assert_eq!(section.offering_id, 3);
        assert_eq!(section.assigned_room_capacity(), Some(40));
        assert_eq!(section.assigned_timeslot_id, Some(2));
    }

    #[test]
    fn test_section_without_assignments() {
        let section: Section = serde_json::from_value(json!({
            "id": 1,
            "code": "G2",
            "offering": {"id": 3},
            "assigned_timeslot": null
        }))
        .unwrap();

        assert_eq!(section.capacity, None);
        assert_eq!(section.assigned_room, None);
        assert_eq!(section.assigned_timeslot_id, None);
    }

    #[test]
    fn test_schedule_body_omits_unassigned_id() {
        let mut schedule = RoomSchedule {
            id: 0,
            room_id: 1,
            timeslot_id: 3,
            section_id: 4,
            semester_id: 5,
        };

        assert_eq!(
            serde_json::to_value(&schedule).unwrap(),
            json!({
                "room": {"id": 1},
                "timeslot": {"id": 3},
                "section": {"id": 4},
                "semester": {"id": 5}
            })
        );

        schedule.id = 12;
        assert_eq!(serde_json::to_value(&schedule).unwrap()["id"], 12);
    }

    #[test]
    fn test_conflict_wire_names() {
        let conflict: Conflict = serde_json::from_value(json!({
            "id": 2,
            "type": "Aula ocupada",
            "entity_type": "professor",
            "entity_id": 7,
            "description": "double booked"
        }))
        .unwrap();

        assert_eq!(conflict.conflict_type, "Aula ocupada");
        assert_eq!(conflict.entity_type, Some(ConflictEntityType::Professor));
        assert_eq!(
            ConflictEntityType::Student.collection(),
            Collection::Students
        );
    }

    #[test]
    fn test_timeslot_well_formed() {
        let slot: Timeslot = serde_json::from_value(json!({
            "id": 1,
            "day_of_week": 2,
            "start_time": "12:00",
            "end_time": "10:00",
            "duration_minutes": 120
        }))
        .unwrap();

        assert!(!slot.is_well_formed());
    }
}
