use crate::error::PlannerError;
use crate::model::{Id, RoomSchedule, ScheduleKey, TeacherSchedule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One logical schedule assignment: a section taught by a teacher in a room at a timeslot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub room_id: Id,
    pub teacher_id: Id,
    pub timeslot_id: Id,
    pub section_id: Id,
    pub semester_id: Id,
}

impl Assignment {
    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            section_id: self.section_id,
            timeslot_id: self.timeslot_id,
            semester_id: self.semester_id,
        }
    }

    /// Rejects unset ids before anything reaches the store.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let fields = [
            ("room_id", self.room_id),
            ("teacher_id", self.teacher_id),
            ("timeslot_id", self.timeslot_id),
            ("section_id", self.section_id),
            ("semester_id", self.semester_id),
        ];
        match fields.into_iter().find(|(_, id)| *id <= 0) {
            Some((field, id)) => Err(PlannerError::validation(
                field,
                format!("must be a positive id, got {id}"),
            )),
            None => Ok(()),
        }
    }

    pub fn room_schedule(&self) -> RoomSchedule {
        RoomSchedule {
            id: 0,
            room_id: self.room_id,
            timeslot_id: self.timeslot_id,
            section_id: self.section_id,
            semester_id: self.semester_id,
        }
    }

    pub fn teacher_schedule(&self) -> TeacherSchedule {
        TeacherSchedule {
            id: 0,
            teacher_id: self.teacher_id,
            timeslot_id: self.timeslot_id,
            section_id: self.section_id,
            semester_id: self.semester_id,
        }
    }

    /// Rebuilds the assignment from its two projections; the key is taken from the room half.
    pub fn from_pair(room: &RoomSchedule, teacher: &TeacherSchedule) -> Self {
        Self {
            room_id: room.room_id,
            teacher_id: teacher.teacher_id,
            timeslot_id: room.timeslot_id,
            section_id: room.section_id,
            semester_id: room.semester_id,
        }
    }

    pub fn apply(&self, changes: &AssignmentChanges) -> Self {
        Self {
            room_id: changes.room_id.unwrap_or(self.room_id),
            teacher_id: changes.teacher_id.unwrap_or(self.teacher_id),
            timeslot_id: changes.timeslot_id.unwrap_or(self.timeslot_id),
            section_id: changes.section_id.unwrap_or(self.section_id),
            semester_id: changes.semester_id.unwrap_or(self.semester_id),
        }
    }
}

/// Partial update of an assignment; unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChanges {
    #[serde(default)]
    pub room_id: Option<Id>,
    #[serde(default)]
    pub teacher_id: Option<Id>,
    #[serde(default)]
    pub timeslot_id: Option<Id>,
    #[serde(default)]
    pub section_id: Option<Id>,
    #[serde(default)]
    pub semester_id: Option<Id>,
}

/// Lifecycle of a logical assignment across its two writes.
///
/// `Pending -> Committed`, or `Pending -> Failed -> Reconciling -> Committed | Abandoned`.
/// Compensation that succeeds goes straight from `Failed` to `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    Pending,
    Committed,
    Failed,
    Reconciling,
    Abandoned,
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignmentState::Pending => "pending",
            AssignmentState::Committed => "committed",
            AssignmentState::Failed => "failed",
            AssignmentState::Reconciling => "reconciling",
            AssignmentState::Abandoned => "abandoned",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for PairOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PairOperation::Create => "create",
            PairOperation::Update => "update",
            PairOperation::Delete => "delete",
        })
    }
}

/// An assignment as seen by callers: both projection ids and the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleAssignment {
    pub room_schedule_id: Id,
    pub teacher_schedule_id: Id,
    #[serde(flatten)]
    pub assignment: Assignment,
    pub state: AssignmentState,
}

/// A half-applied operation waiting for `reconcile` or `abandon`.
///
/// The room projection is always written first, so the teacher projection is the
/// one that lags behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRepair {
    pub operation: PairOperation,
    /// Target of the operation
    pub assignment: Assignment,
    /// Assignment before an update, used to roll the room half back
    pub previous: Option<Assignment>,
    pub room_schedule_id: Option<Id>,
    pub teacher_schedule_id: Option<Id>,
    pub cause: String,
}

impl PendingRepair {
    pub fn key(&self) -> ScheduleKey {
        self.assignment.key()
    }
}

/// What to do when the second write fails after the first succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPolicy {
    /// Undo the first write
    #[default]
    Compensate,
    /// Keep the first write and register a pending repair
    Flag,
}

/// What to do when a room or teacher is already booked in the target timeslot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleBookingPolicy {
    #[default]
    Reject,
    /// Record a conflict and go ahead with the write
    RecordConflict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub repair_policy: RepairPolicy,
    pub double_booking: DoubleBookingPolicy,
    /// Default deadline for a whole create/update/delete sequence
    pub deadline: Option<Duration>,
}

/// Result of resolving a pending repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub key: ScheduleKey,
    pub state: AssignmentState,
    /// The surviving assignment; `None` when the operation ends with nothing stored
    pub assignment: Option<ScheduleAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BookedResource {
    Room(Id),
    Teacher(Id),
}

impl fmt::Display for BookedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookedResource::Room(id) => write!(f, "Room {id}"),
            BookedResource::Teacher(id) => write!(f, "Teacher {id}"),
        }
    }
}

/// An existing schedule that already holds the room or teacher at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleBooking {
    pub resource: BookedResource,
    pub timeslot_id: Id,
    pub semester_id: Id,
    pub existing_schedule_id: Id,
    pub existing_section_id: Id,
}

impl fmt::Display for DoubleBooking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is already booked in timeslot {} of semester {} by section {} (schedule {})",
            self.resource,
            self.timeslot_id,
            self.semester_id,
            self.existing_section_id,
            self.existing_schedule_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment() -> Assignment {
        Assignment {
            room_id: 1,
            teacher_id: 2,
            timeslot_id: 3,
            section_id: 4,
            semester_id: 5,
        }
    }

    #[test]
    fn test_projections_share_the_key() {
        let a = assignment();
        assert_eq!(a.room_schedule().key(), a.key());
        assert_eq!(a.teacher_schedule().key(), a.key());
        assert_eq!(
            Assignment::from_pair(&a.room_schedule(), &a.teacher_schedule()),
            a
        );
    }

    #[test]
    fn test_validate_names_the_bad_field() {
        let mut a = assignment();
        a.timeslot_id = 0;
        assert!(matches!(
            a.validate(),
            Err(PlannerError::Validation {
                field: "timeslot_id",
                ..
            })
        ));
        assert!(assignment().validate().is_ok());
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let moved = assignment().apply(&AssignmentChanges {
            room_id: Some(9),
            timeslot_id: Some(6),
            ..AssignmentChanges::default()
        });
        assert_eq!(moved.room_id, 9);
        assert_eq!(moved.timeslot_id, 6);
        assert_eq!(moved.teacher_id, 2);
        assert_eq!(assignment().apply(&AssignmentChanges::default()), assignment());
    }

    #[test]
    fn test_policies_parse_from_snake_case() {
        let policy: RepairPolicy = serde_json::from_str("\"flag\"").unwrap();
        assert_eq!(policy, RepairPolicy::Flag);
        let booking: DoubleBookingPolicy = serde_json::from_str("\"record_conflict\"").unwrap();
        assert_eq!(booking, DoubleBookingPolicy::RecordConflict);
        assert_eq!(RepairPolicy::default(), RepairPolicy::Compensate);
    }

    #[test]
    fn test_double_booking_display() {
        let booking = DoubleBooking {
            resource: BookedResource::Room(1),
            timeslot_id: 3,
            semester_id: 5,
            existing_schedule_id: 12,
            existing_section_id: 8,
        };
        assert_eq!(
            booking.to_string(),
            "Room 1 is already booked in timeslot 3 of semester 5 by section 8 (schedule 12)"
        );
    }
}
