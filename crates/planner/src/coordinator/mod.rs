//! Dual-schedule coordinator.
//!
//! A schedule assignment is stored twice: once as a [`RoomSchedule`] and once as a
//! [`TeacherSchedule`], paired by their [`ScheduleKey`]. The store offers no
//! transactions across collections, so every create/update/delete runs as a small
//! saga: room half first, teacher half second, and an explicit state machine for
//! what happens when only the first write lands.

mod pairing;
mod types;

pub use pairing::{find_double_bookings, pair_projections, ConsistencyIssue, Pairing};
pub use types::{
    Assignment, AssignmentChanges, AssignmentState, BookedResource, CoordinatorConfig,
    DoubleBooking, DoubleBookingPolicy, PairOperation, PendingRepair, RepairOutcome,
    RepairPolicy, ScheduleAssignment,
};

use crate::conflicts::{ConflictRecorder, NewConflict};
use crate::error::{ConsistencyError, PlannerError};
use crate::model::{ConflictEntityType, Id, RoomSchedule, ScheduleKey, Teacher, TeacherSchedule};
use crate::store::{self, SharedStore, StoreError};
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Paired assignments plus everything in the store that does not pair up.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentLedger {
    pub assignments: Vec<ScheduleAssignment>,
    pub issues: Vec<ConsistencyIssue>,
    pub pending: Vec<PendingRepair>,
}

/// Owns every write to the two schedule projections.
///
/// Writes are serialized by an internal lock that spans the read-check-write
/// sequence. Other writers to the same store are not coordinated with.
pub struct ScheduleCoordinator {
    store: SharedStore,
    config: CoordinatorConfig,
    conflicts: ConflictRecorder,
    write_lock: Mutex<()>,
    repairs: DashMap<ScheduleKey, PendingRepair>,
}

impl ScheduleCoordinator {
    pub fn new(store: SharedStore, config: CoordinatorConfig) -> Self {
        Self {
            conflicts: ConflictRecorder::new(store.clone()),
            store,
            config,
            write_lock: Mutex::new(()),
            repairs: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn default_deadline(&self) -> Option<Instant> {
        self.config.deadline.map(|d| Instant::now() + d)
    }

    pub async fn create(&self, assignment: Assignment) -> Result<ScheduleAssignment, PlannerError> {
        self.create_within(assignment, self.default_deadline()).await
    }

    /// Writes both projections of a new assignment.
    ///
    /// # Arguments
    /// * `assignment` - The assignment to store
    /// * `deadline` - Covers the whole sequence. Once it passes no further write starts.
    ///
    /// # Returns
    /// * `Ok(ScheduleAssignment)` - Both halves were written
    /// * `Err(PlannerError::Consistency)` - Only the room half was written; the error
    ///   says whether it was rolled back or left for `reconcile`
    pub async fn create_within(
        &self,
        assignment: Assignment,
        deadline: Option<Instant>,
    ) -> Result<ScheduleAssignment, PlannerError> {
        assignment.validate()?;
        let key = assignment.key();
        let correlation_id = generate_correlation_id();
        let start = std::time::Instant::now();
        info!(
            correlation_id = %correlation_id,
            key = %key,
            "Creating schedule assignment"
        );

        let _guard = self.write_lock.lock().await;
        self.ensure_no_pending_repair(key)?;

        let (rooms, teachers) = within(deadline, "schedule read", self.load_schedules()).await?;
        if rooms.iter().any(|r| r.key() == key) || teachers.iter().any(|t| t.key() == key) {
            return Err(PlannerError::validation(
                "section_id",
                format!("an assignment for {key} already exists"),
            ));
        }
        let clashes =
            self.check_double_booking(&correlation_id, &assignment, &rooms, &teachers, None)?;

        let store = self.store.as_ref();
        transition(&correlation_id, key, None, AssignmentState::Pending);
        let written = within(
            deadline,
            "room schedule write",
            store::insert(store, &assignment.room_schedule()),
        )
        .await;
        let room = match written {
            Ok(room) => room,
            Err(e) => {
                return Err(self
                    .first_write_failed(
                        &correlation_id,
                        PendingRepair {
                            operation: PairOperation::Create,
                            assignment,
                            previous: None,
                            room_schedule_id: None,
                            teacher_schedule_id: None,
                            cause: e.to_string(),
                        },
                        e,
                    )
                    .await)
            }
        };

        let teacher = within(
            deadline,
            "teacher schedule write",
            store::insert(store, &assignment.teacher_schedule()),
        )
        .await;

        match teacher {
            Ok(teacher) => {
                transition(
                    &correlation_id,
                    key,
                    Some(AssignmentState::Pending),
                    AssignmentState::Committed,
                );
                info!(
                    correlation_id = %correlation_id,
                    room_schedule_id = room.id,
                    teacher_schedule_id = teacher.id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Schedule assignment committed"
                );
                self.record_double_bookings(&correlation_id, &assignment, &clashes)
                    .await;
                Ok(committed(room.id, teacher.id, assignment))
            }
            Err(e) => Err(self
                .settle(
                    &correlation_id,
                    PendingRepair {
                        operation: PairOperation::Create,
                        assignment,
                        previous: None,
                        room_schedule_id: Some(room.id),
                        teacher_schedule_id: None,
                        cause: e.to_string(),
                    },
                )
                .await),
        }
    }

    pub async fn update(
        &self,
        room_schedule_id: Id,
        changes: AssignmentChanges,
    ) -> Result<ScheduleAssignment, PlannerError> {
        self.update_within(room_schedule_id, changes, self.default_deadline())
            .await
    }

    /// Applies `changes` to the assignment whose room half is `room_schedule_id`.
    ///
    /// Both halves end with the same schedule key, or a consistency error is returned.
    pub async fn update_within(
        &self,
        room_schedule_id: Id,
        changes: AssignmentChanges,
        deadline: Option<Instant>,
    ) -> Result<ScheduleAssignment, PlannerError> {
        let correlation_id = generate_correlation_id();
        let start = std::time::Instant::now();
        info!(
            correlation_id = %correlation_id,
            room_schedule_id,
            "Updating schedule assignment"
        );

        let _guard = self.write_lock.lock().await;
        let (rooms, teachers) = within(deadline, "schedule read", self.load_schedules()).await?;
        let (room, teacher) = resolve_pair(room_schedule_id, &rooms, &teachers)?;
        let current = Assignment::from_pair(room, teacher);
        self.ensure_no_pending_repair(current.key())?;

        let target = current.apply(&changes);
        target.validate()?;
        if target == current {
            debug!(correlation_id = %correlation_id, "Update changes nothing");
            return Ok(committed(room.id, teacher.id, current));
        }

        let key = target.key();
        if key != current.key() {
            self.ensure_no_pending_repair(key)?;
            let taken = rooms.iter().any(|r| r.id != room.id && r.key() == key)
                || teachers.iter().any(|t| t.id != teacher.id && t.key() == key);
            if taken {
                return Err(PlannerError::validation(
                    "section_id",
                    format!("an assignment for {key} already exists"),
                ));
            }
        }
        let clashes = self.check_double_booking(
            &correlation_id,
            &target,
            &rooms,
            &teachers,
            Some((room.id, teacher.id)),
        )?;

        let store = self.store.as_ref();
        transition(&correlation_id, key, None, AssignmentState::Pending);
        let written = within(
            deadline,
            "room schedule write",
            store::replace(store, room.id, &target.room_schedule()),
        )
        .await;
        if let Err(e) = written {
            return Err(self
                .first_write_failed(
                    &correlation_id,
                    PendingRepair {
                        operation: PairOperation::Update,
                        assignment: target,
                        previous: Some(current),
                        room_schedule_id: Some(room.id),
                        teacher_schedule_id: Some(teacher.id),
                        cause: e.to_string(),
                    },
                    e,
                )
                .await);
        }

        let written = within(
            deadline,
            "teacher schedule write",
            store::replace(store, teacher.id, &target.teacher_schedule()),
        )
        .await;

        match written {
            Ok(_) => {
                transition(
                    &correlation_id,
                    key,
                    Some(AssignmentState::Pending),
                    AssignmentState::Committed,
                );
                info!(
                    correlation_id = %correlation_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Schedule assignment updated"
                );
                self.record_double_bookings(&correlation_id, &target, &clashes)
                    .await;
                Ok(committed(room.id, teacher.id, target))
            }
            Err(e) => Err(self
                .settle(
                    &correlation_id,
                    PendingRepair {
                        operation: PairOperation::Update,
                        assignment: target,
                        previous: Some(current),
                        room_schedule_id: Some(room.id),
                        teacher_schedule_id: Some(teacher.id),
                        cause: e.to_string(),
                    },
                )
                .await),
        }
    }

    pub async fn delete(&self, room_schedule_id: Id) -> Result<(), PlannerError> {
        self.delete_within(room_schedule_id, self.default_deadline())
            .await
    }

    /// Deletes the room half `room_schedule_id` and the teacher half sharing its key.
    ///
    /// A room half without a teacher half is deleted on its own.
    pub async fn delete_within(
        &self,
        room_schedule_id: Id,
        deadline: Option<Instant>,
    ) -> Result<(), PlannerError> {
        let correlation_id = generate_correlation_id();
        info!(
            correlation_id = %correlation_id,
            room_schedule_id,
            "Deleting schedule assignment"
        );

        let _guard = self.write_lock.lock().await;
        let store = self.store.as_ref();
        let room: RoomSchedule = within(
            deadline,
            "schedule read",
            store::fetch(store, room_schedule_id),
        )
        .await?;
        let key = room.key();
        self.ensure_no_pending_repair(key)?;

        let teachers: Vec<TeacherSchedule> =
            within(deadline, "schedule read", store::fetch_all(store)).await?;
        let halves = pairing::teacher_halves(&room, &teachers);
        let teacher = match halves.as_slice() {
            [] => {
                warn!(
                    correlation_id = %correlation_id,
                    key = %key,
                    "Room schedule has no teacher schedule, deleting it alone"
                );
                within(
                    deadline,
                    "room schedule delete",
                    store::remove::<RoomSchedule>(store, room.id),
                )
                .await?;
                return Ok(());
            }
            [teacher] => *teacher,
            many => {
                return Err(ConsistencyError {
                    operation: PairOperation::Delete,
                    key,
                    state: AssignmentState::Reconciling,
                    room_schedule_id: Some(room.id),
                    teacher_schedule_id: None,
                    cause: format!("{} teacher schedules share the key", many.len()),
                    repair: None,
                }
                .into())
            }
        };
        let assignment = Assignment::from_pair(&room, teacher);

        transition(&correlation_id, key, None, AssignmentState::Pending);
        let removed = within(
            deadline,
            "room schedule delete",
            store::remove::<RoomSchedule>(store, room.id),
        )
        .await;
        if let Err(e) = removed {
            return Err(self
                .first_write_failed(
                    &correlation_id,
                    PendingRepair {
                        operation: PairOperation::Delete,
                        assignment,
                        previous: None,
                        room_schedule_id: Some(room.id),
                        teacher_schedule_id: Some(teacher.id),
                        cause: e.to_string(),
                    },
                    e,
                )
                .await);
        }

        let removed = within(
            deadline,
            "teacher schedule delete",
            async { ignore_missing(store::remove::<TeacherSchedule>(store, teacher.id).await) },
        )
        .await;

        match removed {
            Ok(()) => {
                transition(
                    &correlation_id,
                    key,
                    Some(AssignmentState::Pending),
                    AssignmentState::Committed,
                );
                info!(correlation_id = %correlation_id, "Schedule assignment deleted");
                Ok(())
            }
            Err(e) => Err(self
                .settle(
                    &correlation_id,
                    PendingRepair {
                        operation: PairOperation::Delete,
                        assignment,
                        previous: None,
                        room_schedule_id: Some(room.id),
                        teacher_schedule_id: Some(teacher.id),
                        cause: e.to_string(),
                    },
                )
                .await),
        }
    }

    /// Completes a pending repair by bringing the teacher half in line.
    pub async fn reconcile(&self, key: ScheduleKey) -> Result<RepairOutcome, PlannerError> {
        let _guard = self.write_lock.lock().await;
        let repair = self.pending_repair(key)?;
        let correlation_id = generate_correlation_id();
        info!(
            correlation_id = %correlation_id,
            key = %key,
            operation = %repair.operation,
            "Reconciling schedule assignment"
        );

        let store = self.store.as_ref();
        let assignment = match repair.operation {
            PairOperation::Create => {
                let room_id = required(repair.room_schedule_id, "room_schedule_id")?;
                let teacher = store::insert(store, &repair.assignment.teacher_schedule()).await?;
                Some(committed(room_id, teacher.id, repair.assignment))
            }
            PairOperation::Update => {
                let room_id = required(repair.room_schedule_id, "room_schedule_id")?;
                let teacher_id = required(repair.teacher_schedule_id, "teacher_schedule_id")?;
                store::replace(store, teacher_id, &repair.assignment.teacher_schedule()).await?;
                Some(committed(room_id, teacher_id, repair.assignment))
            }
            PairOperation::Delete => {
                if let Some(teacher_id) = repair.teacher_schedule_id {
                    ignore_missing(store::remove::<TeacherSchedule>(store, teacher_id).await)?;
                }
                None
            }
        };

        self.repairs.remove(&key);
        transition(
            &correlation_id,
            key,
            Some(AssignmentState::Reconciling),
            AssignmentState::Committed,
        );
        Ok(RepairOutcome {
            key,
            state: AssignmentState::Committed,
            assignment,
        })
    }

    /// Drops a pending repair by undoing the room half that was written.
    pub async fn abandon(&self, key: ScheduleKey) -> Result<RepairOutcome, PlannerError> {
        let _guard = self.write_lock.lock().await;
        let repair = self.pending_repair(key)?;
        let correlation_id = generate_correlation_id();
        info!(
            correlation_id = %correlation_id,
            key = %key,
            operation = %repair.operation,
            "Abandoning schedule assignment"
        );

        let restored_room = self.compensate(&repair).await?;
        let assignment = match (repair.operation, restored_room, repair.teacher_schedule_id) {
            (PairOperation::Update, Some(room_id), Some(teacher_id)) => repair
                .previous
                .map(|previous| committed(room_id, teacher_id, previous)),
            (PairOperation::Delete, Some(room_id), Some(teacher_id)) => {
                Some(committed(room_id, teacher_id, repair.assignment))
            }
            _ => None,
        };

        self.repairs.remove(&key);
        transition(
            &correlation_id,
            key,
            Some(AssignmentState::Reconciling),
            AssignmentState::Abandoned,
        );
        Ok(RepairOutcome {
            key,
            state: AssignmentState::Abandoned,
            assignment,
        })
    }

    /// Repairs waiting for an operator, ordered by key.
    pub fn pending_repairs(&self) -> Vec<PendingRepair> {
        let mut pending: Vec<PendingRepair> =
            self.repairs.iter().map(|r| r.value().clone()).collect();
        pending.sort_by_key(PendingRepair::key);
        pending
    }

    /// Reads both projections and pairs them up.
    ///
    /// Waits for any write in flight, so a saga's half-written pair is never reported.
    pub async fn list(&self) -> Result<AssignmentLedger, PlannerError> {
        let _guard = self.write_lock.lock().await;
        let (rooms, teachers) = self.load_schedules().await?;
        let pairing = pair_projections(&rooms, &teachers);

        let assignments = pairing
            .pairs
            .iter()
            .map(|(room, teacher)| {
                let state = if self.repairs.contains_key(&room.key()) {
                    AssignmentState::Reconciling
                } else {
                    AssignmentState::Committed
                };
                ScheduleAssignment {
                    room_schedule_id: room.id,
                    teacher_schedule_id: teacher.id,
                    assignment: Assignment::from_pair(room, teacher),
                    state,
                }
            })
            .collect();

        if !pairing.issues.is_empty() {
            warn!(issues = pairing.issues.len(), "Schedule projections do not pair up");
        }

        Ok(AssignmentLedger {
            assignments,
            issues: pairing.issues,
            pending: self.pending_repairs(),
        })
    }

    async fn load_schedules(
        &self,
    ) -> Result<(Vec<RoomSchedule>, Vec<TeacherSchedule>), StoreError> {
        let store = self.store.as_ref();
        futures::try_join!(
            store::fetch_all::<RoomSchedule>(store),
            store::fetch_all::<TeacherSchedule>(store),
        )
    }

    fn ensure_no_pending_repair(&self, key: ScheduleKey) -> Result<(), PlannerError> {
        if self.repairs.contains_key(&key) {
            Err(PlannerError::validation(
                "section_id",
                format!("{key} has a pending repair; reconcile or abandon it first"),
            ))
        } else {
            Ok(())
        }
    }

    fn pending_repair(&self, key: ScheduleKey) -> Result<PendingRepair, PlannerError> {
        self.repairs
            .get(&key)
            .map(|r| r.value().clone())
            .ok_or_else(|| PlannerError::validation("key", format!("no pending repair for {key}")))
    }

    /// Applies the double-booking policy before any write.
    ///
    /// Returns the clashes to record once the assignment commits.
    fn check_double_booking(
        &self,
        correlation_id: &str,
        assignment: &Assignment,
        rooms: &[RoomSchedule],
        teachers: &[TeacherSchedule],
        exclude: Option<(Id, Id)>,
    ) -> Result<Vec<DoubleBooking>, PlannerError> {
        let clashes = find_double_bookings(assignment, rooms, teachers, exclude);
        let Some(first) = clashes.first() else {
            return Ok(clashes);
        };

        match self.config.double_booking {
            DoubleBookingPolicy::Reject => {
                warn!(
                    correlation_id = %correlation_id,
                    clash = %first,
                    "Rejecting double booking"
                );
                Err(PlannerError::DoubleBooked(*first))
            }
            DoubleBookingPolicy::RecordConflict => Ok(clashes),
        }
    }

    /// Stores one conflict per clash of a committed assignment.
    ///
    /// The assignment already stands, so a failed record is logged and skipped.
    async fn record_double_bookings(
        &self,
        correlation_id: &str,
        assignment: &Assignment,
        clashes: &[DoubleBooking],
    ) {
        for clash in clashes {
            let description = format!(
                "{clash}; section {} was assigned anyway",
                assignment.section_id
            );
            let conflict = match clash.resource {
                BookedResource::Room(_) => NewConflict {
                    conflict_type: "room_double_booking".to_string(),
                    entity_type: None,
                    entity_id: None,
                    description,
                },
                BookedResource::Teacher(teacher_id) => {
                    // Teacher ids are not checked on write, so the record may not exist.
                    let known = matches!(
                        store::find::<Teacher>(self.store.as_ref(), teacher_id).await,
                        Ok(Some(_))
                    );
                    NewConflict {
                        conflict_type: "teacher_double_booking".to_string(),
                        entity_type: known.then_some(ConflictEntityType::Professor),
                        entity_id: known.then_some(teacher_id),
                        description,
                    }
                }
            };
            if let Err(e) = self.conflicts.create(conflict).await {
                error!(
                    correlation_id = %correlation_id,
                    clash = %clash,
                    error = %e,
                    "Failed to record double booking"
                );
            }
        }
        if !clashes.is_empty() {
            warn!(
                correlation_id = %correlation_id,
                clashes = clashes.len(),
                "Double booking recorded as conflict"
            );
        }
    }

    /// Resolves a failed first write.
    ///
    /// A write that ran out of time may still have reached the store. The room half
    /// is read back without a deadline; if the write landed, the half-pair goes
    /// through [`Self::settle`] like a failed second write.
    async fn first_write_failed(
        &self,
        correlation_id: &str,
        repair: PendingRepair,
        err: PlannerError,
    ) -> PlannerError {
        let key = repair.key();
        if !matches!(err, PlannerError::DeadlineExceeded { .. }) {
            transition(
                correlation_id,
                key,
                Some(AssignmentState::Pending),
                AssignmentState::Failed,
            );
            return err;
        }

        match self.room_write_landed(&repair).await {
            Ok(None) => {
                transition(
                    correlation_id,
                    key,
                    Some(AssignmentState::Pending),
                    AssignmentState::Failed,
                );
                err
            }
            Ok(Some(room_id)) => {
                warn!(
                    correlation_id = %correlation_id,
                    room_schedule_id = room_id,
                    "Room schedule write landed after the deadline"
                );
                self.settle(
                    correlation_id,
                    PendingRepair {
                        room_schedule_id: Some(room_id),
                        ..repair
                    },
                )
                .await
            }
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Could not read back a timed-out room schedule write"
                );
                transition(
                    correlation_id,
                    key,
                    Some(AssignmentState::Pending),
                    AssignmentState::Reconciling,
                );
                ConsistencyError {
                    operation: repair.operation,
                    key,
                    state: AssignmentState::Reconciling,
                    room_schedule_id: repair.room_schedule_id,
                    teacher_schedule_id: repair.teacher_schedule_id,
                    cause: format!("{}; outcome unknown: {e}", repair.cause),
                    repair: None,
                }
                .into()
            }
        }
    }

    /// Returns the id of the room half if the first write of `repair` took effect.
    async fn room_write_landed(&self, repair: &PendingRepair) -> Result<Option<Id>, PlannerError> {
        let store = self.store.as_ref();
        let expected = repair.assignment.room_schedule();
        let is_expected = |room: &RoomSchedule| {
            *room == RoomSchedule {
                id: room.id,
                ..expected.clone()
            }
        };

        match repair.operation {
            PairOperation::Create => {
                let rooms: Vec<RoomSchedule> = store::fetch_all(store).await?;
                Ok(rooms.iter().find(|r| is_expected(*r)).map(|r| r.id))
            }
            PairOperation::Update => {
                let room_id = required(repair.room_schedule_id, "room_schedule_id")?;
                let room: Option<RoomSchedule> = store::find(store, room_id).await?;
                Ok(room.filter(|r| is_expected(r)).map(|r| r.id))
            }
            PairOperation::Delete => {
                let room_id = required(repair.room_schedule_id, "room_schedule_id")?;
                let room: Option<RoomSchedule> = store::find(store, room_id).await?;
                Ok(room.is_none().then_some(room_id))
            }
        }
    }

    /// Resolves a half-written pair according to the repair policy.
    async fn settle(&self, correlation_id: &str, repair: PendingRepair) -> PlannerError {
        let key = repair.key();
        transition(
            correlation_id,
            key,
            Some(AssignmentState::Pending),
            AssignmentState::Failed,
        );
        warn!(
            correlation_id = %correlation_id,
            operation = %repair.operation,
            cause = %repair.cause,
            "Schedule pair left half-written"
        );

        let operation = repair.operation;
        let teacher_schedule_id = repair.teacher_schedule_id;
        let (state, room_schedule_id, cause, pending) = match self.config.repair_policy {
            RepairPolicy::Compensate => {
                let compensated = self.compensate(&repair).await;
                match compensated {
                    Ok(room_id) => (AssignmentState::Abandoned, room_id, repair.cause, None),
                    Err(e) => {
                        error!(
                            correlation_id = %correlation_id,
                            error = %e,
                            "Compensation failed, leaving repair pending"
                        );
                        let cause = format!("{}; compensation failed: {e}", repair.cause);
                        let repair = PendingRepair {
                            cause: cause.clone(),
                            ..repair
                        };
                        (
                            AssignmentState::Reconciling,
                            repair.room_schedule_id,
                            cause,
                            Some(repair),
                        )
                    }
                }
            }
            RepairPolicy::Flag => (
                AssignmentState::Reconciling,
                repair.room_schedule_id,
                repair.cause.clone(),
                Some(repair),
            ),
        };

        if let Some(pending) = &pending {
            self.repairs.insert(key, pending.clone());
        }
        transition(correlation_id, key, Some(AssignmentState::Failed), state);

        ConsistencyError {
            operation,
            key,
            state,
            room_schedule_id,
            teacher_schedule_id,
            cause,
            repair: pending,
        }
        .into()
    }

    /// Undoes the room half of `repair`. Runs without a deadline.
    ///
    /// Returns the id of the room half left in the store, if any.
    async fn compensate(&self, repair: &PendingRepair) -> Result<Option<Id>, PlannerError> {
        let store = self.store.as_ref();
        match repair.operation {
            PairOperation::Create => {
                if let Some(room_id) = repair.room_schedule_id {
                    ignore_missing(store::remove::<RoomSchedule>(store, room_id).await)?;
                }
                Ok(None)
            }
            PairOperation::Update => {
                let room_id = required(repair.room_schedule_id, "room_schedule_id")?;
                let previous = repair
                    .previous
                    .ok_or_else(|| PlannerError::validation("previous", "no assignment to restore"))?;
                store::replace(store, room_id, &previous.room_schedule()).await?;
                Ok(Some(room_id))
            }
            PairOperation::Delete => {
                let room = store::insert(store, &repair.assignment.room_schedule()).await?;
                Ok(Some(room.id))
            }
        }
    }
}

/// Finds the room half `room_schedule_id` and its single teacher half.
fn resolve_pair<'a>(
    room_schedule_id: Id,
    rooms: &'a [RoomSchedule],
    teachers: &'a [TeacherSchedule],
) -> Result<(&'a RoomSchedule, &'a TeacherSchedule), PlannerError> {
    let room = rooms
        .iter()
        .find(|r| r.id == room_schedule_id)
        .ok_or(PlannerError::NotFound {
            collection: store::Collection::RoomSchedules,
            id: room_schedule_id,
        })?;

    match pairing::teacher_halves(room, teachers).as_slice() {
        [teacher] => Ok((room, *teacher)),
        halves => Err(ConsistencyError {
            operation: PairOperation::Update,
            key: room.key(),
            state: AssignmentState::Reconciling,
            room_schedule_id: Some(room.id),
            teacher_schedule_id: None,
            cause: format!("expected one teacher schedule for the key, found {}", halves.len()),
            repair: None,
        }
        .into()),
    }
}

fn committed(room_schedule_id: Id, teacher_schedule_id: Id, assignment: Assignment) -> ScheduleAssignment {
    ScheduleAssignment {
        room_schedule_id,
        teacher_schedule_id,
        assignment,
        state: AssignmentState::Committed,
    }
}

fn required(id: Option<Id>, field: &'static str) -> Result<Id, PlannerError> {
    id.ok_or_else(|| PlannerError::validation(field, "missing from pending repair"))
}

fn ignore_missing(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => other,
    }
}

/// Runs one stage of a sequence under the caller's deadline.
///
/// A stage never starts once the deadline has passed.
async fn within<T, E, F>(
    deadline: Option<Instant>,
    stage: &'static str,
    fut: F,
) -> Result<T, PlannerError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PlannerError>,
{
    let Some(deadline) = deadline else {
        return fut.await.map_err(Into::into);
    };
    if Instant::now() >= deadline {
        return Err(PlannerError::DeadlineExceeded { stage });
    }
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(PlannerError::DeadlineExceeded { stage }),
    }
}

fn transition(
    correlation_id: &str,
    key: ScheduleKey,
    from: Option<AssignmentState>,
    to: AssignmentState,
) {
    debug!(
        correlation_id = %correlation_id,
        key = %key,
        from = ?from,
        state = ?to,
        "Assignment state change"
    );
}

/// Generates a unique correlation ID for request tracing.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
