//! Room occupancy from recurring weekly timeslots.
//!
//! Everything here is a pure function of `(room_id, schedules, timeslots, now)`;
//! callers re-evaluate on every tick instead of caching results.

use crate::model::{
    Id, Room, RoomSchedule, Timeslot, WeekInstant, MINUTES_PER_DAY, MINUTES_PER_WEEK,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// A room's schedule joined with its timeslot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledSlot<'a> {
    pub schedule: &'a RoomSchedule,
    pub timeslot: &'a Timeslot,
}

/// The nearest schedule to start at or after `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpcomingSchedule<'a> {
    #[serde(flatten)]
    pub slot: ScheduledSlot<'a>,
    /// Minutes from `now` until the slot starts, within one week
    pub starts_in_minutes: i64,
}

/// Slots of one room, skipping schedules whose timeslot is unknown or malformed.
fn room_slots<'a>(
    room_id: Id,
    schedules: &'a [RoomSchedule],
    timeslots: &'a [Timeslot],
) -> impl Iterator<Item = ScheduledSlot<'a>> {
    let by_id: HashMap<Id, &'a Timeslot> = timeslots.iter().map(|t| (t.id, t)).collect();

    schedules
        .iter()
        .filter(move |s| s.room_id == room_id)
        .filter_map(move |schedule| match by_id.get(&schedule.timeslot_id) {
            Some(timeslot) if timeslot.is_well_formed() => Some(ScheduledSlot {
                schedule,
                timeslot,
            }),
            Some(_) => {
                debug!(
                    schedule_id = schedule.id,
                    timeslot_id = schedule.timeslot_id,
                    "Skipping schedule with malformed timeslot"
                );
                None
            }
            None => {
                debug!(
                    schedule_id = schedule.id,
                    timeslot_id = schedule.timeslot_id,
                    "Skipping schedule with unknown timeslot"
                );
                None
            }
        })
}

fn covers(timeslot: &Timeslot, now: WeekInstant) -> bool {
    timeslot.day_of_week == now.day
        && timeslot.start_time.minute_of_day() <= now.minute_of_day
        && now.minute_of_day <= timeslot.end_time.minute_of_day()
}

/// Forward distance in minutes from `now` to the slot's next start, in `[0, 10080)`.
fn forward_offset(timeslot: &Timeslot, now: WeekInstant) -> i64 {
    let days = (i64::from(timeslot.day_of_week.number()) - i64::from(now.day.number()))
        .rem_euclid(7);
    let offset = days * MINUTES_PER_DAY + (timeslot.start_time.minute_of_day() - now.minute_of_day);
    offset.rem_euclid(MINUTES_PER_WEEK)
}

/// The slot covering `now` in the room, if any. Bounds are inclusive.
pub fn current_slot<'a>(
    room_id: Id,
    schedules: &'a [RoomSchedule],
    timeslots: &'a [Timeslot],
    now: WeekInstant,
) -> Option<ScheduledSlot<'a>> {
    room_slots(room_id, schedules, timeslots).find(|slot| covers(slot.timeslot, now))
}

/// Whether the room has a schedule whose weekly window contains `now`.
pub fn is_occupied(
    room_id: Id,
    schedules: &[RoomSchedule],
    timeslots: &[Timeslot],
    now: WeekInstant,
) -> bool {
    current_slot(room_id, schedules, timeslots, now).is_some()
}

/// The room's schedule with the smallest forward offset from `now`.
///
/// Ties go to the schedule listed first.
pub fn next_schedule<'a>(
    room_id: Id,
    schedules: &'a [RoomSchedule],
    timeslots: &'a [Timeslot],
    now: WeekInstant,
) -> Option<UpcomingSchedule<'a>> {
    room_slots(room_id, schedules, timeslots)
        .map(|slot| UpcomingSchedule {
            slot,
            starts_in_minutes: forward_offset(slot.timeslot, now),
        })
        .min_by_key(|upcoming| upcoming.starts_in_minutes)
}

/// Occupancy of one room at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatus<'a> {
    pub room: &'a Room,
    pub occupied: bool,
    pub current: Option<ScheduledSlot<'a>>,
    pub next: Option<UpcomingSchedule<'a>>,
}

pub fn room_status<'a>(
    room: &'a Room,
    schedules: &'a [RoomSchedule],
    timeslots: &'a [Timeslot],
    now: WeekInstant,
) -> RoomStatus<'a> {
    let current = current_slot(room.id, schedules, timeslots, now);
    RoomStatus {
        room,
        occupied: current.is_some(),
        current,
        next: next_schedule(room.id, schedules, timeslots, now),
    }
}

/// Occupancy of every room, in room order.
pub fn room_board<'a>(
    rooms: &'a [Room],
    schedules: &'a [RoomSchedule],
    timeslots: &'a [Timeslot],
    now: WeekInstant,
) -> Vec<RoomStatus<'a>> {
    rooms
        .iter()
        .map(|room| room_status(room, schedules, timeslots, now))
        .collect()
}
