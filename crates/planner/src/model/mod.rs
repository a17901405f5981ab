//! Domain records for rooms, people, sections, timeslots, schedules and conflicts.

mod refs;
mod time;
mod types;

pub use time::{ClockTime, IsoWeekday, WeekInstant, MINUTES_PER_DAY, MINUTES_PER_WEEK};
pub use types::*;

/// Identifier assigned by the entity store. Ids are unique per collection only.
pub type Id = i64;
