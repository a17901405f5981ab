//! Scheduling and availability engine for an academic planner.
//!
//! Seat availability and room occupancy are pure functions over data fetched from
//! the entity store. Schedule assignments are written to two projections (room and
//! teacher) through [`coordinator::ScheduleCoordinator`], which keeps them paired.

pub mod availability;
pub mod config;
pub mod conflicts;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod model;
pub mod occupancy;
pub mod server;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{ConsistencyError, PlannerError};
