pub mod assignments;
pub mod availability;
pub mod conflicts;
pub mod occupancy;
pub mod status;
