//! Error taxonomy of the planning engine.

use crate::coordinator::{AssignmentState, DoubleBooking, PairOperation, PendingRepair};
use crate::model::{Id, ScheduleKey};
use crate::store::{Collection, StoreError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the availability, scheduling and conflict components.
#[derive(Debug, Error, Clone)]
pub enum PlannerError {
    /// A required field is missing or invalid; raised before any write
    #[error("Invalid `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// A referenced id does not resolve in the entity store
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: Id },

    /// The entity store failed the request
    #[error("Entity store error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    /// The two projections of a schedule assignment ended up unpaired
    #[error("{0}")]
    Consistency(Box<ConsistencyError>),

    /// A room or teacher is already booked in the same timeslot and semester
    #[error("{0}")]
    DoubleBooked(DoubleBooking),

    /// The caller's deadline ran out before the named stage could start or finish
    #[error("Deadline exceeded during {stage}")]
    DeadlineExceeded { stage: &'static str },
}

impl PlannerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        PlannerError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true if the failure left state an operator has to look at.
    pub fn needs_operator(&self) -> bool {
        match self {
            PlannerError::Consistency(err) => err.state == AssignmentState::Reconciling,
            _ => false,
        }
    }

    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::Remote { status: None, .. } | PlannerError::DeadlineExceeded { .. } => {
                true
            }
            PlannerError::Remote {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<StoreError> for PlannerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => PlannerError::NotFound { collection, id },
            StoreError::Remote { status, message } => PlannerError::Remote { status, message },
            malformed @ StoreError::Malformed { .. } => PlannerError::Remote {
                status: None,
                message: malformed.to_string(),
            },
        }
    }
}

impl From<ConsistencyError> for PlannerError {
    fn from(err: ConsistencyError) -> Self {
        PlannerError::Consistency(Box::new(err))
    }
}

/// A dual write that did not end with both projections in agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyError {
    pub operation: PairOperation,
    pub key: ScheduleKey,
    /// `Reconciling` when a half-pair was left in place, `Abandoned` when it was rolled back
    pub state: AssignmentState,
    /// Projection ids the operation touched
    pub room_schedule_id: Option<Id>,
    pub teacher_schedule_id: Option<Id>,
    pub cause: String,
    /// Registered repair, present while the assignment is reconciling
    pub repair: Option<PendingRepair>,
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Schedule pair for {} left unpaired by {} ({}): {}",
            self.key, self.operation, self.state, self.cause
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consistency(state: AssignmentState) -> PlannerError {
        ConsistencyError {
            operation: PairOperation::Create,
            key: ScheduleKey {
                section_id: 4,
                timeslot_id: 3,
                semester_id: 5,
            },
            state,
            room_schedule_id: Some(1),
            teacher_schedule_id: None,
            cause: "teacher write failed".to_string(),
            repair: None,
        }
        .into()
    }

    #[test]
    fn test_store_errors_map_onto_taxonomy() {
        let not_found: PlannerError = StoreError::NotFound {
            collection: Collection::Teachers,
            id: 7,
        }
        .into();
        assert!(matches!(
            not_found,
            PlannerError::NotFound { id: 7, .. }
        ));

        let remote: PlannerError = StoreError::Remote {
            status: Some(500),
            message: "boom".to_string(),
        }
        .into();
        assert!(remote.is_retryable());
        assert_eq!(remote.to_string(), "Entity store error (500): boom");
    }

    #[test]
    fn test_only_reconciling_needs_operator() {
        assert!(consistency(AssignmentState::Reconciling).needs_operator());
        assert!(!consistency(AssignmentState::Abandoned).needs_operator());
        assert!(!PlannerError::validation("type", "empty").needs_operator());
    }

    #[test]
    fn test_consistency_display() {
        assert_eq!(
            consistency(AssignmentState::Reconciling).to_string(),
            "Schedule pair for section 4 / timeslot 3 / semester 5 left unpaired by create (reconciling): teacher write failed"
        );
    }
}
