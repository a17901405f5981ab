use crate::conflicts::ConflictRecorder;
use crate::coordinator::{CoordinatorConfig, ScheduleCoordinator};
use crate::store::SharedStore;

/// Shared state handed to every handler.
pub struct PlannerState {
    pub store: SharedStore,
    pub coordinator: ScheduleCoordinator,
    pub conflicts: ConflictRecorder,
}

impl PlannerState {
    pub fn new(store: SharedStore, config: CoordinatorConfig) -> Self {
        Self {
            coordinator: ScheduleCoordinator::new(store.clone(), config),
            conflicts: ConflictRecorder::new(store.clone()),
            store,
        }
    }
}
