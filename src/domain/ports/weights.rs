//! Runtime weights port.

use crate::domain::models::SchedulerWeights;

/// Source of the current priority weights, read on every priority computation.
pub trait WeightsProvider: Send + Sync {
    fn weights(&self) -> SchedulerWeights;
}

impl WeightsProvider for SchedulerWeights {
    fn weights(&self) -> SchedulerWeights {
        *self
    }
}
