//! Runtime-adjustable priority weights.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SchedulerWeights;
use crate::domain::ports::WeightsProvider;

/// Partial change to the weights. `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsUpdate {
    pub lambda_trend: Option<f64>,
    pub lambda_sim: Option<f64>,
    pub lambda_depth: Option<f64>,
}

impl WeightsUpdate {
    pub const fn is_empty(&self) -> bool {
        self.lambda_trend.is_none() && self.lambda_sim.is_none() && self.lambda_depth.is_none()
    }

    /// Applies the update on top of `current` and validates the result.
    pub fn apply_to(&self, current: SchedulerWeights) -> DomainResult<SchedulerWeights> {
        let next = SchedulerWeights {
            lambda_trend: self.lambda_trend.unwrap_or(current.lambda_trend),
            lambda_sim: self.lambda_sim.unwrap_or(current.lambda_sim),
            lambda_depth: self.lambda_depth.unwrap_or(current.lambda_depth),
        };
        if !next.is_valid() {
            return Err(DomainError::ValidationFailed(format!(
                "weights must be finite and non-negative: {next:?}"
            )));
        }
        Ok(next)
    }
}

/// Thread-safe weights replaced atomically as a whole.
#[derive(Debug, Default)]
pub struct SharedWeights {
    current: RwLock<SchedulerWeights>,
}

impl SharedWeights {
    pub fn new(initial: SchedulerWeights) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Applies a partial update and returns the new weights.
    pub fn update(&self, update: WeightsUpdate) -> DomainResult<SchedulerWeights> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = update.apply_to(*guard)?;
        if next != *guard {
            info!(
                lambda_trend = next.lambda_trend,
                lambda_sim = next.lambda_sim,
                lambda_depth = next.lambda_depth,
                "Priority weights updated"
            );
        }
        *guard = next;
        Ok(next)
    }

    /// Replaces all three weights.
    pub fn replace(&self, weights: SchedulerWeights) -> DomainResult<SchedulerWeights> {
        self.update(WeightsUpdate {
            lambda_trend: Some(weights.lambda_trend),
            lambda_sim: Some(weights.lambda_sim),
            lambda_depth: Some(weights.lambda_depth),
        })
    }
}

impl WeightsProvider for SharedWeights {
    fn weights(&self) -> SchedulerWeights {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}
