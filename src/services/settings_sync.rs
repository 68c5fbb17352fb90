//! Applies settings changed from another process to the running worker.
//!
//! `multiverse weights set` and `multiverse budget set` write to the `settings` table. The
//! sync task polls that table, pushes changes into the live [`SharedWeights`] and
//! [`BudgetTracker`], and records the current spend so `budget show` can report it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapters::sqlite::{SpendSnapshot, SqliteSettingsStore};
use crate::domain::errors::DomainResult;
use crate::domain::ports::WeightsProvider;
use crate::services::budget_tracker::BudgetTracker;
use crate::services::weights::SharedWeights;

/// What one poll changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub weights_changed: bool,
    pub budget_changed: bool,
}

pub struct SettingsSync {
    settings: SqliteSettingsStore,
    weights: Arc<SharedWeights>,
    budget: BudgetTracker,
    interval: Duration,
}

impl SettingsSync {
    pub fn new(settings: SqliteSettingsStore, weights: Arc<SharedWeights>, budget: BudgetTracker, interval: Duration) -> Self {
        Self {
            settings,
            weights,
            budget,
            interval,
        }
    }

    /// Seeds the tracker with the spend recorded by an earlier run.
    ///
    /// Call once, before the first [`SettingsSync::sync_once`], which overwrites the stored
    /// spend with the tracker's.
    pub async fn restore_spend(&self) -> DomainResult<bool> {
        let Some(stored) = self.settings.load_spend().await? else {
            return Ok(false);
        };
        Ok(self.budget.restore(stored.cost_usd, stored.calls, stored.recorded_at).await)
    }

    /// One poll: pull weights and ceiling, push spend.
    pub async fn sync_once(&self) -> DomainResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();

        if let Some(stored) = self.settings.load_weights().await? {
            if stored != self.weights.weights() {
                match self.weights.replace(stored) {
                    Ok(_) => outcome.weights_changed = true,
                    Err(e) => warn!(error = %e, "Ignoring invalid stored weights"),
                }
            }
        }

        if let Some(max_cost) = self.settings.load_max_cost().await? {
            if self.budget.snapshot().await.max_cost_usd != max_cost {
                self.budget.set_max_cost(max_cost).await;
                outcome.budget_changed = true;
            }
        }

        let snapshot = self.budget.snapshot().await;
        self.settings
            .save_spend(&SpendSnapshot {
                cost_usd: snapshot.spent_usd,
                calls: snapshot.calls,
                recorded_at: Some(Utc::now()),
            })
            .await?;

        Ok(outcome)
    }

    /// Polls until `cancel` fires, then records the final spend once more.
    /// Failed polls are logged and retried on the next tick.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(100)));
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        if let Err(e) = self.sync_once().await {
                            warn!(error = %e, "Final settings sync failed");
                        }
                        break;
                    }
                    _ = ticker.tick() => match self.sync_once().await {
                        Ok(outcome) if outcome != SyncOutcome::default() => {
                            debug!(?outcome, "Applied settings from store");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Settings sync failed"),
                    },
                }
            }
        })
    }
}
