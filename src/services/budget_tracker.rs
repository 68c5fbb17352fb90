//! Spend tracking and backpressure for external calls.
//!
//! Every priced call made by the adapters is recorded here. The worker loop asks
//! [`BudgetTracker::is_exhausted`] before each batch and pauses while it is true.
//! Ceilings may be raised at runtime, which lifts the pause on the next check.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::models::BudgetConfig;

// ============================================================================
// Supporting types
// ============================================================================

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub spent_usd: f64,
    pub calls: u64,
    pub max_cost_usd: Option<f64>,
    pub max_calls: Option<u64>,
    /// UTC day the counters belong to, when daily reset is enabled.
    pub window: Option<NaiveDate>,
}

impl BudgetSnapshot {
    /// Remaining spend, `None` when unlimited.
    pub fn remaining_usd(&self) -> Option<f64> {
        self.max_cost_usd.map(|max| (max - self.spent_usd).max(0.0))
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_cost_usd.is_some_and(|max| self.spent_usd >= max)
            || self.max_calls.is_some_and(|max| self.calls >= max)
    }
}

#[derive(Debug)]
struct Inner {
    spent_usd: f64,
    calls: u64,
    max_cost_usd: Option<f64>,
    max_calls: Option<u64>,
    window: NaiveDate,
}

// ============================================================================
// Tracker
// ============================================================================

/// Cumulative cost and call counter with optional ceilings.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    inner: Arc<RwLock<Inner>>,
    daily_reset: bool,
}

impl BudgetTracker {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                spent_usd: 0.0,
                calls: 0,
                max_cost_usd: config.max_cost_usd,
                max_calls: config.max_calls,
                window: Utc::now().date_naive(),
            })),
            daily_reset: config.daily_reset,
        }
    }

    /// Tracker without ceilings.
    pub fn unlimited() -> Self {
        Self::new(&BudgetConfig {
            max_cost_usd: None,
            max_calls: None,
            daily_reset: false,
            ..BudgetConfig::default()
        })
    }

    /// Records one external call and its cost.
    pub async fn record(&self, cost_usd: f64) {
        self.record_at(cost_usd, Utc::now()).await;
    }

    pub async fn record_at(&self, cost_usd: f64, now: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        self.roll_window(&mut inner, now);
        inner.spent_usd += cost_usd.max(0.0);
        inner.calls += 1;
    }

    pub async fn is_exhausted(&self) -> bool {
        self.is_exhausted_at(Utc::now()).await
    }

    pub async fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot_at(now).await.is_exhausted()
    }

    pub async fn snapshot(&self) -> BudgetSnapshot {
        self.snapshot_at(Utc::now()).await
    }

    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> BudgetSnapshot {
        let mut inner = self.inner.write().await;
        self.roll_window(&mut inner, now);
        BudgetSnapshot {
            spent_usd: inner.spent_usd,
            calls: inner.calls,
            max_cost_usd: inner.max_cost_usd,
            max_calls: inner.max_calls,
            window: self.daily_reset.then_some(inner.window),
        }
    }

    /// Replaces the cost ceiling. `None` removes it.
    pub async fn set_max_cost(&self, max_cost_usd: Option<f64>) {
        let mut inner = self.inner.write().await;
        if inner.max_cost_usd != max_cost_usd {
            info!(old = ?inner.max_cost_usd, new = ?max_cost_usd, "Budget ceiling changed");
            inner.max_cost_usd = max_cost_usd;
        }
    }

    /// Adds spend carried over from an earlier process.
    ///
    /// With daily reset, a record from an earlier UTC day (or with no timestamp) is
    /// ignored. Returns whether the record was applied.
    pub async fn restore(&self, spent_usd: f64, calls: u64, recorded_at: Option<DateTime<Utc>>) -> bool {
        self.restore_at(spent_usd, calls, recorded_at, Utc::now()).await
    }

    pub async fn restore_at(
        &self,
        spent_usd: f64,
        calls: u64,
        recorded_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        self.roll_window(&mut inner, now);
        if self.daily_reset && recorded_at.map(|at| at.date_naive()) != Some(inner.window) {
            info!(recorded_at = ?recorded_at, window = %inner.window, "Stored spend is from another budget window; not restored");
            return false;
        }
        inner.spent_usd += spent_usd.max(0.0);
        inner.calls += calls;
        info!(spent_usd = inner.spent_usd, calls = inner.calls, "Restored spend from store");
        true
    }

    /// Clears spend and call counters.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.spent_usd = 0.0;
        inner.calls = 0;
    }

    fn roll_window(&self, inner: &mut Inner, now: DateTime<Utc>) {
        if !self.daily_reset {
            return;
        }
        let today = now.date_naive();
        if today > inner.window {
            info!(
                previous_day = %inner.window,
                spent_usd = inner.spent_usd,
                calls = inner.calls,
                "Daily budget window rolled over"
            );
            inner.window = today;
            inner.spent_usd = 0.0;
            inner.calls = 0;
        }
    }
}
