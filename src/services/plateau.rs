//! Early-stop rule for incrementally scored conversations.
//!
//! After each scored turn the evaluator asks [`PlateauDetector::decide`] whether to keep
//! extending the transcript. The rule depends only on the score sequence, so identical
//! sequences always stop at the same turn with the same reported score.

use crate::domain::models::{EvaluationConfig, StopReason};

/// Outcome of checking a score sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopDecision {
    Continue,
    Stop { reason: StopReason, score: f64 },
}

impl StopDecision {
    pub const fn should_stop(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauDetector {
    pub min_turns: usize,
    pub window: usize,
    pub threshold: f64,
    pub early_success: f64,
}

impl Default for PlateauDetector {
    fn default() -> Self {
        Self::from(&EvaluationConfig::default())
    }
}

impl From<&EvaluationConfig> for PlateauDetector {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            min_turns: config.min_turns,
            window: config.plateau_window,
            threshold: config.plateau_threshold,
            early_success: config.early_success_threshold,
        }
    }
}

impl PlateauDetector {
    /// Decides whether to stop after the latest score in `scores`.
    ///
    /// Plateau is checked before early success. Reaching `max_turns` stops with the last
    /// score. An empty sequence never stops here; the caller reports 0.0 for it.
    pub fn decide(&self, scores: &[f64], max_turns: usize) -> StopDecision {
        let Some(&latest) = scores.last() else {
            return StopDecision::Continue;
        };

        let window = self.window.max(2);
        if scores.len() >= self.min_turns.max(window) {
            let recent = &scores[scores.len() - window..];
            let improvement = recent.windows(2).map(|pair| pair[1] - pair[0]).sum::<f64>() / (window - 1) as f64;

            if improvement < self.threshold {
                let best = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                return StopDecision::Stop {
                    reason: StopReason::Plateau,
                    score: best,
                };
            }
            if latest > self.early_success {
                return StopDecision::Stop {
                    reason: StopReason::EarlySuccess,
                    score: latest,
                };
            }
        }

        if scores.len() >= max_turns {
            return StopDecision::Stop {
                reason: StopReason::MaxTurns,
                score: latest,
            };
        }

        StopDecision::Continue
    }

    /// Replays `scores` turn by turn and returns the first stop, if any.
    pub fn first_stop(&self, scores: &[f64], max_turns: usize) -> Option<(usize, StopDecision)> {
        (1..=scores.len())
            .map(|n| (n, self.decide(&scores[..n], max_turns)))
            .find(|(_, decision)| decision.should_stop())
    }
}
