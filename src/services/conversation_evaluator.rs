//! Fitness function built from simulated conversations.
//!
//! A strategy is scored by running one conversation per configured scenario. Each
//! conversation alternates agent and persona turns, scores the transcript after every
//! persona reply and stops according to the [`PlateauDetector`]. Conversation scores are
//! averaged and a small bonus rewards reaching success in few turns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::errors::{ServiceError, ServiceResult};
use crate::domain::models::{ConversationSample, Evaluation, EvaluationConfig, ScenarioConfig, StopReason, Turn, Usage};
use crate::domain::ports::{Critic, Evaluator, Responder, TurnGenerator};
use crate::services::plateau::{PlateauDetector, StopDecision};

/// Turn count at which the efficiency bonus reaches zero.
const EFFICIENCY_BASELINE_TURNS: f64 = 10.0;
const EFFICIENCY_WEIGHT: f64 = 0.1;

/// Final score from completed conversations: mean plus efficiency bonus, capped at 1.
///
/// `success_score` is the threshold a conversation must exceed to count as a success.
pub fn aggregate_score(samples: &[ConversationSample], success_score: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let n = samples.len() as f64;
    let avg = samples.iter().map(|s| s.score).sum::<f64>() / n;

    let successful: Vec<&ConversationSample> = samples.iter().filter(|s| s.score > success_score).collect();
    let bonus = if successful.is_empty() {
        0.0
    } else {
        let success_rate = successful.len() as f64 / n;
        let avg_turns = successful.iter().map(|s| s.scored_turns() as f64).sum::<f64>() / successful.len() as f64;
        EFFICIENCY_WEIGHT * success_rate * ((EFFICIENCY_BASELINE_TURNS - avg_turns) / EFFICIENCY_BASELINE_TURNS).max(0.0)
    };

    (avg + bonus).min(1.0)
}

pub struct ConversationEvaluator {
    agent: Arc<dyn TurnGenerator>,
    responder: Arc<dyn Responder>,
    critic: Arc<dyn Critic>,
    detector: PlateauDetector,
    scenarios: Vec<ScenarioConfig>,
    success_score: f64,
    conversation_timeout: Duration,
}

/// Running state of one conversation.
struct Conversation {
    turns: Vec<Turn>,
    scores: Vec<f64>,
    usage: Usage,
}

impl Conversation {
    fn finish(self, scenario: &ScenarioConfig, score: f64, stop_reason: StopReason) -> (ConversationSample, Usage) {
        (
            ConversationSample {
                scenario: scenario.name.clone(),
                turns: self.turns,
                turn_scores: self.scores,
                score,
                stop_reason,
            },
            self.usage,
        )
    }

    /// Ends early after a collaborator failure, keeping the last observed score.
    fn abort(self, scenario: &ScenarioConfig, error: &ServiceError) -> (ConversationSample, Usage) {
        warn!(scenario = %scenario.name, turns = self.scores.len(), error = %error, "Conversation aborted");
        match self.scores.last().copied() {
            Some(last) => self.finish(scenario, last, StopReason::Aborted),
            None => (unscored(scenario), self.usage),
        }
    }
}

/// A conversation that never produced a score. It reports 0.0 with an empty transcript.
fn unscored(scenario: &ScenarioConfig) -> ConversationSample {
    ConversationSample {
        scenario: scenario.name.clone(),
        turns: Vec::new(),
        turn_scores: Vec::new(),
        score: 0.0,
        stop_reason: StopReason::Aborted,
    }
}

impl ConversationEvaluator {
    pub fn new(
        agent: Arc<dyn TurnGenerator>,
        responder: Arc<dyn Responder>,
        critic: Arc<dyn Critic>,
        config: &EvaluationConfig,
    ) -> Self {
        Self {
            agent,
            responder,
            critic,
            detector: PlateauDetector::from(config),
            scenarios: config.scenarios.clone(),
            success_score: config.success_score,
            conversation_timeout: Duration::from_secs(config.conversation_timeout_secs),
        }
    }

    /// Runs one conversation to its stop condition.
    ///
    /// Only a policy violation is returned as an error. Other collaborator failures end
    /// the conversation with reason [`StopReason::Aborted`].
    pub async fn run_conversation(
        &self,
        strategy: &str,
        scenario: &ScenarioConfig,
    ) -> ServiceResult<(ConversationSample, Usage)> {
        let mut convo = Conversation {
            turns: Vec::new(),
            scores: Vec::new(),
            usage: Usage::default(),
        };

        let mut message = match self.agent.next_message(strategy, &convo.turns).await {
            Ok(opening) => {
                convo.usage.add(&opening.usage);
                opening.value
            }
            Err(e) if e.is_policy_violation() => return Err(e),
            Err(e) => return Ok(convo.abort(scenario, &e)),
        };

        loop {
            convo.turns.push(Turn::agent(message));

            let reply = match self.responder.respond(scenario, &convo.turns).await {
                Ok(reply) => reply,
                Err(e) if e.is_policy_violation() => return Err(e),
                Err(e) => {
                    // Drop the unanswered agent message so the transcript stays paired.
                    convo.turns.pop();
                    return Ok(convo.abort(scenario, &e));
                }
            };
            convo.usage.add(&reply.usage);
            convo.turns.push(Turn::persona(reply.value));

            let score = match self.critic.score(&convo.turns).await {
                Ok(score) => score,
                Err(e) if e.is_policy_violation() => return Err(e),
                Err(e) => return Ok(convo.abort(scenario, &e)),
            };
            convo.usage.add(&score.usage);
            convo.scores.push(score.value);
            debug!(scenario = %scenario.name, turn = convo.scores.len(), score = score.value, "Turn scored");

            if let StopDecision::Stop { reason, score } = self.detector.decide(&convo.scores, scenario.max_turns) {
                debug!(scenario = %scenario.name, ?reason, score, turns = convo.scores.len(), "Conversation stopped");
                return Ok(convo.finish(scenario, score, reason));
            }

            message = match self.agent.next_message(strategy, &convo.turns).await {
                Ok(next) => {
                    convo.usage.add(&next.usage);
                    next.value
                }
                Err(e) if e.is_policy_violation() => return Err(e),
                Err(e) => return Ok(convo.abort(scenario, &e)),
            };
        }
    }

    async fn run_with_timeout(
        &self,
        strategy: &str,
        scenario: &ScenarioConfig,
    ) -> ServiceResult<(ConversationSample, Usage)> {
        tokio::time::timeout(self.conversation_timeout, self.run_conversation(strategy, scenario))
            .await
            .map_err(|_| ServiceError::Timeout(self.conversation_timeout))?
    }
}

#[async_trait]
impl Evaluator for ConversationEvaluator {
    async fn evaluate(&self, strategy: &str) -> ServiceResult<Evaluation> {
        let results = join_all(self.scenarios.iter().map(|s| self.run_with_timeout(strategy, s))).await;

        let mut samples = Vec::with_capacity(results.len());
        let mut usage = Usage::default();
        for (scenario, result) in self.scenarios.iter().zip(results) {
            match result {
                Ok((sample, spent)) => {
                    usage.add(&spent);
                    samples.push(sample);
                }
                Err(e) if e.is_policy_violation() => {
                    warn!(scenario = %scenario.name, error = %e, "Policy violation; strategy unusable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(scenario = %scenario.name, error = %e, "Conversation failed; scored as 0.0");
                    samples.push(unscored(scenario));
                }
            }
        }

        // Unscored conversations count as 0.0, but at least one must have been scored.
        if samples.iter().all(|s| s.scored_turns() == 0) {
            return Err(ServiceError::Failed(format!(
                "none of {} conversations completed",
                self.scenarios.len()
            )));
        }

        let score = aggregate_score(&samples, self.success_score);
        let sample_count = u32::try_from(samples.len()).unwrap_or(u32::MAX);
        info!(
            score,
            sample_count,
            cost_usd = usage.cost_usd,
            "Strategy evaluated"
        );

        Ok(Evaluation {
            score,
            samples,
            sample_count,
            usage: Some(usage),
        })
    }
}
