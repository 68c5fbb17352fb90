//! Deterministic, network-free collaborators used by `run --dry-run` and by tests.
//!
//! Outputs depend only on their inputs, so a dry run is reproducible end to end.

use async_trait::async_trait;

use crate::domain::errors::{ServiceError, ServiceResult};
use crate::domain::models::{Metered, PerformanceSummary, Role, ScenarioConfig, Turn};
use crate::domain::ports::{Critic, Responder, TurnGenerator, VariantGenerator};

const TACTICS: &[&str] = &[
    "Lead with on-chain data.",
    "Acknowledge past losses before pitching.",
    "Offer a small pilot allocation.",
    "Explain where value accrues to token holders.",
    "Compare the risk profile with holding ETH.",
    "Name the team and their track record.",
    "Keep every message under three sentences.",
    "Ask what evidence would change their mind.",
];

const PERSONA_LINES: &[&str] = &[
    "Who is actually on the team?",
    "How is this different from the last project that rugged?",
    "What does liquidity look like after the unlock?",
    "Why shouldn't I just hold ETH?",
    "Show me the numbers, not the roadmap.",
    "Fine, that part makes sense. What's the vesting schedule?",
];

fn stable_hash(text: &str) -> u64 {
    text.bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3))
}

fn unit_interval(text: &str) -> f64 {
    (stable_hash(text) % 10_000) as f64 / 10_000.0
}

/// Appends a hash-selected tactic to the parent strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedVariantGenerator;

#[async_trait]
impl VariantGenerator for SimulatedVariantGenerator {
    async fn generate_variants(
        &self,
        parent_strategy: &str,
        performance: &PerformanceSummary,
        k: usize,
    ) -> ServiceResult<Vec<String>> {
        let base = stable_hash(parent_strategy) ^ u64::from(performance.sample_count);
        Ok((0..k)
            .map(|i| {
                let tactic = TACTICS[((base >> 3).wrapping_add(i as u64) % TACTICS.len() as u64) as usize];
                if parent_strategy.trim().is_empty() {
                    format!("You are a crypto sales agent. {tactic}")
                } else {
                    format!("{} {tactic}", parent_strategy.trim())
                }
            })
            .collect())
    }
}

/// Restates a slice of the strategy each turn.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedTurnGenerator;

#[async_trait]
impl TurnGenerator for SimulatedTurnGenerator {
    async fn next_message(&self, strategy: &str, transcript: &[Turn]) -> ServiceResult<Metered<String>> {
        let turn = transcript.iter().filter(|t| t.role == Role::Agent).count();
        let sentences: Vec<&str> = strategy.split('.').map(str::trim).filter(|s| !s.is_empty()).collect();
        let message = if sentences.is_empty() {
            format!("Hello, I'd like to tell you about our project (message {}).", turn + 1)
        } else {
            format!("{}.", sentences[turn % sentences.len()])
        };
        Ok(Metered::free(message))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedResponder;

#[async_trait]
impl Responder for SimulatedResponder {
    async fn respond(&self, scenario: &ScenarioConfig, transcript: &[Turn]) -> ServiceResult<Metered<String>> {
        let last = transcript
            .last()
            .ok_or_else(|| ServiceError::Failed("responder called with an empty transcript".to_string()))?;
        let index = stable_hash(&format!("{}{}", scenario.mood, last.content)) % PERSONA_LINES.len() as u64;
        Ok(Metered::free(PERSONA_LINES[index as usize].to_string()))
    }
}

/// Scores a transcript from its agent messages; more tactics and more turns score higher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedCritic;

#[async_trait]
impl Critic for SimulatedCritic {
    async fn score(&self, transcript: &[Turn]) -> ServiceResult<Metered<f64>> {
        let agent_text: String = transcript
            .iter()
            .filter(|t| t.role == Role::Agent)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let tactics = TACTICS.iter().filter(|t| agent_text.contains(**t)).count() as f64;
        let turns = transcript.len() as f64 / 2.0;
        let score = 0.2 + 0.25 * unit_interval(&agent_text) + 0.06 * tactics + 0.02 * turns;
        Ok(Metered::free(score.clamp(0.0, 1.0)))
    }
}
