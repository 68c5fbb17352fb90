//! Chat-model backed implementations of the evaluation ports.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{format_transcript, ChatMessage, ChatModel, ChatRequest};
use crate::domain::errors::{ServiceError, ServiceResult};
use crate::domain::models::{Metered, PerformanceSummary, Role, ScenarioConfig, Turn, Usage};
use crate::domain::ports::{Critic, Responder, TurnGenerator, VariantGenerator};

/// Score used when the critic's answer cannot be parsed.
pub const NEUTRAL_SCORE: f64 = 0.5;

const SEED_MUTATOR_PROMPT: &str = "You are a meta-prompt engineer creating instructions for a sales agent. \
Generate a system prompt that will guide the agent in conversations with skeptical crypto investors.\n\n\
Use this loose structure so parts can evolve independently:\n\
1. ROLE: who the agent is\n\
2. OBJECTIVE: the goal of the conversation\n\
3. KEY STRATEGIES: two or three main approaches\n\
4. BEHAVIORAL TRAITS: how to act\n\
5. CONSTRAINTS: what to avoid\n\n\
Output ONLY the system prompt text. No explanations.";

const MUTATOR_PROMPT: &str = "You are a meta-prompt engineer optimizing instructions for a sales agent. \
Given a system prompt and its performance, write an improved variant.\n\n\
Evolution moves: change individual components, amplify what scores well, introduce a novel approach.\n\
Keep the ROLE / OBJECTIVE / KEY STRATEGIES / BEHAVIORAL TRAITS / CONSTRAINTS structure.\n\n\
Output ONLY the system prompt text. No explanations.";

const OPENING_INSTRUCTION: &str =
    "Write your opening message to the investor. Output only the exact message text:";

const PERSONA_PROMPT: &str = "You are a crypto investor being pitched a project. \
You have been active since 2020, lost money in past collapses, and prefer utility over speculation. \
You research teams, want data rather than promises, worry about liquidity and where value accrues, \
and compare every offer with simply holding ETH. Show genuine skepticism but be persuadable by solid evidence. \
Reply in one to three sentences.";

const CRITIC_PROMPT: &str = "You judge sales conversations between an agent and a skeptical investor. \
Rate how close the investor is to a genuine, well-informed commitment, from 0.0 (hostile or disengaged) \
to 1.0 (ready to commit). Respond with a JSON object: {\"score\": <number between 0 and 1>, \"rationale\": \"<short reason>\"}.";

// ============================================================================
// Variant generator
// ============================================================================

pub struct LlmVariantGenerator {
    chat: Arc<dyn ChatModel>,
    model: String,
    temperature: f32,
}

impl LlmVariantGenerator {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            chat,
            model: model.into(),
            temperature,
        }
    }

    fn messages(parent_strategy: &str, performance: &PerformanceSummary) -> Vec<ChatMessage> {
        if parent_strategy.trim().is_empty() {
            return vec![
                ChatMessage::system(SEED_MUTATOR_PROMPT),
                ChatMessage::user("Generate an initial system prompt. Output only the system prompt text:"),
            ];
        }

        vec![
            ChatMessage::system(MUTATOR_PROMPT),
            ChatMessage::user(format!(
                "Parent prompt: '{parent_strategy}'\nPerformance: Average Score: {:.3}, Conversations Tested: {}\n\n\
                 Generate an improved variant. Output only the system prompt text:",
                performance.avg_score, performance.sample_count
            )),
        ]
    }
}

#[async_trait]
impl VariantGenerator for LlmVariantGenerator {
    async fn generate_variants(
        &self,
        parent_strategy: &str,
        performance: &PerformanceSummary,
        k: usize,
    ) -> ServiceResult<Vec<String>> {
        let messages = Self::messages(parent_strategy, performance);
        let calls = (0..k).map(|_| {
            self.chat.chat(ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                json_mode: false,
            })
        });

        let variants: Vec<String> = try_join_all(calls).await?.into_iter().map(|reply| reply.content).collect();
        if variants.len() != k || variants.iter().any(|v| v.trim().is_empty()) {
            return Err(ServiceError::MalformedResponse(format!(
                "expected {k} non-empty variants, got {}",
                variants.iter().filter(|v| !v.trim().is_empty()).count()
            )));
        }

        debug!(k, parent_score = performance.avg_score, "Generated variants");
        Ok(variants)
    }
}

// ============================================================================
// Turn generator
// ============================================================================

pub struct LlmTurnGenerator {
    chat: Arc<dyn ChatModel>,
    model: String,
    temperature: f32,
}

impl LlmTurnGenerator {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            chat,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl TurnGenerator for LlmTurnGenerator {
    async fn next_message(&self, strategy: &str, transcript: &[Turn]) -> ServiceResult<Metered<String>> {
        let mut messages = Vec::with_capacity(2);
        if !strategy.trim().is_empty() {
            messages.push(ChatMessage::system(strategy));
        }
        if transcript.is_empty() {
            messages.push(ChatMessage::user(OPENING_INSTRUCTION));
        } else {
            messages.push(ChatMessage::user(format!(
                "Current conversation:\n\n{}\n\nGenerate the next message. Output only the exact message text:",
                format_transcript(transcript)
            )));
        }

        let reply = self
            .chat
            .chat(ChatRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                json_mode: false,
            })
            .await?;
        Ok(Metered::new(reply.content, reply.usage))
    }
}

// ============================================================================
// Responder
// ============================================================================

pub struct LlmResponder {
    chat: Arc<dyn ChatModel>,
    model: String,
}

impl LlmResponder {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(&self, scenario: &ScenarioConfig, transcript: &[Turn]) -> ServiceResult<Metered<String>> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage::system(format!(
            "{PERSONA_PROMPT}\n\nCurrent mood: {}.",
            scenario.mood.replace('_', " ")
        )));
        // From the persona's side the agent is the user.
        messages.extend(transcript.iter().map(|turn| match turn.role {
            Role::Agent => ChatMessage::user(&turn.content),
            Role::Persona => ChatMessage::assistant(&turn.content),
        }));

        let reply = self
            .chat
            .chat(ChatRequest {
                model: self.model.clone(),
                messages,
                temperature: 0.0,
                json_mode: false,
            })
            .await?;
        Ok(Metered::new(reply.content, reply.usage))
    }
}

// ============================================================================
// Critic
// ============================================================================

#[derive(Debug, Deserialize)]
struct Verdict {
    score: f64,
    #[serde(default)]
    rationale: Option<String>,
}

/// Parses the critic's JSON. Anything unusable yields [`NEUTRAL_SCORE`], logged.
pub fn parse_verdict(raw: &str) -> f64 {
    match serde_json::from_str::<Verdict>(raw) {
        Ok(verdict) if verdict.score.is_finite() && (0.0..=1.0).contains(&verdict.score) => {
            debug!(score = verdict.score, rationale = ?verdict.rationale, "Critic verdict");
            verdict.score
        }
        Ok(verdict) => {
            warn!(score = verdict.score, neutral = NEUTRAL_SCORE, "Critic score out of range; using neutral score");
            NEUTRAL_SCORE
        }
        Err(e) => {
            warn!(error = %e, neutral = NEUTRAL_SCORE, "Failed to parse critic response; using neutral score");
            NEUTRAL_SCORE
        }
    }
}

pub struct LlmCritic {
    chat: Arc<dyn ChatModel>,
    model: String,
}

impl LlmCritic {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Critic for LlmCritic {
    async fn score(&self, transcript: &[Turn]) -> ServiceResult<Metered<f64>> {
        let reply = self
            .chat
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage::system(CRITIC_PROMPT),
                    ChatMessage::user(format!("Conversation:\n\n{}", format_transcript(transcript))),
                ],
                temperature: 0.0,
                json_mode: true,
            })
            .await?;
        Ok(Metered::new(parse_verdict(&reply.content), reply.usage))
    }
}

/// Sums the usage of several metered results.
pub fn total_usage<'a, T: 'a>(items: impl IntoIterator<Item = &'a Metered<T>>) -> Usage {
    let mut total = Usage::default();
    for item in items {
        total.add(&item.usage);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::ChatReply;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and records requests.
    struct ScriptedChat {
        replies: Mutex<VecDeque<ServiceResult<String>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<ServiceResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn chat(&self, request: ChatRequest) -> ServiceResult<ChatReply> {
            self.requests.lock().unwrap().push(request);
            let next = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok("default".to_string()));
            next.map(|content| ChatReply {
                content,
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    cost_usd: 0.001,
                },
            })
        }
    }

    #[test]
    fn test_parse_verdict_valid() {
        assert_eq!(parse_verdict(r#"{"score": 0.72, "rationale": "asked about vesting"}"#), 0.72);
        assert_eq!(parse_verdict(r#"{"score": 1}"#), 1.0);
    }

    #[test]
    fn test_parse_verdict_falls_back_to_neutral() {
        assert_eq!(parse_verdict("not json"), 0.5);
        assert_eq!(parse_verdict(r#"{"rationale": "no score"}"#), 0.5);
        assert_eq!(parse_verdict(r#"{"score": 1.7}"#), 0.5);
        assert_eq!(parse_verdict(r#"{"score": -0.2}"#), NEUTRAL_SCORE);
    }

    #[tokio::test]
    async fn test_variant_generator_returns_k() {
        let chat = ScriptedChat::new(vec![Ok("a".into()), Ok("b".into()), Ok("c".into())]);
        let generator = LlmVariantGenerator::new(chat.clone(), "gpt-4o-mini", 0.9);

        let variants = generator
            .generate_variants("be helpful", &PerformanceSummary { avg_score: 0.4, sample_count: 3 }, 3)
            .await
            .unwrap();
        assert_eq!(variants.len(), 3);

        let requests = chat.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].messages[1].content.contains("Average Score: 0.400, Conversations Tested: 3"));
        assert!((requests[0].temperature - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_variant_generator_uses_seed_prompt_for_empty_parent() {
        let chat = ScriptedChat::new(vec![]);
        let generator = LlmVariantGenerator::new(chat.clone(), "gpt-4o-mini", 0.9);
        generator
            .generate_variants("", &PerformanceSummary::default(), 1)
            .await
            .unwrap();
        assert_eq!(chat.requests.lock().unwrap()[0].messages[0].content, SEED_MUTATOR_PROMPT);
    }

    #[tokio::test]
    async fn test_variant_generator_fails_whole_call() {
        let chat = ScriptedChat::new(vec![
            Ok("a".into()),
            Err(ServiceError::PolicyViolation("flagged".into())),
            Ok("c".into()),
        ]);
        let generator = LlmVariantGenerator::new(chat, "gpt-4o-mini", 0.9);
        let result = generator.generate_variants("p", &PerformanceSummary::default(), 3).await;
        assert!(matches!(result, Err(ServiceError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn test_responder_maps_roles_and_mood() {
        let chat = ScriptedChat::new(vec![Ok("Who is on the team?".into())]);
        let responder = LlmResponder::new(chat.clone(), "gpt-4o-mini");
        let scenario = ScenarioConfig::new("cold_outreach", "skeptical_but_listening", 8);

        let reply = responder.respond(&scenario, &[Turn::agent("Hi there")]).await.unwrap();
        assert_eq!(reply.value, "Who is on the team?");

        let requests = chat.requests.lock().unwrap();
        assert!(requests[0].messages[0].content.contains("skeptical but listening"));
        assert_eq!(requests[0].messages[1], ChatMessage::user("Hi there"));
    }

    #[tokio::test]
    async fn test_critic_uses_json_mode_and_neutral_default() {
        let chat = ScriptedChat::new(vec![Ok("garbage".into())]);
        let critic = LlmCritic::new(chat.clone(), "gpt-4o-mini");
        let scored = critic.score(&[Turn::agent("a"), Turn::persona("b")]).await.unwrap();
        assert_eq!(scored.value, NEUTRAL_SCORE);
        assert!(chat.requests.lock().unwrap()[0].json_mode);
    }

    #[tokio::test]
    async fn test_turn_generator_opening_and_follow_up() {
        let chat = ScriptedChat::new(vec![Ok("Opening".into()), Ok("Follow-up".into())]);
        let generator = LlmTurnGenerator::new(chat.clone(), "gpt-4o-mini", 0.9);

        let opening = generator.next_message("Be data driven.", &[]).await.unwrap();
        assert_eq!(opening.value, "Opening");
        let next = generator
            .next_message("Be data driven.", &[Turn::agent("Opening"), Turn::persona("Why?")])
            .await
            .unwrap();
        assert_eq!(next.value, "Follow-up");
        assert_eq!(total_usage([&opening, &next]).prompt_tokens, 20);

        let requests = chat.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0], ChatMessage::system("Be data driven."));
        assert_eq!(requests[0].messages[1].content, OPENING_INSTRUCTION);
        assert!(requests[1].messages[1].content.contains("Persona: Why?"));
    }
}
