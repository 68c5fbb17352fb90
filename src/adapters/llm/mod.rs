//! Chat-model adapters for generation, simulation and scoring.

pub mod agents;
pub mod client;

pub use agents::{LlmCritic, LlmResponder, LlmTurnGenerator, LlmVariantGenerator, NEUTRAL_SCORE};
pub use client::{cost_for, truncate_messages, OpenAiChatClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ServiceResult;
use crate::domain::models::{Role, Turn, Usage};

/// One chat message in OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Ask for a JSON object response.
    pub json_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub usage: Usage,
}

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> ServiceResult<ChatReply>;
}

/// Renders a transcript as `Agent: ...` / `Persona: ...` lines.
pub fn format_transcript(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::Agent => "Agent",
                Role::Persona => "Persona",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
