//! OpenAI-compatible chat completions client.
//!
//! Every call goes through moderation of user content, prompt truncation, client-side rate
//! limiting and bounded retry of transient failures. Successful calls are priced and recorded
//! in the shared [`BudgetTracker`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ChatMessage, ChatModel, ChatReply, ChatRequest};
use crate::domain::errors::{ServiceError, ServiceResult};
use crate::domain::models::{LlmConfig, Usage};
use crate::services::budget_tracker::BudgetTracker;
use crate::services::retry::RetryPolicy;

/// Characters per token used for prompt truncation.
const CHARS_PER_TOKEN: usize = 4;

/// Messages shorter than this after truncation are dropped instead of kept as a stub.
const MIN_TRUNCATED_CHARS: usize = 100;

// ============================================================================
// Pricing
// ============================================================================

/// USD per 1K tokens as `(model, input, output)`.
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    ("gpt-4", 0.03, 0.06),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4o", 0.0025, 0.01),
    ("gpt-4o-mini", 0.000_15, 0.0006),
    ("gpt-3.5-turbo", 0.0005, 0.0015),
    ("gpt-3.5-turbo-16k", 0.001, 0.002),
    ("deepseek/deepseek-chat-v3-0324", 0.000_14, 0.000_28),
];

/// Models missing from the table are priced as `gpt-3.5-turbo`.
const FALLBACK_PRICE: (f64, f64) = (0.0005, 0.0015);

/// Cost in USD of one call.
pub fn cost_for(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let (input, output) = PRICE_TABLE
        .iter()
        .find(|(name, _, _)| *name == model)
        .map_or(FALLBACK_PRICE, |(_, input, output)| (*input, *output));
    (prompt_tokens as f64 / 1000.0) * input + (completion_tokens as f64 / 1000.0) * output
}

// ============================================================================
// Truncation
// ============================================================================

/// Fits `messages` into `max_chars` characters.
///
/// The final message is kept whole when possible. Earlier messages are kept in order while
/// they fit; the first one that does not is cut (with a trailing `...`) if enough room
/// remains, and everything after it up to the final message is dropped.
pub fn truncate_messages(messages: &[ChatMessage], max_chars: usize) -> Vec<ChatMessage> {
    let total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    if total <= max_chars {
        return messages.to_vec();
    }

    let Some((last, head)) = messages.split_last() else {
        return Vec::new();
    };

    let last_len = last.content.chars().count();
    if last_len >= max_chars {
        return vec![ChatMessage {
            role: last.role.clone(),
            content: cut(&last.content, max_chars),
        }];
    }

    let mut budget = max_chars - last_len;
    let mut kept = Vec::with_capacity(messages.len());
    for message in head {
        let len = message.content.chars().count();
        if len <= budget {
            budget -= len;
            kept.push(message.clone());
            continue;
        }
        if budget > MIN_TRUNCATED_CHARS {
            debug!(role = %message.role, from = len, to = budget, "Truncated chat message");
            kept.push(ChatMessage {
                role: message.role.clone(),
                content: cut(&message.content, budget),
            });
        }
        break;
    }
    kept.push(last.clone());
    kept
}

fn cut(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

// ============================================================================
// Error classification
// ============================================================================

/// Maps a non-success HTTP status to a service error.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let message = format!("{status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ServiceError::Transient(message)
    } else if body.contains("content_policy") || body.contains("content_filter") {
        ServiceError::PolicyViolation(message)
    } else {
        ServiceError::Failed(message)
    }
}

pub(crate) fn classify_transport(err: &reqwest::Error, timeout: Duration) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(timeout)
    } else if err.is_decode() {
        ServiceError::MalformedResponse(err.to_string())
    } else if err.is_connect() || err.is_request() {
        ServiceError::Transient(err.to_string())
    } else {
        ServiceError::Failed(err.to_string())
    }
}

/// Resolves the API key from config, then `OPENAI_API_KEY`.
pub(crate) fn resolve_api_key(configured: Option<&str>) -> ServiceResult<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ServiceError::Failed("API key not set. Set OPENAI_API_KEY or llm.api_key.".to_string()))
}

// ============================================================================
// Client
// ============================================================================

pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_prompt_chars: usize,
    moderation: bool,
    request_timeout: Duration,
    retry: RetryPolicy,
    limiter: Arc<DefaultDirectRateLimiter>,
    budget: BudgetTracker,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig, retry: RetryPolicy, budget: BudgetTracker) -> ServiceResult<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Failed(format!("failed to build HTTP client: {e}")))?;
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_prompt_chars: config.max_prompt_tokens.saturating_mul(CHARS_PER_TOKEN),
            moderation: config.moderation,
            request_timeout,
            retry,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            budget,
        })
    }

    /// Flags user content through `/moderations`. Fails open when the endpoint errors.
    async fn check_moderation(&self, messages: &[ChatMessage]) -> ServiceResult<()> {
        let inputs: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }

        self.limiter.until_ready().await;
        let response = self
            .http
            .post(format!("{}/moderations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ModerationRequest { input: inputs })
            .send()
            .await;

        let result: ModerationResponse = match response {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "Moderation response unreadable; allowing content");
                    return Ok(());
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "Moderation check failed; allowing content");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Moderation check failed; allowing content");
                return Ok(());
            }
        };

        if let Some(flagged) = result.results.iter().find(|r| r.flagged) {
            let categories: Vec<&str> = flagged
                .categories
                .iter()
                .filter(|(_, hit)| **hit)
                .map(|(name, _)| name.as_str())
                .collect();
            warn!(?categories, "Content flagged by moderation");
            return Err(ServiceError::PolicyViolation(format!(
                "content flagged: {}",
                categories.join(", ")
            )));
        }
        Ok(())
    }

    async fn send_once(&self, body: &CompletionRequest<'_>) -> ServiceResult<CompletionResponse> {
        self.limiter.until_ready().await;
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(classify_status(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("chat completion: {e}")))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn chat(&self, request: ChatRequest) -> ServiceResult<ChatReply> {
        if self.moderation {
            self.check_moderation(&request.messages).await?;
        }

        let messages = truncate_messages(&request.messages, self.max_prompt_chars);
        let body = CompletionRequest {
            model: &request.model,
            messages: &messages,
            temperature: request.temperature,
            response_format: request.json_mode.then(|| ResponseFormat { kind: "json_object" }),
        };

        let response = self.retry.execute("chat_completion", || self.send_once(&body)).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::MalformedResponse("no choices in completion".to_string()))?;
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ServiceError::PolicyViolation("completion stopped by content filter".to_string()));
        }
        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::MalformedResponse("empty completion content".to_string()))?;

        let (prompt_tokens, completion_tokens) = response
            .usage
            .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));
        let cost_usd = cost_for(&request.model, prompt_tokens, completion_tokens);
        self.budget.record(cost_usd).await;

        let total = self.budget.snapshot().await.spent_usd;
        info!(
            model = %request.model,
            prompt_tokens,
            completion_tokens,
            cost_usd,
            total_usd = total,
            "chat call"
        );

        Ok(ChatReply {
            content: content.trim().to_string(),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                cost_usd,
            },
        })
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: std::collections::BTreeMap<String, bool>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
