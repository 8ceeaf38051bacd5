//! Prompt assistant
//!
//! Optional chat-completion helpers used during intake: the venue rule
//! filter and the provisional song title. Both fail open: without an API
//! key, or when the upstream call fails, the guest's request goes through
//! unchanged and the title falls back to a heuristic.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use whatsthat_common::models::DEFAULT_SONG_TITLE;

const CHAT_MODEL: &str = "gpt-3.5-turbo";
const FILTER_TIMEOUT: Duration = Duration::from_secs(10);
const TITLE_TIMEOUT: Duration = Duration::from_secs(8);

const TITLE_MAX_CHARS: usize = 60;
const TITLE_CUT_CHARS: usize = 57;
const HEURISTIC_MAX_CHARS: usize = 80;
const HEURISTIC_CUT_CHARS: usize = 77;

/// Rejection reason used when the filter gives none
pub const DEFAULT_REJECTION: &str = "This song request violates venue rules.";

/// Chat completion errors
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty reply")]
    EmptyReply,
}

/// Outcome of checking a request against venue rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterVerdict {
    #[serde(default)]
    pub rejected: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub modified: bool,
    #[serde(default)]
    pub modified_message: Option<String>,
}

impl FilterVerdict {
    /// Verdict that lets the request through untouched
    pub fn pass() -> Self {
        Self::default()
    }

    /// Rejection reason, or the default one
    pub fn rejection_reason(&self) -> &str {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECTION)
    }

    /// Replacement message, if the filter rewrote the request
    pub fn replacement(&self) -> Option<&str> {
        if !self.modified {
            return None;
        }
        self.modified_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// OpenAI-compatible chat completion client
#[derive(Debug, Clone)]
struct ChatClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, AssistantError> {
        let payload = json!({
            "model": CHAT_MODEL,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AssistantError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(AssistantError::Api(status.as_u16(), snippet));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Parse(e.to_string()))?;

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AssistantError::EmptyReply)
    }
}

/// Venue rule filter and song title generator
#[derive(Debug, Clone, Default)]
pub struct PromptAssistant {
    chat: Option<ChatClient>,
}

impl PromptAssistant {
    /// Assistant backed by the chat API at `base_url`; `None` key disables it
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AssistantError> {
        let Some(api_key) = api_key else {
            return Ok(Self::disabled());
        };

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| AssistantError::Network(e.to_string()))?;

        Ok(Self {
            chat: Some(ChatClient {
                http_client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
        })
    }

    /// Assistant that only uses the local fallbacks
    pub fn disabled() -> Self {
        Self { chat: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.chat.is_some()
    }

    /// Check `message` against the venue's `instructions`
    pub async fn filter_request(&self, message: &str, instructions: &str) -> FilterVerdict {
        let Some(chat) = &self.chat else {
            debug!("Chat API key not set, skipping request filter");
            return FilterVerdict::pass();
        };

        let user = format!(
            "You are a gatekeeper for a music venue's song request system. The venue has set these custom rules:\n\n\
             {instructions}\n\n\
             A guest has submitted this song request: \"{message}\"\n\n\
             Your task:\n\
             1. If the request violates the rules, respond with JSON: {{\"rejected\": true, \"reason\": \"explanation of why it was rejected\"}}\n\
             2. If the request is acceptable but needs modification to comply with rules, respond with JSON: {{\"rejected\": false, \"modified\": true, \"modified_message\": \"the modified request\"}}\n\
             3. If the request is fine as-is, respond with JSON: {{\"rejected\": false, \"modified\": false}}\n\n\
             Only respond with valid JSON, nothing else."
        );

        let reply = chat
            .complete(
                "You are a helpful assistant that filters song requests based on venue rules. Always respond with valid JSON only.",
                &user,
                0.3,
                200,
                FILTER_TIMEOUT,
            )
            .await;

        match reply.and_then(|content| parse_filter_reply(&content)) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Request filter failed, letting request through: {}", e);
                FilterVerdict::pass()
            }
        }
    }

    /// Short display title for a guest prompt
    pub async fn provisional_title(&self, prompt: &str) -> String {
        if prompt.trim().is_empty() {
            return DEFAULT_SONG_TITLE.to_string();
        }
        let Some(chat) = &self.chat else {
            return heuristic_title(prompt);
        };

        let user = format!(
            "You are naming songs for a bar's live AI music system. \
             Given what a guest requested, create a short, catchy song title (max 40 characters). \
             Return ONLY the title text, no quotes, no extra words.\n\n\
             Guest request: {prompt}"
        );

        match chat
            .complete(
                "You generate short, catchy song titles.",
                &user,
                0.6,
                30,
                TITLE_TIMEOUT,
            )
            .await
        {
            Ok(content) => clean_title(&content).unwrap_or_else(|| heuristic_title(prompt)),
            Err(e) => {
                warn!("Title generation failed, using heuristic: {}", e);
                heuristic_title(prompt)
            }
        }
    }
}

/// Parse the filter's JSON reply, tolerating a markdown code fence
pub fn parse_filter_reply(content: &str) -> Result<FilterVerdict, AssistantError> {
    let json = strip_code_fence(content.trim());
    serde_json::from_str(json).map_err(|e| AssistantError::Parse(format!("{}: {}", e, content)))
}

fn strip_code_fence(content: &str) -> &str {
    if !content.starts_with("```") {
        return content;
    }
    let inner = content.split("```").nth(1).unwrap_or_default();
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Tidy a model-generated title; `None` if nothing usable is left
pub fn clean_title(raw: &str) -> Option<String> {
    let title = raw.trim().trim_matches('"').trim_matches('\'').trim();
    if title.is_empty() {
        return None;
    }
    Some(shorten(title, TITLE_MAX_CHARS, TITLE_CUT_CHARS))
}

/// Title derived from the prompt text itself
pub fn heuristic_title(prompt: &str) -> String {
    let flattened = prompt.trim().replace('\n', " ");
    let title = shorten(&flattened, HEURISTIC_MAX_CHARS, HEURISTIC_CUT_CHARS);
    if title.is_empty() {
        DEFAULT_SONG_TITLE.to_string()
    } else {
        title
    }
}

/// Leave `text` alone up to `max` chars; otherwise keep the first `cut`
/// chars, drop the trailing partial word and append `...`.
fn shorten(text: &str, max: usize, cut: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(cut).collect();
    let head = match head.rsplit_once(' ') {
        Some((before, _)) => before.to_string(),
        None => head,
    };
    format!("{}...", head)
}
