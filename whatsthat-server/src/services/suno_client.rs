//! Suno-compatible music generation client
//!
//! Two calls: `POST /api/v1/generate` starts a task and returns its id,
//! `GET /api/v1/generate/record-info` reports its progress. Both use bearer
//! auth and wrap their payload in `{code, msg, data}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use whatsthat_common::models::{TaskId, TrackUpdate};

const USER_AGENT: &str = concat!("whatsthat-server/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const GENERATION_MODEL: &str = "V5";

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status without a usable error body
    #[error("HTTP {0}")]
    Http(u16),

    /// The API answered with a non-200 `code`
    #[error("{0}")]
    Api(String),

    #[error("No taskId returned from Suno")]
    MissingTaskId,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Upstream view of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// No track data yet
    Pending,
    /// First track of the task
    Track(TrackUpdate),
    /// The API reported a non-success code
    Failed(String),
}

/// Music generation backend
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Start generating a song for `prompt`; returns the task id
    async fn generate(
        &self,
        prompt: &str,
        callback_url: Option<&str>,
    ) -> Result<TaskId, GenerationError>;

    /// Fetch the current status of `task_id`.
    ///
    /// `Err` means the status could not be obtained (transport, HTTP or
    /// parse failure); the task should be asked about again later.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, GenerationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    custom_mode: bool,
    instrumental: bool,
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_back_url: Option<&'a str>,
}

/// HTTP client for a Suno-compatible API
#[derive(Debug, Clone)]
pub struct SunoClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SunoClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl GenerationApi for SunoClient {
    async fn generate(
        &self,
        prompt: &str,
        callback_url: Option<&str>,
    ) -> Result<TaskId, GenerationError> {
        let body = GenerateBody {
            custom_mode: false,
            instrumental: false,
            model: GENERATION_MODEL,
            prompt,
            call_back_url: callback_url,
        };

        debug!(callback = ?callback_url, "Sending generate request");

        let response = self
            .http_client
            .post(format!("{}/api/v1/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        let payload: Option<Value> = response.json().await.ok();

        let envelope_ok = payload
            .as_ref()
            .map(|p| envelope_code(p) == Some(200))
            .unwrap_or(false);
        if !status.is_success() || !envelope_ok {
            let message = payload
                .as_ref()
                .and_then(|p| p.get("msg"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(GenerationError::Api(message));
        }

        payload
            .as_ref()
            .and_then(|p| p.pointer("/data/taskId"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or(GenerationError::MissingTaskId)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, GenerationError> {
        let response = self
            .http_client
            .get(format!("{}/api/v1/generate/record-info", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Http(status.as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        Ok(parse_record_info(&payload))
    }
}

/// Interpret a `record-info` body
pub fn parse_record_info(payload: &Value) -> TaskStatus {
    if envelope_code(payload) != Some(200) {
        return TaskStatus::Failed(envelope_message(payload));
    }

    let response = payload.pointer("/data/response");
    let tracks = response
        .and_then(|r| r.get("sunoData").or_else(|| r.get("suno_data")))
        .and_then(Value::as_array);

    match tracks.and_then(|t| t.first()) {
        Some(first) => TaskStatus::Track(parse_track(first)),
        None => TaskStatus::Pending,
    }
}

/// Read the fields of one upstream track, accepting every known spelling
pub fn parse_track(track: &Value) -> TrackUpdate {
    TrackUpdate {
        title: first_string(track, &["title", "song_name"]),
        stream_url: first_string(track, &["stream_audio_url", "streamAudioUrl", "stream_url"]),
        audio_url: first_string(track, &["audio_url", "audioUrl"]),
    }
}

/// `code` of a `{code, msg, data}` envelope
pub fn envelope_code(payload: &Value) -> Option<i64> {
    payload.get("code").and_then(Value::as_i64)
}

/// `msg` of a `{code, msg, data}` envelope
pub fn envelope_message(payload: &Value) -> String {
    payload
        .get("msg")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
