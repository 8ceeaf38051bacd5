//! Generation dispatcher
//!
//! Turns a guest prompt into a generation task and records where the result
//! belongs (venue queue, table request).

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use whatsthat_common::genre;
use whatsthat_common::models::{TableRequest, TaskId};
use whatsthat_common::SharedStore;

use super::suno_client::GenerationApi;

/// Upstream prompt limit in non-custom mode
pub const MAX_PROMPT_CHARS: usize = 500;

/// Message returned when no generation API key is configured
pub const DISABLED_MESSAGE: &str = "SUNO_API_KEY not configured on server";

/// Result of a dispatch, reported to the guest as `music_generation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DispatchOutcome {
    Processing {
        task_id: TaskId,
        message: String,
        venue_id: Option<String>,
        table_id: Option<String>,
    },
    Error {
        message: String,
    },
    Disabled {
        message: String,
    },
}

impl DispatchOutcome {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Processing { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

/// One guest request to dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest<'a> {
    pub prompt: &'a str,
    pub venue_id: Option<&'a str>,
    pub table_id: Option<&'a str>,
    pub genre: Option<&'a str>,
    /// Origin the generation API should call back to
    pub callback_base: Option<&'a str>,
}

/// Build the upstream prompt: genre hint, explicit-lyrics hint, length cap
pub fn build_prompt(prompt: &str, genre: Option<&str>, explicit: Option<bool>) -> String {
    let mut full = match genre {
        Some(genre) => format!("Make a {} song about: {}", genre, prompt),
        None => format!("Make a full vocal song about: {}", prompt),
    };

    match explicit {
        Some(true) => full.push_str(" Use explicit lyrics."),
        Some(false) => full.push_str(" Use clean, non-explicit lyrics only."),
        None => {}
    }

    if full.chars().count() > MAX_PROMPT_CHARS {
        full = full.chars().take(MAX_PROMPT_CHARS).collect();
    }
    full
}

/// Sends prompts to the generation API
pub struct Dispatcher {
    store: SharedStore,
    api: Option<Arc<dyn GenerationApi>>,
}

impl Dispatcher {
    /// `api` is `None` when generation is not configured
    pub fn new(store: SharedStore, api: Option<Arc<dyn GenerationApi>>) -> Self {
        Self { store, api }
    }

    pub fn is_enabled(&self) -> bool {
        self.api.is_some()
    }

    pub async fn dispatch(&self, request: DispatchRequest<'_>) -> DispatchOutcome {
        let Some(api) = &self.api else {
            warn!("Generation requested but no API key is configured");
            return DispatchOutcome::Disabled {
                message: DISABLED_MESSAGE.to_string(),
            };
        };

        let genre = request
            .genre
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .or_else(|| genre::detect_genre(request.prompt));

        let explicit = match request.venue_id {
            Some(venue_id) => match self.store.get_venue(venue_id).await {
                Ok(venue) => venue.and_then(|v| v.explicit_content),
                Err(e) => {
                    error!(venue_id, "Failed to load venue settings: {}", e);
                    None
                }
            },
            None => None,
        };

        let prompt = build_prompt(request.prompt, genre, explicit);
        let callback_url = request
            .callback_base
            .filter(|base| base.starts_with("http"))
            .map(|base| format!("{}/callback/music", base.trim_end_matches('/')));

        info!(genre = ?genre, callback = ?callback_url, "Dispatching generation request");

        let task_id = match api.generate(&prompt, callback_url.as_deref()).await {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!("Generation request failed: {}", e);
                return DispatchOutcome::Error {
                    message: e.to_string(),
                };
            }
        };

        if let Some(venue_id) = request.venue_id {
            if let Err(e) = self.store.track_task(&task_id, venue_id).await {
                error!(task_id = %task_id, venue_id, "Failed to track task: {}", e);
            }
        } else {
            warn!(task_id = %task_id, "Task has no venue; it will not be queued");
        }

        if let Some(table_id) = request.table_id {
            if let Err(e) = self
                .store
                .add_table_request(table_id, TableRequest::processing(task_id.clone()))
                .await
            {
                error!(task_id = %task_id, table_id, "Failed to record table request: {}", e);
            }
        }

        info!(task_id = %task_id, venue_id = ?request.venue_id, "Generation started");

        DispatchOutcome::Processing {
            task_id,
            message: "Music generation started".to_string(),
            venue_id: request.venue_id.map(str::to_string),
            table_id: request.table_id.map(str::to_string),
        }
    }
}
