//! Guest request intake
//!
//! Validates a song request against the venue's settings, archives the text,
//! dispatches it and appends a `generating` placeholder to the venue queue.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use whatsthat_common::events::{EventBus, QueueEvent};
use whatsthat_common::models::{QueueChange, SongQueueEntry, VenueQueue};
use whatsthat_common::{time, SharedStore};

use super::assistant::PromptAssistant;
use super::dispatcher::{DispatchOutcome, DispatchRequest, Dispatcher};

/// Song request as posted by the guest page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SongRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
}

/// Reply to an accepted request
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub success: bool,
    /// `HH:MM:SS`
    pub timestamp: String,
    /// Message as dispatched (after any filter rewrite)
    pub message: String,
    pub music_generation: DispatchOutcome,
    pub venue_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Empty message")]
    EmptyMessage,

    #[error("Genre \"{genre}\" is not allowed for this venue. Allowed genres: {}", .allowed.join(", "))]
    GenreNotAllowed { genre: String, allowed: Vec<String> },

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Store(#[from] whatsthat_common::Error),
}

pub struct Intake {
    store: SharedStore,
    dispatcher: Arc<Dispatcher>,
    assistant: PromptAssistant,
    events: EventBus,
    messages_dir: PathBuf,
}

impl Intake {
    pub fn new(
        store: SharedStore,
        dispatcher: Arc<Dispatcher>,
        assistant: PromptAssistant,
        events: EventBus,
        messages_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            dispatcher,
            assistant,
            events,
            messages_dir,
        }
    }

    /// Accept a guest request.
    ///
    /// Generation failures are reported inside the receipt; only validation
    /// failures and venue lookups return `Err`.
    pub async fn submit(
        &self,
        request: SongRequest,
        callback_base: Option<&str>,
    ) -> Result<Receipt, IntakeError> {
        let mut message = request.message.trim().to_string();
        if message.is_empty() {
            return Err(IntakeError::EmptyMessage);
        }

        let venue_id = non_blank(request.venue_id);
        let table_id = non_blank(request.table_id);
        let genre = non_blank(request.genre);

        info!(venue_id = ?venue_id, table_id = ?table_id, genre = ?genre, "Song request received");

        let venue = match &venue_id {
            Some(id) => self.store.get_venue(id).await?,
            None => None,
        };

        if let (Some(venue), Some(genre)) = (&venue, &genre) {
            if !venue.allows_genre(genre) {
                warn!(venue_id = %venue.id, genre = %genre, "Genre not allowed");
                return Err(IntakeError::GenreNotAllowed {
                    genre: genre.clone(),
                    allowed: venue.allowed_genres.clone(),
                });
            }
        }

        if let Some(instructions) = venue.as_ref().and_then(|v| v.active_instructions()) {
            let verdict = self.assistant.filter_request(&message, instructions).await;
            if verdict.rejected {
                info!(venue_id = ?venue_id, "Request rejected by venue rules");
                return Err(IntakeError::Rejected(verdict.rejection_reason().to_string()));
            }
            if let Some(replacement) = verdict.replacement() {
                debug!("Request rewritten by venue rules");
                message = replacement.to_string();
            }
        }

        self.archive(&message).await;

        let outcome = self
            .dispatcher
            .dispatch(DispatchRequest {
                prompt: &message,
                venue_id: venue_id.as_deref(),
                table_id: table_id.as_deref(),
                genre: genre.as_deref(),
                callback_base,
            })
            .await;

        if let (Some(venue_id), Some(task_id)) = (&venue_id, outcome.task_id()) {
            self.add_placeholder(venue_id, task_id, &message).await;
        }

        Ok(Receipt {
            success: true,
            timestamp: time::clock_display(time::now()),
            message,
            music_generation: outcome,
            venue_id,
        })
    }

    /// Write the request text to `message_<stamp>.txt`; failures are logged
    async fn archive(&self, message: &str) {
        let path = self
            .messages_dir
            .join(format!("message_{}.txt", time::file_stamp(time::now())));

        if let Err(e) = tokio::fs::create_dir_all(&self.messages_dir).await {
            error!("Failed to create messages directory: {}", e);
            return;
        }
        match tokio::fs::write(&path, message).await {
            Ok(()) => debug!("Saved message to {}", path.display()),
            Err(e) => error!("Failed to save message to {}: {}", path.display(), e),
        }
    }

    async fn add_placeholder(&self, venue_id: &str, task_id: &str, message: &str) {
        let title = self.assistant.provisional_title(message).await;

        if let Err(e) = self.store.set_song_title(task_id, &title).await {
            error!(task_id, "Failed to cache song title: {}", e);
        }

        let entry = SongQueueEntry::generating(task_id, title);
        let change = self
            .store
            .modify_queue(
                venue_id,
                Box::new(move |queue: &mut VenueQueue| queue.push(entry)),
            )
            .await;

        match change {
            Ok(QueueChange::Inserted(entry)) => {
                info!(task_id, venue_id, title = %entry.title, "Added generating placeholder");
                self.events.emit_lossy(QueueEvent::EntryAdded {
                    venue_id: venue_id.to_string(),
                    entry,
                    timestamp: Utc::now(),
                });
            }
            // a callback already created the entry
            Ok(_) => debug!(task_id, "Queue entry already exists"),
            Err(e) => error!(task_id, venue_id, "Failed to add placeholder entry: {}", e),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
