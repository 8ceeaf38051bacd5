//! Task reconciler
//!
//! Merges generation signals into venue queues. Signals arrive two ways:
//! pushed to `/callback/music`, or pulled by polling `record-info` for every
//! tracked task. Both paths end in [`Reconciler::apply`], which:
//!
//! - ignores tasks no longer tracked (already terminal, failed, or never
//!   dispatched for a venue);
//! - creates or updates the task's queue entry in one atomic store step, so
//!   a callback racing a poll still yields a single entry;
//! - stops tracking once a stream or audio URL is known;
//! - drops the task on an upstream error without touching the queue.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use whatsthat_common::events::{EventBus, QueueEvent};
use whatsthat_common::models::{
    QueueChange, RequestStatus, TrackUpdate, VenueQueue, DEFAULT_SONG_TITLE,
};
use whatsthat_common::{Result, SharedStore};

use super::dispatcher::DISABLED_MESSAGE;
use super::suno_client::{self, GenerationApi, TaskStatus};

/// What [`Reconciler::apply`] did with a signal
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Task is not tracked; nothing changed
    Untracked,
    /// No track data yet; task stays tracked
    Pending,
    /// Track data merged; `completed` when tracking stopped
    Merged { change: QueueChange, completed: bool },
    /// Upstream error; task dropped
    Failed,
}

/// Counters of one polling sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub polled: usize,
    pub completed: usize,
    pub failed: usize,
    /// Tasks whose status could not be fetched this time
    pub unreachable: usize,
}

/// One-shot status report for `/status/:task_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusReport {
    Processing {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stream_url: Option<String>,
    },
    Success {
        message: String,
        audio_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stream_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Error {
        message: String,
    },
    Disabled {
        message: String,
    },
}

pub struct Reconciler {
    store: SharedStore,
    events: EventBus,
    api: Option<Arc<dyn GenerationApi>>,
}

impl Reconciler {
    pub fn new(store: SharedStore, events: EventBus, api: Option<Arc<dyn GenerationApi>>) -> Self {
        Self { store, events, api }
    }

    /// Merge one signal for `task_id` into its venue queue
    pub async fn apply(&self, task_id: &str, status: &TaskStatus) -> Result<ReconcileOutcome> {
        match status {
            TaskStatus::Pending => {
                debug!(task_id, "Task still processing (no tracks yet)");
                Ok(ReconcileOutcome::Pending)
            }
            TaskStatus::Failed(message) => self.fail(task_id, message).await,
            TaskStatus::Track(update) => self.merge(task_id, update).await,
        }
    }

    async fn fail(&self, task_id: &str, message: &str) -> Result<ReconcileOutcome> {
        warn!(task_id, "Generation API error: {}", message);

        let venue_id = self.store.untrack_task(task_id).await?;
        self.store
            .set_request_status(task_id, RequestStatus::Failed)
            .await?;

        if let Some(venue_id) = venue_id {
            info!(task_id, venue_id = %venue_id, "Dropped failed task");
            self.events.emit_lossy(QueueEvent::TaskFailed {
                venue_id,
                task_id: task_id.to_string(),
                message: message.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(ReconcileOutcome::Failed)
    }

    async fn merge(&self, task_id: &str, update: &TrackUpdate) -> Result<ReconcileOutcome> {
        let Some(venue_id) = self.store.task_venue(task_id).await? else {
            debug!(task_id, "Ignoring track data for untracked task");
            return Ok(ReconcileOutcome::Untracked);
        };

        let fallback_title = match self.store.song_title(task_id).await? {
            Some(cached) => cached,
            None => update
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_SONG_TITLE.to_string()),
        };

        let mutation_update = update.clone();
        let mutation_task = task_id.to_string();
        let change = self
            .store
            .modify_queue(
                &venue_id,
                Box::new(move |queue: &mut VenueQueue| {
                    queue.apply_track(&mutation_task, &fallback_title, &mutation_update)
                }),
            )
            .await?;

        self.publish(&venue_id, &change);

        let completed = update.is_terminal();
        if completed {
            self.store.untrack_task(task_id).await?;
            self.store
                .set_request_status(task_id, RequestStatus::Completed)
                .await?;
            info!(
                task_id,
                venue_id = %venue_id,
                stream = update.stream_url.is_some(),
                audio = update.audio_url.is_some(),
                "Task complete, stopped tracking"
            );
        } else {
            debug!(task_id, "Track data has no playable URL yet");
        }

        Ok(ReconcileOutcome::Merged { change, completed })
    }

    fn publish(&self, venue_id: &str, change: &QueueChange) {
        let timestamp = Utc::now();
        match change {
            QueueChange::Inserted(entry) => {
                self.events.emit_lossy(QueueEvent::EntryAdded {
                    venue_id: venue_id.to_string(),
                    entry: entry.clone(),
                    timestamp,
                });
                if entry.is_ready() {
                    self.events.emit_lossy(QueueEvent::EntryReady {
                        venue_id: venue_id.to_string(),
                        entry: entry.clone(),
                        timestamp,
                    });
                }
            }
            QueueChange::Updated(entry) if entry.is_ready() => {
                self.events.emit_lossy(QueueEvent::EntryReady {
                    venue_id: venue_id.to_string(),
                    entry: entry.clone(),
                    timestamp,
                });
            }
            _ => {}
        }
    }

    /// Handle a `/callback/music` payload.
    ///
    /// `Err` carries the message reported back to the caller when the
    /// payload signals an upstream error.
    pub async fn handle_callback(&self, payload: &Value) -> std::result::Result<(), String> {
        let data = payload.get("data").unwrap_or(&Value::Null);
        let task_id = ["task_id", "taskId"]
            .iter()
            .filter_map(|key| data.get(*key).and_then(Value::as_str))
            .find(|id| !id.is_empty())
            .map(str::to_string);
        let callback_type = data
            .get("callbackType")
            .and_then(Value::as_str)
            .unwrap_or_default();

        info!(task_id = ?task_id, callback_type, "Generation callback received");

        if suno_client::envelope_code(payload) != Some(200) {
            let message = suno_client::envelope_message(payload);
            if let Some(task_id) = &task_id {
                if let Err(e) = self.apply(task_id, &TaskStatus::Failed(message.clone())).await {
                    error!(task_id = %task_id, "Failed to drop task: {}", e);
                }
            }
            return Err(format!("Suno API error: {}", message));
        }

        if !matches!(callback_type, "first" | "complete") {
            debug!(callback_type, "Callback carries no track data");
            return Ok(());
        }

        let Some(first) = data
            .get("data")
            .and_then(Value::as_array)
            .and_then(|tracks| tracks.first())
        else {
            return Ok(());
        };
        let Some(task_id) = task_id else {
            warn!("Callback with tracks but no task id");
            return Ok(());
        };

        let update = suno_client::parse_track(first);
        if let Some(title) = &update.title {
            if let Err(e) = self.store.set_song_title(&task_id, title).await {
                error!(task_id = %task_id, "Failed to cache song title: {}", e);
            }
        }

        if let Err(e) = self.apply(&task_id, &TaskStatus::Track(update)).await {
            error!(task_id = %task_id, "Failed to apply callback: {}", e);
            return Err(e.to_string());
        }
        Ok(())
    }

    /// Poll every tracked task (or only `venue_id`'s) once.
    ///
    /// Failures of one task never stop the sweep.
    pub async fn poll_pending(&self, venue_id: Option<&str>) -> PollSummary {
        let mut summary = PollSummary::default();
        let Some(api) = &self.api else {
            return summary;
        };

        let pending = match self.store.pending_tasks(venue_id).await {
            Ok(pending) => pending,
            Err(e) => {
                error!("Failed to list pending tasks: {}", e);
                return summary;
            }
        };
        if pending.is_empty() {
            return summary;
        }

        debug!("Polling {} pending task(s)", pending.len());

        for (task_id, owner) in pending {
            summary.polled += 1;
            let status = match api.task_status(&task_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(task_id = %task_id, venue_id = %owner, "Polling failed: {}", e);
                    summary.unreachable += 1;
                    continue;
                }
            };

            match self.apply(&task_id, &status).await {
                Ok(ReconcileOutcome::Merged { completed: true, .. }) => summary.completed += 1,
                Ok(ReconcileOutcome::Failed) => summary.failed += 1,
                Ok(_) => {}
                Err(e) => error!(task_id = %task_id, "Failed to apply poll result: {}", e),
            }
        }

        if summary.completed > 0 || summary.failed > 0 {
            info!(
                polled = summary.polled,
                completed = summary.completed,
                failed = summary.failed,
                "Poll sweep finished"
            );
        }
        summary
    }

    /// Ask the generation API about one task without touching any queue
    pub async fn status(&self, task_id: &str) -> StatusReport {
        let Some(api) = &self.api else {
            return StatusReport::Disabled {
                message: DISABLED_MESSAGE.to_string(),
            };
        };

        match api.task_status(task_id).await {
            Err(e) => StatusReport::Error {
                message: e.to_string(),
            },
            Ok(TaskStatus::Failed(message)) => StatusReport::Error { message },
            Ok(TaskStatus::Pending) => StatusReport::Processing {
                message: "Music is being generated...".to_string(),
                stream_url: None,
            },
            Ok(TaskStatus::Track(update)) => match update.audio_url {
                Some(audio_url) => StatusReport::Success {
                    message: "Music generated successfully!".to_string(),
                    audio_url,
                    stream_url: update.stream_url,
                    title: update.title,
                },
                None => StatusReport::Processing {
                    message: "Music is being generated...".to_string(),
                    stream_url: update.stream_url,
                },
            },
        }
    }
}
