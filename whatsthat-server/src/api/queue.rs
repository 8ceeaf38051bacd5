//! Venue queue endpoints used by the playback page

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use whatsthat_common::events::QueueEvent;
use whatsthat_common::models::{QueueChange, SongQueueEntry, VenueQueue};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub venue_id: String,
    pub queue: Vec<SongQueueEntry>,
    pub queue_length: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveRequest {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Poll the venue's pending tasks, then snapshot its queue
pub(crate) async fn refreshed_queue(state: &AppState, venue_id: String) -> ApiResult<QueueResponse> {
    state.reconciler.poll_pending(Some(&venue_id)).await;

    let queue = state.store.queue(&venue_id).await?;
    let entries: Vec<SongQueueEntry> = queue.into();
    Ok(QueueResponse {
        venue_id,
        queue_length: entries.len(),
        queue: entries,
    })
}

/// GET /venue/:venue_id/queue
pub async fn get_queue(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> ApiResult<Json<QueueResponse>> {
    Ok(Json(refreshed_queue(&state, venue_id).await?))
}

/// GET /venue/:venue_id/queue/next
pub async fn next_song(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let queue = state.store.queue(&venue_id).await?;
    Ok(Json(match queue.head() {
        Some(song) => json!({"status": "success", "song": song}),
        None => json!({"status": "empty", "message": "Queue is empty"}),
    }))
}

/// POST /venue/:venue_id/queue/remove
///
/// Removes `task_id` when given, otherwise the head of the queue.
pub async fn remove_song(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    payload: Result<Json<RemoveRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let task_id = payload
        .ok()
        .and_then(|Json(request)| request.task_id)
        .filter(|id| !id.is_empty());

    let by_task = task_id.is_some();
    let change = state
        .store
        .modify_queue(
            &venue_id,
            Box::new(move |queue: &mut VenueQueue| match &task_id {
                Some(task_id) => queue.remove_task(task_id),
                None => queue.pop_head(),
            }),
        )
        .await?;

    if let QueueChange::Removed(entry) = &change {
        info!(venue_id = %venue_id, task_id = %entry.task_id, "Removed song from queue");
        state.events.emit_lossy(QueueEvent::EntryRemoved {
            venue_id: venue_id.clone(),
            task_id: entry.task_id.clone(),
            timestamp: Utc::now(),
        });
    }

    Ok(Json(match (by_task, change) {
        (true, _) => json!({"status": "success", "message": "Song removed"}),
        (false, QueueChange::Removed(removed)) => json!({"status": "success", "removed": removed}),
        (false, _) => json!({"status": "error", "message": "Queue is empty"}),
    }))
}
