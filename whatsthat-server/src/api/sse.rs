//! Server-Sent Events for one venue's queue
//!
//! Streams events:
//! - ConnectionStatus (once, on connect)
//! - EntryAdded, EntryReady, EntryRemoved, TaskFailed (JSON payloads)

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

/// GET /venue/:venue_id/events
pub async fn venue_events(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(venue_id = %venue_id, "New SSE client connected");

    let mut rx = state.events.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.venue_id() != venue_id {
                        continue;
                    }
                    match Event::default().event(event.event_type()).json_data(&event) {
                        Ok(sse_event) => {
                            debug!(venue_id = %venue_id, "Sending SSE event: {}", event.event_type());
                            yield Ok(sse_event);
                        }
                        Err(e) => warn!("Failed to serialize event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(venue_id = %venue_id, "SSE client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }

        debug!(venue_id = %venue_id, "SSE stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
