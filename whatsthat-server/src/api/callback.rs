//! Generation API callbacks
//!
//! Both endpoints always answer 200 so the generation API does not retry.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::AppState;

/// POST /callback/music
pub async fn music_callback(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Json<Value> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(e) => {
            warn!("Unreadable music callback: {}", e);
            return Json(json!({"success": false, "error": "No JSON data received"}));
        }
    };

    match state.reconciler.handle_callback(&payload).await {
        Ok(()) => Json(json!({"success": true})),
        Err(message) => Json(json!({"success": false, "error": message})),
    }
}

/// POST /callback/wav
///
/// WAV conversion results are acknowledged and otherwise ignored.
pub async fn wav_callback(payload: Result<Json<Value>, JsonRejection>) -> Json<Value> {
    match payload {
        Ok(Json(payload)) => debug!(payload = %payload, "WAV callback received"),
        Err(e) => warn!("Unreadable WAV callback: {}", e),
    }
    Json(json!({"success": true}))
}
