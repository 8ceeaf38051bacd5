//! Landing-page demo venues
//!
//! A demo venue's id is derived from its name and owner email, so asking
//! twice for the same business lands on the same venue.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use whatsthat_common::models::{qr_image_url, Venue};
use whatsthat_common::uuid_utils::SHORT_ID_LEN;

use super::queue::{refreshed_queue, QueueResponse};
use super::venue::load_venue;
use super::BaseUrl;
use crate::error::{ApiError, ApiResult};
use crate::services::{Receipt, SongRequest};
use crate::AppState;

/// Table id recorded for demo requests that name none
pub const DEMO_TABLE_ID: &str = "demo-table-1";

/// Stable demo venue id for a business
pub fn demo_venue_id(venue_name: &str, business_email: &str) -> String {
    let digest = Sha256::digest(format!("demo_{}_{}", venue_name, business_email).as_bytes());
    let mut id = format!("{:x}", digest);
    id.truncate(SHORT_ID_LEN);
    id
}

#[derive(Debug, Default, Deserialize)]
pub struct DemoRequest {
    #[serde(default)]
    pub venue_name: String,
    #[serde(default)]
    pub business_email: String,
    #[serde(default)]
    pub venue_type: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Serialize)]
pub struct DemoResponse {
    pub success: bool,
    pub demo_id: String,
    pub venue_name: String,
    /// QR image URL encoding `submit_url`
    pub qr_code: String,
    pub submit_url: String,
    pub stream_url: String,
}

/// POST /demo/generate
pub async fn generate_demo(
    State(state): State<AppState>,
    base: BaseUrl,
    payload: Result<Json<DemoRequest>, JsonRejection>,
) -> ApiResult<Json<DemoResponse>> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let venue_name = request.venue_name.trim();
    let business_email = request.business_email.trim();
    let city = request.city.trim();
    let venue_type = request.venue_type.trim();

    if venue_name.is_empty() || business_email.is_empty() || city.is_empty() {
        return Err(ApiError::BadRequest(
            "Venue name, city, and business email are required".to_string(),
        ));
    }

    let demo_id = demo_venue_id(venue_name, business_email);
    let mut venue = Venue::new(demo_id.clone(), venue_name);
    venue.owner_email = Some(business_email.to_string());
    venue.is_demo = true;
    venue.city = Some(city.to_string());
    venue.venue_type = Some(venue_type.to_string()).filter(|t| !t.is_empty());
    state.store.put_venue(venue).await?;

    info!(demo_id = %demo_id, city, "Demo venue generated");

    let submit_url = base.submit_url(&demo_id);
    Ok(Json(DemoResponse {
        success: true,
        venue_name: venue_name.to_string(),
        qr_code: qr_image_url(&submit_url),
        stream_url: base.stream_url(&demo_id),
        submit_url,
        demo_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DemoSubmitRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub table_id: Option<String>,
}

/// POST /demo/:demo_id/submit
pub async fn demo_submit(
    State(state): State<AppState>,
    Path(demo_id): Path<String>,
    base: BaseUrl,
    payload: Result<Json<DemoSubmitRequest>, JsonRejection>,
) -> ApiResult<Json<Receipt>> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    load_venue(&state, &demo_id).await?;

    let song = SongRequest {
        message: request.message,
        venue_id: Some(demo_id),
        table_id: Some(request.table_id.unwrap_or_else(|| DEMO_TABLE_ID.to_string())),
        genre: None,
    };
    let receipt = state.intake.submit(song, base.callback_base()).await?;
    Ok(Json(receipt))
}

/// GET /demo/:demo_id/queue
pub async fn demo_queue(
    State(state): State<AppState>,
    Path(demo_id): Path<String>,
) -> ApiResult<Json<QueueResponse>> {
    Ok(Json(refreshed_queue(&state, demo_id).await?))
}
