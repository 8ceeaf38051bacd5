//! Venue administration endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use whatsthat_common::models::{qr_image_url, Venue, VenueTable};
use whatsthat_common::{genre, time, uuid_utils};

use super::tables::TableView;
use super::BaseUrl;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Load a venue or fail with 404
pub(crate) async fn load_venue(state: &AppState, venue_id: &str) -> ApiResult<Venue> {
    state
        .store
        .get_venue(venue_id)
        .await?
        .ok_or_else(ApiError::venue_not_found)
}

/// Body of a JSON request that may be missing entirely
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    payload.map(|Json(body)| body).unwrap_or_default()
}

/// `allowed_genres` as sent by the settings page; anything but a list is rejected
fn parse_genre_list(value: Option<Value>) -> ApiResult<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(genre::retain_known(
            items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        )),
        Some(_) => Err(ApiError::BadRequest(
            "allowed_genres must be a list".to_string(),
        )),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVenueRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub num_tables: Option<u32>,
    #[serde(default)]
    pub owner_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateVenueResponse {
    pub venue_id: String,
    pub submit_url: String,
    pub stream_url: String,
    pub submit_qr: String,
    pub stream_qr: String,
    pub tables: Vec<TableView>,
}

/// POST /venue/create
pub async fn create_venue(
    State(state): State<AppState>,
    base: BaseUrl,
    payload: Result<Json<CreateVenueRequest>, JsonRejection>,
) -> ApiResult<Json<CreateVenueResponse>> {
    let request = body_or_default(payload);
    let venue_id = uuid_utils::short_id();

    let name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Venue {}", venue_id));

    let mut venue = Venue::new(venue_id.clone(), name);
    venue.owner_email = request.owner_email.filter(|e| !e.trim().is_empty());
    state.store.put_venue(venue).await?;

    let mut tables = Vec::new();
    for n in 1..=request.num_tables.unwrap_or(0) {
        let table_id = uuid_utils::short_id();
        let submit_url = base.table_submit_url(&venue_id, &table_id);
        let table = VenueTable {
            id: table_id,
            name: format!("Table {}", n),
            created_at: time::now(),
            qr_code: qr_image_url(&submit_url),
            submit_url,
        };
        state.store.put_table(&venue_id, table.clone()).await?;
        tables.push(TableView::from(table));
    }

    info!(venue_id = %venue_id, tables = tables.len(), "Venue created");

    let submit_url = base.submit_url(&venue_id);
    let stream_url = base.stream_url(&venue_id);
    Ok(Json(CreateVenueResponse {
        submit_qr: qr_image_url(&submit_url),
        stream_qr: qr_image_url(&stream_url),
        venue_id,
        submit_url,
        stream_url,
        tables,
    }))
}

#[derive(Debug, Serialize)]
pub struct VenueInfoResponse {
    pub success: bool,
    pub venue_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub queue_length: usize,
    pub tables: Vec<TableView>,
    pub submit_url: String,
    pub stream_url: String,
    pub submit_qr: String,
    pub stream_qr: String,
}

/// GET /venue/:venue_id/info
pub async fn venue_info(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    base: BaseUrl,
) -> ApiResult<Json<VenueInfoResponse>> {
    let venue = load_venue(&state, &venue_id).await?;
    let queue = state.store.queue(&venue_id).await?;
    let tables = state
        .store
        .tables(&venue_id)
        .await?
        .into_iter()
        .map(TableView::from)
        .collect();

    let submit_url = base.submit_url(&venue_id);
    let stream_url = base.stream_url(&venue_id);
    Ok(Json(VenueInfoResponse {
        success: true,
        name: venue.name,
        created_at: venue.created_at,
        queue_length: queue.len(),
        tables,
        submit_qr: qr_image_url(&submit_url),
        stream_qr: qr_image_url(&stream_url),
        submit_url,
        stream_url,
        venue_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVenueRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateVenueResponse {
    pub success: bool,
    pub venue_id: String,
    pub name: String,
}

/// POST /venue/:venue_id/update
///
/// A blank name leaves the venue unchanged.
pub async fn update_venue(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    payload: Result<Json<UpdateVenueRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateVenueResponse>> {
    let mut venue = load_venue(&state, &venue_id).await?;
    let name = body_or_default(payload).name.trim().to_string();

    if !name.is_empty() && name != venue.name {
        venue.name = name;
        state.store.put_venue(venue.clone()).await?;
        info!(venue_id = %venue_id, "Venue renamed");
    }

    Ok(Json(UpdateVenueResponse {
        success: true,
        venue_id,
        name: venue.name,
    }))
}

#[derive(Debug, Serialize)]
pub struct GenresResponse {
    pub success: bool,
    pub venue_id: String,
    pub allowed_genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_genres: Option<Vec<String>>,
}

/// GET /venue/:venue_id/genres
pub async fn get_genres(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> ApiResult<Json<GenresResponse>> {
    let venue = load_venue(&state, &venue_id).await?;
    Ok(Json(GenresResponse {
        success: true,
        venue_id,
        allowed_genres: venue.allowed_genres,
        all_genres: Some(genre::default_allowed()),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenresRequest {
    #[serde(default)]
    pub allowed_genres: Option<Value>,
}

/// POST /venue/:venue_id/genres
///
/// Unknown genres are dropped; an empty list lifts the restriction.
pub async fn update_genres(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    payload: Result<Json<GenresRequest>, JsonRejection>,
) -> ApiResult<Json<GenresResponse>> {
    let mut venue = load_venue(&state, &venue_id).await?;
    let allowed_genres = parse_genre_list(body_or_default(payload).allowed_genres)?;

    venue.allowed_genres = allowed_genres.clone();
    state.store.put_venue(venue).await?;
    info!(venue_id = %venue_id, genres = ?allowed_genres, "Allowed genres updated");

    Ok(Json(GenresResponse {
        success: true,
        venue_id,
        allowed_genres,
        all_genres: None,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub allowed_genres: Option<Value>,
    #[serde(default)]
    pub explicit_content: Option<bool>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub venue_id: String,
    pub allowed_genres: Vec<String>,
    pub explicit_content: Option<bool>,
    pub custom_instructions: Option<String>,
}

/// POST /venue/:venue_id/settings
///
/// `explicit_content: null` and blank instructions clear those settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    payload: Result<Json<SettingsRequest>, JsonRejection>,
) -> ApiResult<Json<SettingsResponse>> {
    let mut venue = load_venue(&state, &venue_id).await?;
    let request = body_or_default(payload);

    venue.allowed_genres = parse_genre_list(request.allowed_genres)?;
    venue.explicit_content = request.explicit_content;
    venue.custom_instructions = request
        .custom_instructions
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty());

    let response = SettingsResponse {
        success: true,
        venue_id: venue_id.clone(),
        allowed_genres: venue.allowed_genres.clone(),
        explicit_content: venue.explicit_content,
        custom_instructions: venue.custom_instructions.clone(),
    };

    state.store.put_venue(venue).await?;
    info!(venue_id = %venue_id, "Venue settings updated");

    Ok(Json(response))
}
