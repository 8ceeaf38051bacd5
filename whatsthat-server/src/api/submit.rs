//! Guest song submission

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::BaseUrl;
use crate::error::{ApiError, ApiResult};
use crate::services::{Receipt, SongRequest};
use crate::AppState;

/// POST /send
///
/// Body: `{message, venue_id?, table_id?, genre?}`. Validation failures are
/// 400s; generation failures come back inside `music_generation`.
pub async fn send_message(
    State(state): State<AppState>,
    base: BaseUrl,
    payload: Result<Json<SongRequest>, JsonRejection>,
) -> ApiResult<Json<Receipt>> {
    let Ok(Json(request)) = payload else {
        return Err(ApiError::BadRequest("No JSON data received".to_string()));
    };

    let receipt = state.intake.submit(request, base.callback_base()).await?;
    Ok(Json(receipt))
}
