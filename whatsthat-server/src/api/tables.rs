//! Venue table endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use whatsthat_common::models::{qr_image_url, TableRequest, VenueTable};
use whatsthat_common::{time, uuid_utils};

use super::venue::load_venue;
use super::BaseUrl;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Requests newer than this count as live
const LIVE_WINDOW_MINUTES: i64 = 10;

/// A table as reported to the admin pages
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub table_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub submit_url: String,
    pub qr_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_count: Option<usize>,
}

impl From<VenueTable> for TableView {
    fn from(table: VenueTable) -> Self {
        Self {
            table_id: table.id,
            name: table.name,
            created_at: table.created_at,
            submit_url: table.submit_url,
            qr_code: table.qr_code,
            request_count: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TableNameRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTableResponse {
    pub success: bool,
    pub table_id: String,
    pub name: String,
    pub submit_url: String,
    pub qr_code: String,
}

/// POST /venue/:venue_id/tables
pub async fn create_table(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    base: BaseUrl,
    payload: Result<Json<TableNameRequest>, JsonRejection>,
) -> ApiResult<Json<CreateTableResponse>> {
    load_venue(&state, &venue_id).await?;

    let name = payload
        .map(|Json(body)| body.name.trim().to_string())
        .unwrap_or_default();
    let table_id = uuid_utils::short_id();
    let submit_url = base.table_submit_url(&venue_id, &table_id);

    let table = VenueTable {
        name: if name.is_empty() {
            format!("Table {}", table_id)
        } else {
            name
        },
        id: table_id,
        created_at: time::now(),
        qr_code: qr_image_url(&submit_url),
        submit_url,
    };
    state.store.put_table(&venue_id, table.clone()).await?;
    info!(venue_id = %venue_id, table_id = %table.id, "Table created");

    Ok(Json(CreateTableResponse {
        success: true,
        table_id: table.id,
        name: table.name,
        submit_url: table.submit_url,
        qr_code: table.qr_code,
    }))
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub success: bool,
    pub venue_id: String,
    pub tables: Vec<TableView>,
}

/// GET /venue/:venue_id/tables
pub async fn list_tables(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> ApiResult<Json<TablesResponse>> {
    load_venue(&state, &venue_id).await?;

    let mut tables = Vec::new();
    for table in state.store.tables(&venue_id).await? {
        let request_count = state.store.table_requests(&table.id).await?.len();
        let mut view = TableView::from(table);
        view.request_count = Some(request_count);
        tables.push(view);
    }

    Ok(Json(TablesResponse {
        success: true,
        venue_id,
        tables,
    }))
}

#[derive(Debug, Serialize)]
pub struct UpdateTableResponse {
    pub success: bool,
    pub table_id: String,
    pub name: String,
}

/// POST /venue/:venue_id/table/:table_id/update
pub async fn update_table(
    State(state): State<AppState>,
    Path((venue_id, table_id)): Path<(String, String)>,
    payload: Result<Json<TableNameRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateTableResponse>> {
    load_venue(&state, &venue_id).await?;

    let mut table = state
        .store
        .tables(&venue_id)
        .await?
        .into_iter()
        .find(|t| t.id == table_id)
        .ok_or_else(ApiError::table_not_found)?;

    let name = payload
        .map(|Json(body)| body.name.trim().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "Table name cannot be empty".to_string(),
        ));
    }

    table.name = name.clone();
    state.store.put_table(&venue_id, table).await?;
    info!(venue_id = %venue_id, table_id = %table_id, "Table renamed");

    Ok(Json(UpdateTableResponse {
        success: true,
        table_id,
        name,
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveTableStatus {
    pub table_id: String,
    pub name: String,
    pub has_active_request: bool,
    pub recent_request_count: usize,
    pub last_request_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LiveTablesResponse {
    pub success: bool,
    pub venue_id: String,
    pub venue_name: String,
    pub tables: Vec<LiveTableStatus>,
}

/// Summarize a table's requests made after `cutoff`
pub fn live_status(table: &VenueTable, requests: &[TableRequest], cutoff: DateTime<Utc>) -> LiveTableStatus {
    let recent: Vec<&TableRequest> = requests.iter().filter(|r| r.timestamp > cutoff).collect();

    LiveTableStatus {
        table_id: table.id.clone(),
        name: table.name.clone(),
        has_active_request: recent.iter().any(|r| r.is_active()),
        recent_request_count: recent.len(),
        last_request_time: recent.last().map(|r| r.timestamp),
    }
}

/// GET /venue/:venue_id/live-tables/status
pub async fn live_tables_status(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> ApiResult<Json<LiveTablesResponse>> {
    let venue = load_venue(&state, &venue_id).await?;
    let cutoff = time::now() - Duration::minutes(LIVE_WINDOW_MINUTES);

    let mut tables = Vec::new();
    for table in state.store.tables(&venue_id).await? {
        let requests = state.store.table_requests(&table.id).await?;
        tables.push(live_status(&table, &requests, cutoff));
    }

    Ok(Json(LiveTablesResponse {
        success: true,
        venue_id,
        venue_name: venue.name,
        tables,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatsthat_common::models::RequestStatus;

    fn table() -> VenueTable {
        VenueTable {
            id: "t1".into(),
            name: "Patio".into(),
            created_at: time::now(),
            submit_url: "/venue/v1/table/t1/submit".into(),
            qr_code: qr_image_url("/venue/v1/table/t1/submit"),
        }
    }

    fn request(task: &str, minutes_ago: i64, status: RequestStatus) -> TableRequest {
        TableRequest {
            task_id: task.into(),
            timestamp: time::now() - Duration::minutes(minutes_ago),
            status,
        }
    }

    #[test]
    fn test_live_status_ignores_old_requests() {
        let cutoff = time::now() - Duration::minutes(LIVE_WINDOW_MINUTES);
        let requests = vec![
            request("old", 30, RequestStatus::Processing),
            request("a", 5, RequestStatus::Completed),
            request("b", 1, RequestStatus::Failed),
        ];

        let status = live_status(&table(), &requests, cutoff);
        assert_eq!(status.recent_request_count, 2);
        assert!(!status.has_active_request);
        assert_eq!(status.last_request_time, Some(requests[2].timestamp));
    }

    #[test]
    fn test_live_status_active_request() {
        let cutoff = time::now() - Duration::minutes(LIVE_WINDOW_MINUTES);
        let requests = vec![request("a", 2, RequestStatus::Processing)];
        assert!(live_status(&table(), &requests, cutoff).has_active_request);

        let idle = live_status(&table(), &[], cutoff);
        assert_eq!(idle.recent_request_count, 0);
        assert_eq!(idle.last_request_time, None);
    }
}
