//! One-shot task status lookup

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::services::StatusReport;
use crate::AppState;

/// GET /status/:task_id
///
/// Asks the generation API directly; venue queues are left alone.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<StatusReport> {
    let report = state.reconciler.status(&task_id).await;
    debug!(task_id = %task_id, report = ?report, "Status lookup");
    Json(report)
}
