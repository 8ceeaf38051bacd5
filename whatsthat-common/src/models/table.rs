//! Venue tables and the song requests made from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TableId, TaskId};

/// QR image service used for venue and table links
const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/?size=300x300&data=";

/// Third-party QR image URL encoding `data`
pub fn qr_image_url(data: &str) -> String {
    format!("{}{}", QR_SERVICE_URL, data)
}

/// A table with its own submit link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueTable {
    pub id: TableId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub submit_url: String,
    pub qr_code: String,
}

/// Progress of a request made from a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Processing,
    Completed,
    Failed,
}

/// One generation request made from a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRequest {
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    pub status: RequestStatus,
}

impl TableRequest {
    pub fn processing(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: task_id.into(),
            timestamp: crate::time::now(),
            status: RequestStatus::Processing,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RequestStatus::Processing
    }
}
