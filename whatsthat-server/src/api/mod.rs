//! HTTP API handlers for whatsthat-server

pub mod buildinfo;
pub mod callback;
pub mod demo;
pub mod health;
pub mod queue;
pub mod sse;
pub mod status;
pub mod submit;
pub mod tables;
pub mod venue;

pub use buildinfo::get_build_info;
pub use health::health_routes;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

use crate::AppState;

/// Externally reachable origin for links handed to guests and the
/// generation API: the configured public base URL, else `http://<Host>`.
///
/// Empty when neither is known; links are then relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(pub String);

impl BaseUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Origin usable as a callback target, if it is absolute
    pub fn callback_base(&self) -> Option<&str> {
        Some(self.0.as_str()).filter(|base| base.starts_with("http"))
    }

    pub fn submit_url(&self, venue_id: &str) -> String {
        format!("{}/venue/{}/submit", self.0, venue_id)
    }

    pub fn stream_url(&self, venue_id: &str) -> String {
        format!("{}/venue/{}/stream", self.0, venue_id)
    }

    pub fn table_submit_url(&self, venue_id: &str, table_id: &str) -> String {
        format!("{}/venue/{}/table/{}/submit", self.0, venue_id, table_id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(base) = &state.public_base_url {
            return Ok(BaseUrl(base.clone()));
        }

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty());

        Ok(BaseUrl(
            host.map(|h| format!("http://{}", h)).unwrap_or_default(),
        ))
    }
}
