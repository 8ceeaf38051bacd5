//! # WhatsThat Common Library
//!
//! Shared code for the WhatsThat venue song-request service:
//! - Venue, queue and table models
//! - The venue store interface with in-memory, JSON file and SQLite backends
//! - Queue event types and the event bus
//! - Configuration loading and root folder resolution
//! - Genre catalog and keyword detection

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod genre;
pub mod models;
pub mod store;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use store::{SharedStore, VenueStore};
