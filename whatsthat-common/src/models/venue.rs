//! Venue metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::VenueId;
use crate::genre;

/// A venue guests can request songs for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    #[serde(default)]
    pub owner_email: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Genres guests may pick; an empty list places no restriction
    #[serde(default = "genre::default_allowed")]
    pub allowed_genres: Vec<String>,
    /// `None` leaves lyric style to the generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_content: Option<bool>,
    /// Free-form venue rules applied by the prompt filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub is_demo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Venue {
    /// New venue allowing the full genre catalog
    pub fn new(id: impl Into<VenueId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_email: None,
            created_at: crate::time::now(),
            allowed_genres: genre::default_allowed(),
            explicit_content: None,
            custom_instructions: None,
            is_demo: false,
            venue_type: None,
            city: None,
        }
    }

    /// Whether guests may request `genre` here
    pub fn allows_genre(&self, genre: &str) -> bool {
        self.allowed_genres.is_empty() || self.allowed_genres.iter().any(|g| g == genre)
    }

    /// Custom instructions, if any non-blank ones are set
    pub fn active_instructions(&self) -> Option<&str> {
        self.custom_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
