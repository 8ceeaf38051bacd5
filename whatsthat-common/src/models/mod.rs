//! Domain models shared by the store backends and the HTTP service

mod queue;
mod table;
mod venue;

pub use queue::{EntryStatus, QueueChange, SongQueueEntry, TrackUpdate, VenueQueue, DEFAULT_SONG_TITLE};
pub use table::{qr_image_url, RequestStatus, TableRequest, VenueTable};
pub use venue::Venue;

/// Venue identifier (8 hex characters)
pub type VenueId = String;

/// Table identifier (8 hex characters)
pub type TableId = String;

/// Generation task identifier issued by the music-generation API
pub type TaskId = String;
