//! Venue store interface
//!
//! All shared state (venues, queues, task tracking, titles, tables) lives
//! behind [`VenueStore`] so callers never touch global maps. Implementations:
//! - [`MemoryStore`]: mutex-guarded maps, nothing persisted
//! - [`JsonFileStore`]: the same maps mirrored to one JSON document per table
//! - `SqliteStore` (feature `sqlx`): transactional tables
//!
//! Queue mutations go through [`VenueStore::modify_queue`], which runs the
//! mutation as one atomic read-modify-write of the venue's queue. Concurrent
//! callback and poll paths for the same task therefore cannot both insert.

mod json_file;
mod map;

pub use json_file::{Document, JsonFiles, JsonFileStore};
pub use map::{MapStore, MemoryStore, NoPersistence, Persistence, StoreData};

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    QueueChange, RequestStatus, TableRequest, TaskId, Venue, VenueId, VenueQueue, VenueTable,
};
use crate::Result;

/// A queue mutation executed atomically by [`VenueStore::modify_queue`]
pub type QueueMutation<'a> = Box<dyn FnOnce(&mut VenueQueue) -> QueueChange + Send + 'a>;

/// Store handle shared across request handlers
pub type SharedStore = Arc<dyn VenueStore>;

#[async_trait]
pub trait VenueStore: Send + Sync {
    // ---- venues ----

    async fn get_venue(&self, venue_id: &str) -> Result<Option<Venue>>;

    /// Insert or replace a venue
    async fn put_venue(&self, venue: Venue) -> Result<()>;

    async fn list_venues(&self) -> Result<Vec<Venue>>;

    // ---- queues ----

    /// Snapshot of a venue queue (empty if the venue has none)
    async fn queue(&self, venue_id: &str) -> Result<VenueQueue>;

    /// Run `mutation` against the venue queue as one atomic step and persist
    /// the result if anything changed.
    async fn modify_queue<'a>(
        &'a self,
        venue_id: &'a str,
        mutation: QueueMutation<'a>,
    ) -> Result<QueueChange>;

    // ---- task tracking ----

    async fn track_task(&self, task_id: &str, venue_id: &str) -> Result<()>;

    /// Stop tracking a task; returns the venue it belonged to.
    /// Untracking an unknown task is a no-op returning `None`.
    async fn untrack_task(&self, task_id: &str) -> Result<Option<VenueId>>;

    async fn task_venue(&self, task_id: &str) -> Result<Option<VenueId>>;

    /// Tracked tasks, optionally restricted to one venue
    async fn pending_tasks(&self, venue_id: Option<&str>) -> Result<Vec<(TaskId, VenueId)>>;

    // ---- song titles ----

    async fn song_title(&self, task_id: &str) -> Result<Option<String>>;

    async fn set_song_title(&self, task_id: &str, title: &str) -> Result<()>;

    // ---- tables ----

    /// Tables of a venue in creation order
    async fn tables(&self, venue_id: &str) -> Result<Vec<VenueTable>>;

    /// Insert a table or replace the one with the same id
    async fn put_table(&self, venue_id: &str, table: VenueTable) -> Result<()>;

    async fn table_requests(&self, table_id: &str) -> Result<Vec<TableRequest>>;

    async fn add_table_request(&self, table_id: &str, request: TableRequest) -> Result<()>;

    /// Set the status of every table request made for `task_id`;
    /// returns how many requests were updated.
    async fn set_request_status(&self, task_id: &str, status: RequestStatus) -> Result<usize>;
}
