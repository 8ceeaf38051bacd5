//! Map-backed store shared by the in-memory and JSON file backends

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{Document, QueueMutation, VenueStore};
use crate::models::{
    QueueChange, RequestStatus, TableId, TableRequest, TaskId, Venue, VenueId, VenueQueue,
    VenueTable,
};
use crate::Result;

/// Every logical table of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    pub venues: BTreeMap<VenueId, Venue>,
    pub queues: BTreeMap<VenueId, VenueQueue>,
    pub task_to_venue: BTreeMap<TaskId, VenueId>,
    pub song_titles: BTreeMap<TaskId, String>,
    pub tables: BTreeMap<VenueId, Vec<VenueTable>>,
    pub table_requests: BTreeMap<TableId, Vec<TableRequest>>,
}

/// Hook invoked after each mutation with the documents that changed
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save(&self, data: &StoreData, changed: &[Document]);
}

/// Persistence that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

#[async_trait]
impl Persistence for NoPersistence {
    async fn save(&self, _data: &StoreData, _changed: &[Document]) {}
}

/// [`VenueStore`] over in-memory maps behind one lock
#[derive(Debug, Default)]
pub struct MapStore<P> {
    data: RwLock<StoreData>,
    persistence: P,
}

/// Store that keeps everything in memory
pub type MemoryStore = MapStore<NoPersistence>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: Persistence> MapStore<P> {
    pub fn with_data(data: StoreData, persistence: P) -> Self {
        Self {
            data: RwLock::new(data),
            persistence,
        }
    }

    /// Copy of the full store contents
    pub async fn snapshot(&self) -> StoreData {
        self.data.read().await.clone()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }
}

#[async_trait]
impl<P: Persistence> VenueStore for MapStore<P> {
    async fn get_venue(&self, venue_id: &str) -> Result<Option<Venue>> {
        Ok(self.data.read().await.venues.get(venue_id).cloned())
    }

    async fn put_venue(&self, venue: Venue) -> Result<()> {
        let mut data = self.data.write().await;
        data.venues.insert(venue.id.clone(), venue);
        self.persistence.save(&data, &[Document::Venues]).await;
        Ok(())
    }

    async fn list_venues(&self) -> Result<Vec<Venue>> {
        Ok(self.data.read().await.venues.values().cloned().collect())
    }

    async fn queue(&self, venue_id: &str) -> Result<VenueQueue> {
        Ok(self
            .data
            .read()
            .await
            .queues
            .get(venue_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn modify_queue<'a>(
        &'a self,
        venue_id: &'a str,
        mutation: QueueMutation<'a>,
    ) -> Result<QueueChange> {
        let mut data = self.data.write().await;
        let queue = data.queues.entry(venue_id.to_string()).or_default();
        let change = mutation(queue);
        if change.is_changed() {
            self.persistence.save(&data, &[Document::Queues]).await;
        }
        Ok(change)
    }

    async fn track_task(&self, task_id: &str, venue_id: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.task_to_venue
            .insert(task_id.to_string(), venue_id.to_string());
        self.persistence.save(&data, &[Document::TaskToVenue]).await;
        Ok(())
    }

    async fn untrack_task(&self, task_id: &str) -> Result<Option<VenueId>> {
        let mut data = self.data.write().await;
        let removed = data.task_to_venue.remove(task_id);
        if removed.is_some() {
            self.persistence.save(&data, &[Document::TaskToVenue]).await;
        }
        Ok(removed)
    }

    async fn task_venue(&self, task_id: &str) -> Result<Option<VenueId>> {
        Ok(self.data.read().await.task_to_venue.get(task_id).cloned())
    }

    async fn pending_tasks(&self, venue_id: Option<&str>) -> Result<Vec<(TaskId, VenueId)>> {
        let data = self.data.read().await;
        Ok(data
            .task_to_venue
            .iter()
            .filter(|(_, v)| venue_id.map_or(true, |wanted| v.as_str() == wanted))
            .map(|(t, v)| (t.clone(), v.clone()))
            .collect())
    }

    async fn song_title(&self, task_id: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.song_titles.get(task_id).cloned())
    }

    async fn set_song_title(&self, task_id: &str, title: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.song_titles
            .insert(task_id.to_string(), title.to_string());
        self.persistence.save(&data, &[Document::SongTitles]).await;
        Ok(())
    }

    async fn tables(&self, venue_id: &str) -> Result<Vec<VenueTable>> {
        Ok(self
            .data
            .read()
            .await
            .tables
            .get(venue_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_table(&self, venue_id: &str, table: VenueTable) -> Result<()> {
        let mut data = self.data.write().await;
        let tables = data.tables.entry(venue_id.to_string()).or_default();
        match tables.iter_mut().find(|t| t.id == table.id) {
            Some(existing) => *existing = table,
            None => tables.push(table),
        }
        self.persistence.save(&data, &[Document::VenueTables]).await;
        Ok(())
    }

    async fn table_requests(&self, table_id: &str) -> Result<Vec<TableRequest>> {
        Ok(self
            .data
            .read()
            .await
            .table_requests
            .get(table_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_table_request(&self, table_id: &str, request: TableRequest) -> Result<()> {
        let mut data = self.data.write().await;
        data.table_requests
            .entry(table_id.to_string())
            .or_default()
            .push(request);
        self.persistence.save(&data, &[Document::TableRequests]).await;
        Ok(())
    }

    async fn set_request_status(&self, task_id: &str, status: RequestStatus) -> Result<usize> {
        let mut data = self.data.write().await;
        let mut updated = 0;
        for request in data
            .table_requests
            .values_mut()
            .flat_map(|requests| requests.iter_mut())
            .filter(|r| r.task_id == task_id)
        {
            if request.status != status {
                request.status = status;
                updated += 1;
            }
        }
        if updated > 0 {
            self.persistence.save(&data, &[Document::TableRequests]).await;
        }
        Ok(updated)
    }
}
