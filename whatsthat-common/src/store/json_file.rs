//! JSON file persistence
//!
//! One pretty-printed JSON object per logical table inside the data
//! directory. Each save rewrites the changed documents whole (temp file +
//! rename). Write failures are logged and never reach the caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::map::{MapStore, Persistence, StoreData};
use crate::Result;

/// One persisted document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Venues,
    Queues,
    TaskToVenue,
    SongTitles,
    VenueTables,
    TableRequests,
}

impl Document {
    pub const ALL: [Document; 6] = [
        Document::Venues,
        Document::Queues,
        Document::TaskToVenue,
        Document::SongTitles,
        Document::VenueTables,
        Document::TableRequests,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Document::Venues => "venue_metadata.json",
            Document::Queues => "venue_queues.json",
            Document::TaskToVenue => "task_to_venue.json",
            Document::SongTitles => "song_titles.json",
            Document::VenueTables => "venue_tables.json",
            Document::TableRequests => "table_requests.json",
        }
    }

    fn encode(self, data: &StoreData) -> serde_json::Result<Vec<u8>> {
        match self {
            Document::Venues => serde_json::to_vec_pretty(&data.venues),
            Document::Queues => serde_json::to_vec_pretty(&data.queues),
            Document::TaskToVenue => serde_json::to_vec_pretty(&data.task_to_venue),
            Document::SongTitles => serde_json::to_vec_pretty(&data.song_titles),
            Document::VenueTables => serde_json::to_vec_pretty(&data.tables),
            Document::TableRequests => serde_json::to_vec_pretty(&data.table_requests),
        }
    }
}

/// Writes store documents into a data directory
#[derive(Debug, Clone)]
pub struct JsonFiles {
    dir: PathBuf,
}

impl JsonFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, document: Document) -> PathBuf {
        self.dir.join(document.file_name())
    }

    /// Load every document; missing, unreadable or malformed ones start empty.
    pub async fn load(&self) -> StoreData {
        StoreData {
            venues: self.load_document(Document::Venues).await,
            queues: self.load_document(Document::Queues).await,
            task_to_venue: self.load_document(Document::TaskToVenue).await,
            song_titles: self.load_document(Document::SongTitles).await,
            tables: self.load_document(Document::VenueTables).await,
            table_requests: self.load_document(Document::TableRequests).await,
        }
    }

    async fn load_document<T: DeserializeOwned + Default>(&self, document: Document) -> T {
        let path = self.path_of(document);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", path.display());
                return T::default();
            }
            Err(e) => {
                error!("Error reading {}: {}", path.display(), e);
                return T::default();
            }
        };

        let value: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                error!("Error parsing {}: {}", path.display(), e);
                return T::default();
            }
        };
        if !value.is_object() {
            warn!("{} is not a JSON object, ignoring", path.display());
            return T::default();
        }

        match serde_json::from_value(value) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Error decoding {}: {}", path.display(), e);
                T::default()
            }
        }
    }

    async fn write_document(&self, document: Document, data: &StoreData) -> Result<()> {
        let bytes = document.encode(data)?;
        write_atomic(&self.path_of(document), &bytes).await
    }
}

#[async_trait]
impl Persistence for JsonFiles {
    async fn save(&self, data: &StoreData, changed: &[Document]) {
        for document in changed {
            if let Err(e) = self.write_document(*document, data).await {
                error!(
                    "Failed to save {} to {}: {}",
                    document.file_name(),
                    self.dir.display(),
                    e
                );
            }
        }
    }
}

/// Write `bytes` to a sibling temp file, flush it to disk, then rename over `path`
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Store mirrored to JSON documents
pub type JsonFileStore = MapStore<JsonFiles>;

impl JsonFileStore {
    /// Open the store in `dir`, creating the directory and loading any
    /// documents already there.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let files = JsonFiles::new(dir);
        tokio::fs::create_dir_all(files.dir()).await?;

        let data = files.load().await;
        info!(
            "Loaded {} venues, {} queues, {} pending tasks from {}",
            data.venues.len(),
            data.queues.len(),
            data.task_to_venue.len(),
            files.dir().display()
        );

        let store = MapStore::with_data(data, files);
        Ok(store)
    }

    /// Rewrite every document
    pub async fn flush_all(&self) {
        let data = self.snapshot().await;
        self.persistence().save(&data, &Document::ALL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SongQueueEntry, Venue, VenueQueue};
    use crate::store::VenueStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.put_venue(Venue::new("ab12cd34", "Blue Note")).await.unwrap();
            store.track_task("task-1", "ab12cd34").await.unwrap();
            store
                .modify_queue(
                    "ab12cd34",
                    Box::new(|q: &mut VenueQueue| {
                        q.push(SongQueueEntry::generating("task-1", "Late Train"))
                    }),
                )
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        let venue = reopened.get_venue("ab12cd34").await.unwrap().unwrap();
        assert_eq!(venue.name, "Blue Note");
        assert_eq!(
            reopened.task_venue("task-1").await.unwrap().as_deref(),
            Some("ab12cd34")
        );
        let queue = reopened.queue("ab12cd34").await.unwrap();
        assert_eq!(queue.head().unwrap().title, "Late Train");
    }

    #[tokio::test]
    async fn test_files_named_per_table() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.set_song_title("task-1", "Hello").await.unwrap();

        assert!(dir.path().join("song_titles.json").exists());
        assert!(!dir.path().join("song_titles.json.tmp").exists());

        store.flush_all().await;
        for document in Document::ALL {
            assert!(dir.path().join(document.file_name()).exists());
        }
    }

    #[tokio::test]
    async fn test_malformed_documents_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("venue_metadata.json"), b"[1, 2, 3]").unwrap();
        std::fs::write(dir.path().join("task_to_venue.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("song_titles.json"), br#"{"task-9": "Kept"}"#).unwrap();

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.list_venues().await.unwrap().is_empty());
        assert!(store.pending_tasks(None).await.unwrap().is_empty());
        assert_eq!(
            store.song_title("task-9").await.unwrap().as_deref(),
            Some("Kept")
        );
    }
}
