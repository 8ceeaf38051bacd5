//! Per-venue song queue
//!
//! A [`VenueQueue`] holds at most one entry per task id. Entries are only
//! appended; they leave the queue through explicit removal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;
use crate::time;

/// Title used when neither a provisional nor an upstream title is known
pub const DEFAULT_SONG_TITLE: &str = "Custom Song";

/// Lifecycle of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Task dispatched, no playable URL yet
    Generating,
    /// A stream or audio URL is attached
    Ready,
}

/// One song's bookkeeping record within a venue queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongQueueEntry {
    pub task_id: TaskId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    /// `HH:MM:SS` display time of insertion
    pub added_at: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl SongQueueEntry {
    /// New entry in `generating` state stamped with the current time
    pub fn generating(task_id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        let timestamp = time::now();
        Self {
            task_id: task_id.into(),
            title: title.into(),
            timestamp,
            added_at: time::clock_display(timestamp),
            status: EntryStatus::Generating,
            stream_url: None,
            audio_url: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == EntryStatus::Ready
    }
}

/// Track data extracted from a generation signal (first track only)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub stream_url: Option<String>,
    pub audio_url: Option<String>,
}

impl TrackUpdate {
    /// A stream or audio URL ends tracking of the task
    pub fn is_terminal(&self) -> bool {
        self.stream_url.is_some() || self.audio_url.is_some()
    }
}

/// Outcome of a single queue mutation
#[derive(Debug, Clone, PartialEq)]
pub enum QueueChange {
    Inserted(SongQueueEntry),
    Updated(SongQueueEntry),
    Removed(SongQueueEntry),
    Unchanged,
}

impl QueueChange {
    /// The entry affected by the mutation, if any
    pub fn entry(&self) -> Option<&SongQueueEntry> {
        match self {
            QueueChange::Inserted(e) | QueueChange::Updated(e) | QueueChange::Removed(e) => Some(e),
            QueueChange::Unchanged => None,
        }
    }

    pub fn is_changed(&self) -> bool {
        !matches!(self, QueueChange::Unchanged)
    }
}

/// Ordered playback list of one venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<SongQueueEntry>", into = "Vec<SongQueueEntry>")]
pub struct VenueQueue {
    entries: Vec<SongQueueEntry>,
}

impl From<Vec<SongQueueEntry>> for VenueQueue {
    /// Later duplicates of a task id are dropped
    fn from(entries: Vec<SongQueueEntry>) -> Self {
        let mut queue = VenueQueue::default();
        for entry in entries {
            if queue.find(&entry.task_id).is_none() {
                queue.entries.push(entry);
            }
        }
        queue
    }
}

impl From<VenueQueue> for Vec<SongQueueEntry> {
    fn from(queue: VenueQueue) -> Self {
        queue.entries
    }
}

impl VenueQueue {
    pub fn entries(&self) -> &[SongQueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry the playback page shows next
    pub fn head(&self) -> Option<&SongQueueEntry> {
        self.entries.first()
    }

    pub fn find(&self, task_id: &str) -> Option<&SongQueueEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    /// Append `entry` unless its task is already queued
    pub fn push(&mut self, entry: SongQueueEntry) -> QueueChange {
        if self.find(&entry.task_id).is_some() {
            return QueueChange::Unchanged;
        }
        self.entries.push(entry.clone());
        QueueChange::Inserted(entry)
    }

    /// Merge track data for `task_id`, creating a `generating` entry titled
    /// `fallback_title` first when the task is not queued yet.
    ///
    /// Any playable URL marks the entry ready. Re-applying the same update
    /// reports [`QueueChange::Unchanged`].
    pub fn apply_track(
        &mut self,
        task_id: &str,
        fallback_title: &str,
        update: &TrackUpdate,
    ) -> QueueChange {
        let (index, inserted) = match self.entries.iter().position(|e| e.task_id == task_id) {
            Some(index) => (index, false),
            None => {
                self.entries
                    .push(SongQueueEntry::generating(task_id, fallback_title));
                (self.entries.len() - 1, true)
            }
        };

        let entry = &mut self.entries[index];
        let before = entry.clone();

        if let Some(url) = &update.stream_url {
            entry.stream_url = Some(url.clone());
            entry.status = EntryStatus::Ready;
        }
        if let Some(url) = &update.audio_url {
            entry.audio_url = Some(url.clone());
            entry.status = EntryStatus::Ready;
        }

        if inserted {
            QueueChange::Inserted(entry.clone())
        } else if *entry != before {
            QueueChange::Updated(entry.clone())
        } else {
            QueueChange::Unchanged
        }
    }

    /// Remove the entry for `task_id`
    pub fn remove_task(&mut self, task_id: &str) -> QueueChange {
        match self.entries.iter().position(|e| e.task_id == task_id) {
            Some(index) => QueueChange::Removed(self.entries.remove(index)),
            None => QueueChange::Unchanged,
        }
    }

    /// Remove the head entry
    pub fn pop_head(&mut self) -> QueueChange {
        if self.entries.is_empty() {
            QueueChange::Unchanged
        } else {
            QueueChange::Removed(self.entries.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(url: &str) -> TrackUpdate {
        TrackUpdate {
            stream_url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_track_inserts_once() {
        let mut queue = VenueQueue::default();
        let update = stream("https://cdn.example/s1");

        let first = queue.apply_track("task-1", "Neon Nights", &update);
        assert!(matches!(first, QueueChange::Inserted(_)));

        let second = queue.apply_track("task-1", "Neon Nights", &update);
        assert_eq!(second, QueueChange::Unchanged);
        assert_eq!(queue.len(), 1);

        let entry = queue.head().unwrap();
        assert_eq!(entry.title, "Neon Nights");
        assert_eq!(entry.status, EntryStatus::Ready);
        assert_eq!(entry.stream_url.as_deref(), Some("https://cdn.example/s1"));
    }

    #[test]
    fn test_apply_track_without_urls_stays_generating() {
        let mut queue = VenueQueue::default();
        let change = queue.apply_track("task-1", DEFAULT_SONG_TITLE, &TrackUpdate::default());
        assert!(matches!(change, QueueChange::Inserted(ref e) if e.status == EntryStatus::Generating));
    }

    #[test]
    fn test_apply_track_updates_placeholder_in_place() {
        let mut queue = VenueQueue::default();
        queue.push(SongQueueEntry::generating("task-0", "Earlier"));
        queue.push(SongQueueEntry::generating("task-1", "Provisional"));

        let change = queue.apply_track("task-1", "Upstream Title", &stream("https://cdn.example/s1"));
        match change {
            QueueChange::Updated(entry) => {
                // the provisional title is kept
                assert_eq!(entry.title, "Provisional");
                assert!(entry.is_ready());
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert_eq!(queue.entries()[1].task_id, "task-1");
    }

    #[test]
    fn test_audio_url_alone_marks_ready() {
        let mut queue = VenueQueue::default();
        let update = TrackUpdate {
            audio_url: Some("https://cdn.example/a1.mp3".to_string()),
            ..Default::default()
        };
        assert!(update.is_terminal());
        queue.apply_track("task-1", DEFAULT_SONG_TITLE, &update);
        let entry = queue.find("task-1").unwrap();
        assert!(entry.is_ready());
        assert_eq!(entry.stream_url, None);
    }

    #[test]
    fn test_push_rejects_duplicate_task() {
        let mut queue = VenueQueue::default();
        assert!(queue.push(SongQueueEntry::generating("task-1", "A")).is_changed());
        assert!(!queue.push(SongQueueEntry::generating("task-1", "B")).is_changed());
        assert_eq!(queue.find("task-1").unwrap().title, "A");
    }

    #[test]
    fn test_remove_and_pop() {
        let mut queue = VenueQueue::default();
        queue.push(SongQueueEntry::generating("task-1", "A"));
        queue.push(SongQueueEntry::generating("task-2", "B"));
        queue.push(SongQueueEntry::generating("task-3", "C"));

        assert!(matches!(queue.remove_task("task-2"), QueueChange::Removed(ref e) if e.title == "B"));
        assert_eq!(queue.remove_task("task-2"), QueueChange::Unchanged);

        assert!(matches!(queue.pop_head(), QueueChange::Removed(ref e) if e.title == "A"));
        assert_eq!(queue.head().unwrap().title, "C");
        queue.pop_head();
        assert_eq!(queue.pop_head(), QueueChange::Unchanged);
    }

    #[test]
    fn test_deserialize_drops_duplicate_tasks() {
        let a = SongQueueEntry::generating("task-1", "A");
        let b = SongQueueEntry::generating("task-1", "B");
        let json = serde_json::to_string(&vec![a, b]).unwrap();

        let queue: VenueQueue = serde_json::from_str(&json).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.head().unwrap().title, "A");
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = SongQueueEntry::generating("task-1", "A");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "generating");
        assert!(value.get("stream_url").is_none());
        assert!(value["added_at"].is_string());
    }
}
