//! [`VenueStore`] on SQLite
//!
//! Structured records (venues, queue entries, tables, table requests) are
//! stored as JSON documents next to the columns needed for lookup and
//! ordering. `queue_entries` carries `UNIQUE(venue_id, task_id)`, so a task
//! can never be queued twice even outside [`VenueStore::modify_queue`].

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::models::{
    QueueChange, RequestStatus, SongQueueEntry, TableRequest, TaskId, Venue, VenueId, VenueQueue,
    VenueTable,
};
use crate::store::{QueueMutation, VenueStore};
use crate::Result;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool initialized by [`init_database`](super::init_database)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VenueStore for SqliteStore {
    async fn get_venue(&self, venue_id: &str) -> Result<Option<Venue>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT doc FROM venues WHERE id = ?")
            .bind(venue_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((doc,)) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    async fn put_venue(&self, venue: Venue) -> Result<()> {
        let doc = serde_json::to_string(&venue)?;
        sqlx::query(
            "INSERT INTO venues (id, doc) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
        )
        .bind(&venue.id)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_venues(&self) -> Result<Vec<Venue>> {
        let rows = sqlx::query_as::<_, (String,)>("SELECT doc FROM venues ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(doc,)| Ok(serde_json::from_str(&doc)?))
            .collect()
    }

    async fn queue(&self, venue_id: &str) -> Result<VenueQueue> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT doc FROM queue_entries WHERE venue_id = ? ORDER BY position ASC",
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|(doc,)| serde_json::from_str::<SongQueueEntry>(&doc))
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(VenueQueue::from(entries))
    }

    async fn modify_queue<'a>(
        &'a self,
        venue_id: &'a str,
        mutation: QueueMutation<'a>,
    ) -> Result<QueueChange> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT doc FROM queue_entries WHERE venue_id = ? ORDER BY position ASC",
        )
        .bind(venue_id)
        .fetch_all(&mut *tx)
        .await?;
        let entries = rows
            .into_iter()
            .map(|(doc,)| serde_json::from_str::<SongQueueEntry>(&doc))
            .collect::<serde_json::Result<Vec<_>>>()?;

        let mut queue = VenueQueue::from(entries);
        let change = mutation(&mut queue);
        if !change.is_changed() {
            tx.rollback().await?;
            return Ok(change);
        }

        sqlx::query("DELETE FROM queue_entries WHERE venue_id = ?")
            .bind(venue_id)
            .execute(&mut *tx)
            .await?;

        for (position, entry) in queue.entries().iter().enumerate() {
            sqlx::query(
                "INSERT INTO queue_entries (venue_id, position, task_id, doc) VALUES (?, ?, ?, ?)",
            )
            .bind(venue_id)
            .bind(position as i64)
            .bind(&entry.task_id)
            .bind(serde_json::to_string(entry)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Queue of venue {} now has {} entries", venue_id, queue.len());
        Ok(change)
    }

    async fn track_task(&self, task_id: &str, venue_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO task_venues (task_id, venue_id) VALUES (?, ?)
             ON CONFLICT(task_id) DO UPDATE SET venue_id = excluded.venue_id",
        )
        .bind(task_id)
        .bind(venue_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn untrack_task(&self, task_id: &str) -> Result<Option<VenueId>> {
        let row = sqlx::query_as::<_, (String,)>(
            "DELETE FROM task_venues WHERE task_id = ? RETURNING venue_id",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(venue_id,)| venue_id))
    }

    async fn task_venue(&self, task_id: &str) -> Result<Option<VenueId>> {
        let row =
            sqlx::query_as::<_, (String,)>("SELECT venue_id FROM task_venues WHERE task_id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(venue_id,)| venue_id))
    }

    async fn pending_tasks(&self, venue_id: Option<&str>) -> Result<Vec<(TaskId, VenueId)>> {
        let rows = match venue_id {
            Some(venue_id) => {
                sqlx::query_as::<_, (String, String)>(
                    "SELECT task_id, venue_id FROM task_venues WHERE venue_id = ? ORDER BY task_id",
                )
                .bind(venue_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, (String, String)>(
                    "SELECT task_id, venue_id FROM task_venues ORDER BY task_id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn song_title(&self, task_id: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT title FROM song_titles WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(title,)| title))
    }

    async fn set_song_title(&self, task_id: &str, title: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO song_titles (task_id, title) VALUES (?, ?)
             ON CONFLICT(task_id) DO UPDATE SET title = excluded.title",
        )
        .bind(task_id)
        .bind(title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn tables(&self, venue_id: &str) -> Result<Vec<VenueTable>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT doc FROM venue_tables WHERE venue_id = ? ORDER BY position ASC",
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(doc,)| Ok(serde_json::from_str(&doc)?))
            .collect()
    }

    async fn put_table(&self, venue_id: &str, table: VenueTable) -> Result<()> {
        let doc = serde_json::to_string(&table)?;
        sqlx::query(
            r#"
            INSERT INTO venue_tables (venue_id, table_id, position, doc)
            VALUES (?1, ?2,
                    (SELECT COALESCE(MAX(position), -1) + 1 FROM venue_tables WHERE venue_id = ?1),
                    ?3)
            ON CONFLICT(venue_id, table_id) DO UPDATE SET doc = excluded.doc
            "#,
        )
        .bind(venue_id)
        .bind(&table.id)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn table_requests(&self, table_id: &str) -> Result<Vec<TableRequest>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT doc FROM table_requests WHERE table_id = ? ORDER BY id ASC",
        )
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(doc,)| Ok(serde_json::from_str(&doc)?))
            .collect()
    }

    async fn add_table_request(&self, table_id: &str, request: TableRequest) -> Result<()> {
        let doc = serde_json::to_string(&request)?;
        sqlx::query("INSERT INTO table_requests (table_id, task_id, doc) VALUES (?, ?, ?)")
            .bind(table_id)
            .bind(&request.task_id)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_request_status(&self, task_id: &str, status: RequestStatus) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, doc FROM table_requests WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut updated = 0;
        for (id, doc) in rows {
            let mut request: TableRequest = serde_json::from_str(&doc)?;
            if request.status == status {
                continue;
            }
            request.status = status;
            sqlx::query("UPDATE table_requests SET doc = ? WHERE id = ?")
                .bind(serde_json::to_string(&request)?)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            updated += 1;
        }

        tx.commit().await?;
        Ok(updated)
    }
}
