//! Database initialization
//!
//! Creates the database file on first run and the schema on every start
//! (`CREATE TABLE IF NOT EXISTS`, so reopening is harmless).

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (or create) the database at `db_path` and make sure every table exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Single connection: queue mutations run as read-modify-write transactions
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_venues_table(pool).await?;
    create_queue_entries_table(pool).await?;
    create_task_venues_table(pool).await?;
    create_song_titles_table(pool).await?;
    create_venue_tables_table(pool).await?;
    create_table_requests_table(pool).await?;
    Ok(())
}

async fn create_venues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            doc TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_queue_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            venue_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            task_id TEXT NOT NULL,
            doc TEXT NOT NULL,
            UNIQUE (venue_id, task_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_entries_order ON queue_entries(venue_id, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_task_venues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_venues (
            task_id TEXT PRIMARY KEY,
            venue_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_song_titles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS song_titles (
            task_id TEXT PRIMARY KEY,
            title TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_venue_tables_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venue_tables (
            venue_id TEXT NOT NULL,
            table_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            doc TEXT NOT NULL,
            PRIMARY KEY (venue_id, table_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_table_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS table_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_id TEXT NOT NULL,
            task_id TEXT NOT NULL,
            doc TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_table_requests_task ON table_requests(task_id)")
        .execute(pool)
        .await?;

    Ok(())
}
