//! Library database access
//!
//! The library tables are owned by the scanner; this service reads media
//! files, albums and playlists, and only ever updates existing media file
//! rows.

pub mod media_files;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use tunetag_common::{Error, Result};

use crate::models::MediaFile;

/// Open (creating if needed) the library database and its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the library tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_files (
            id TEXT PRIMARY KEY,
            library_path TEXT NOT NULL,
            path TEXT NOT NULL,
            album_id TEXT REFERENCES albums(id) ON DELETE SET NULL,
            artist TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '{}',
            lyrics TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_files_album ON media_files(album_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_tracks (
            playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            media_file_id TEXT NOT NULL REFERENCES media_files(id) ON DELETE CASCADE,
            PRIMARY KEY (playlist_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Resource whose members a batch works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Album,
    Playlist,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Album => f.write_str("album"),
            ResourceKind::Playlist => f.write_str("playlist"),
        }
    }
}

/// Library store as seen by the enrichment services
#[async_trait]
pub trait MediaFileStore: Send + Sync {
    /// Load one media file; `Error::NotFound` if absent
    async fn get(&self, id: &str) -> Result<MediaFile>;

    /// Save tags, lyrics and timestamp of an existing media file
    async fn put(&self, file: &MediaFile) -> Result<()>;

    /// Member files of an album or playlist; `Error::NotFound` if the
    /// resource does not exist
    async fn members(&self, kind: ResourceKind, id: &str) -> Result<Vec<MediaFile>>;
}

/// SQLite-backed `MediaFileStore`
#[derive(Debug, Clone)]
pub struct SqliteLibrary {
    pool: SqlitePool,
}

impl SqliteLibrary {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MediaFileStore for SqliteLibrary {
    async fn get(&self, id: &str) -> Result<MediaFile> {
        media_files::get_media_file(&self.pool, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Song {}", id)))
    }

    async fn put(&self, file: &MediaFile) -> Result<()> {
        if media_files::update_media_file(&self.pool, file).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Song {}", file.id)))
        }
    }

    async fn members(&self, kind: ResourceKind, id: &str) -> Result<Vec<MediaFile>> {
        let exists = match kind {
            ResourceKind::Album => media_files::album_exists(&self.pool, id).await?,
            ResourceKind::Playlist => media_files::playlist_exists(&self.pool, id).await?,
        };
        if !exists {
            return Err(Error::NotFound(format!("{} {}", kind, id)));
        }

        match kind {
            ResourceKind::Album => media_files::list_by_album(&self.pool, id).await,
            ResourceKind::Playlist => media_files::list_by_playlist(&self.pool, id).await,
        }
    }
}
