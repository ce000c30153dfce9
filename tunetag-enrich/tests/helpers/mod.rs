//! Test helper utilities shared by the tunetag-enrich integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tunetag_enrich::config::ServiceSettings;
use tunetag_enrich::db::{init_database_pool, media_files};
use tunetag_enrich::models::{MediaFile, Tags};
use tunetag_enrich::providers::Capabilities;
use tunetag_enrich::AppState;

/// Fixed timestamp for seeded rows, so updates are easy to detect
pub const SEEDED_AT: &str = "2024-01-01T00:00:00Z";

pub fn seeded_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(SEEDED_AT)
        .unwrap()
        .with_timezone(&Utc)
}

/// Create temporary library database with tables
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let pool = init_database_pool(&temp_dir.path().join("test_tunetag.db"))
        .await
        .expect("Failed to create test database");
    (temp_dir, pool)
}

/// Write a tagless MP3 stand-in that the ID3 writer can prepend a tag to
pub fn write_fake_mp3(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, b"\xff\xfb\x90\x00fake_mp3_data").expect("Failed to write test MP3");
    path
}

/// Build a media file record rooted at `library`
pub fn media_file(library: &Path, id: &str, path: &str, album_id: Option<&str>) -> MediaFile {
    MediaFile {
        id: id.to_string(),
        library_path: library.display().to_string(),
        path: path.to_string(),
        album_id: album_id.map(str::to_string),
        artist: "Test Artist".to_string(),
        title: format!("Song {}", id),
        tags: Tags::new(),
        lyrics: String::new(),
        updated_at: seeded_at(),
    }
}

/// Seed an album whose songs exist on disk as fake MP3 files
pub async fn seed_album(
    pool: &SqlitePool,
    library: &Path,
    album_id: &str,
    song_ids: &[&str],
) -> Vec<MediaFile> {
    media_files::insert_album(pool, album_id, "Test Album")
        .await
        .unwrap();

    let mut files = Vec::new();
    for (n, id) in song_ids.iter().enumerate() {
        let rel = format!("{}/{:02}.mp3", album_id, n + 1);
        write_fake_mp3(library, &rel);
        let file = media_file(library, id, &rel, Some(album_id));
        media_files::insert_media_file(pool, &file).await.unwrap();
        files.push(file);
    }
    files
}

/// Write an executable-free shell script; invoked as `sh <script> ...`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// App state over `pool` with the given capabilities and default settings
pub fn create_test_state(pool: SqlitePool, capabilities: Capabilities) -> AppState {
    AppState::new(pool, capabilities, &ServiceSettings::default())
        .expect("Failed to build app state")
}

/// Router plus its state (the state keeps the root cancellation token)
pub async fn create_test_app(
    capabilities: Capabilities,
) -> (TempDir, axum::Router, AppState) {
    let (temp_dir, pool) = create_test_db().await;
    let state = create_test_state(pool, capabilities);
    let app = tunetag_enrich::build_router(state.clone());
    (temp_dir, app, state)
}
