//! Media file, album and playlist queries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tunetag_common::{Error, Result};

use crate::models::{MediaFile, Tags};

const MEDIA_FILE_COLUMNS: &str =
    "mf.id, mf.library_path, mf.path, mf.album_id, mf.artist, mf.title, mf.tags, mf.lyrics, mf.updated_at";

fn row_to_media_file(row: &SqliteRow) -> Result<MediaFile> {
    let tags_json: String = row.try_get("tags")?;
    let tags: Tags = if tags_json.trim().is_empty() {
        Tags::new()
    } else {
        serde_json::from_str(&tags_json)
            .map_err(|e| Error::Internal(format!("Corrupt tags column: {}", e)))?
    };

    let updated_at: String = row.try_get("updated_at")?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| Error::Internal(format!("Corrupt updated_at column: {}", e)))?
        .with_timezone(&Utc);

    Ok(MediaFile {
        id: row.try_get("id")?,
        library_path: row.try_get("library_path")?,
        path: row.try_get("path")?,
        album_id: row.try_get("album_id")?,
        artist: row.try_get("artist")?,
        title: row.try_get("title")?,
        tags,
        lyrics: row.try_get("lyrics")?,
        updated_at,
    })
}

fn tags_to_json(tags: &Tags) -> Result<String> {
    serde_json::to_string(tags).map_err(|e| Error::Internal(format!("Serialize tags: {}", e)))
}

/// Load a media file by id
pub async fn get_media_file(pool: &SqlitePool, id: &str) -> Result<Option<MediaFile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM media_files mf WHERE mf.id = ?",
        MEDIA_FILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_media_file).transpose()
}

/// Save the mutable fields of an existing media file
///
/// Returns `false` when no row has this id; never inserts.
pub async fn update_media_file(pool: &SqlitePool, file: &MediaFile) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE media_files
        SET tags = ?, lyrics = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(tags_to_json(&file.tags)?)
    .bind(&file.lyrics)
    .bind(file.updated_at.to_rfc3339())
    .bind(&file.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn album_exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM albums WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn playlist_exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM playlists WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Files of an album, in path order
pub async fn list_by_album(pool: &SqlitePool, album_id: &str) -> Result<Vec<MediaFile>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM media_files mf WHERE mf.album_id = ? ORDER BY mf.path",
        MEDIA_FILE_COLUMNS
    ))
    .bind(album_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_media_file).collect()
}

/// Files of a playlist, in playlist order
pub async fn list_by_playlist(pool: &SqlitePool, playlist_id: &str) -> Result<Vec<MediaFile>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM playlist_tracks pt
        JOIN media_files mf ON mf.id = pt.media_file_id
        WHERE pt.playlist_id = ?
        ORDER BY pt.position
        "#,
        MEDIA_FILE_COLUMNS
    ))
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_media_file).collect()
}

/// Insert a media file row (library scanner / test seeding)
pub async fn insert_media_file(pool: &SqlitePool, file: &MediaFile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media_files (id, library_path, path, album_id, artist, title, tags, lyrics, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&file.id)
    .bind(&file.library_path)
    .bind(&file.path)
    .bind(&file.album_id)
    .bind(&file.artist)
    .bind(&file.title)
    .bind(tags_to_json(&file.tags)?)
    .bind(&file.lyrics)
    .bind(file.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert an album row (library scanner / test seeding)
pub async fn insert_album(pool: &SqlitePool, id: &str, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO albums (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert a playlist and its tracks in order (library scanner / test seeding)
pub async fn insert_playlist(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    media_file_ids: &[&str],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO playlists (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

    for (position, media_file_id) in media_file_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO playlist_tracks (playlist_id, position, media_file_id) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(position as i64)
        .bind(media_file_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
