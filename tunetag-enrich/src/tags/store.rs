//! Fault-isolating front end for the tag backend

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, trace};

use super::backend::{BackendStatus, TagBackend};
use super::native::NativeBackend;
use super::registry::BufferLease;
use crate::models::Tags;

/// Tag read/write errors
#[derive(Debug, Error)]
pub enum TagError {
    /// File missing or its tag block unparseable
    #[error("Cannot parse media file: {0}")]
    Parse(String),

    /// File exists but cannot be opened
    #[error("Permission denied: {0}")]
    Permission(String),

    /// File parsed but has no usable audio stream
    #[error("Cannot read audio properties: {0}")]
    AudioProperties(String),

    /// File is not writable
    #[error("File is read-only: {0}")]
    ReadOnly(String),

    /// Writing the tag block failed
    #[error("Failed to save file: {0}")]
    Save(String),

    /// The tag library faulted; the call was abandoned
    #[error("Tag library fault on {path}: {message}")]
    NativeFault { path: String, message: String },
}

/// Reads and writes file tags through a `TagBackend`
///
/// Every call leases its own result buffer and runs the backend inside
/// `catch_unwind`, so concurrent calls never see each other's tags and a
/// backend panic becomes a `TagError::NativeFault`.
#[derive(Clone)]
pub struct TagStore {
    backend: Arc<dyn TagBackend>,
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new(NativeBackend)
    }
}

impl std::fmt::Debug for TagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStore").finish_non_exhaustive()
    }
}

impl TagStore {
    pub fn new(backend: impl TagBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Read every tag of a file
    pub fn read(&self, path: &Path) -> Result<Tags, TagError> {
        let lease = BufferLease::acquire();
        let id = lease.id();
        trace!(path = %path.display(), buffer_id = id, "Reading tags");

        let status = guarded("read", path, || self.backend.read(path, id))?;
        match status {
            BackendStatus::Ok => Ok(lease.into_tags()),
            BackendStatus::ParseFailed => Err(classify_open_failure(path)),
            BackendStatus::AudioPropertiesFailed => {
                Err(TagError::AudioProperties(path.display().to_string()))
            }
            other => Err(TagError::Parse(format!(
                "{}: unexpected status {:?}",
                path.display(),
                other
            ))),
        }
    }

    /// Set a tag; an empty `value` removes it
    pub fn write_tag(&self, path: &Path, name: &str, value: &str) -> Result<(), TagError> {
        trace!(path = %path.display(), tag = name, value, "Writing tag");
        let status = guarded("write", path, || self.backend.write_tag(path, name, value))?;
        write_result(path, status)
    }

    /// Replace the lyrics for one language; empty `text` removes them
    pub fn write_lyrics(&self, path: &Path, lang: &str, text: &str) -> Result<(), TagError> {
        trace!(path = %path.display(), lang, "Writing lyrics");
        let status = guarded("write lyrics", path, || {
            self.backend.write_lyrics(path, lang, text)
        })?;
        write_result(path, status)
    }

    /// `read` on the blocking thread pool
    pub async fn read_async(&self, path: PathBuf) -> Result<Tags, TagError> {
        let store = self.clone();
        run_blocking(path, move |p| store.read(p)).await
    }

    /// `write_tag` on the blocking thread pool
    pub async fn write_tag_async(
        &self,
        path: PathBuf,
        name: String,
        value: String,
    ) -> Result<(), TagError> {
        let store = self.clone();
        run_blocking(path, move |p| store.write_tag(p, &name, &value)).await
    }

    /// `write_lyrics` on the blocking thread pool
    pub async fn write_lyrics_async(
        &self,
        path: PathBuf,
        lang: String,
        text: String,
    ) -> Result<(), TagError> {
        let store = self.clone();
        run_blocking(path, move |p| store.write_lyrics(p, &lang, &text)).await
    }
}

async fn run_blocking<T, F>(path: PathBuf, f: F) -> Result<T, TagError>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, TagError> + Send + 'static,
{
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || f(&path))
        .await
        .map_err(|e| TagError::NativeFault {
            path: display,
            message: format!("Task join error: {}", e),
        })?
}

/// Run a backend call, converting a panic into `NativeFault`
fn guarded<T>(operation: &str, path: &Path, call: impl FnOnce() -> T) -> Result<T, TagError> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|payload| {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic in tag library".to_string()
        };

        error!(
            path = %path.display(),
            operation,
            error = %message,
            "Recovered from tag library fault"
        );

        TagError::NativeFault {
            path: path.display().to_string(),
            message,
        }
    })
}

fn write_result(path: &Path, status: BackendStatus) -> Result<(), TagError> {
    let display = path.display().to_string();
    match status {
        BackendStatus::Ok => Ok(()),
        BackendStatus::ReadOnly => Err(TagError::ReadOnly(display)),
        BackendStatus::SaveFailed => Err(TagError::Save(display)),
        BackendStatus::ParseFailed => Err(classify_open_failure(path)),
        BackendStatus::AudioPropertiesFailed => Err(TagError::AudioProperties(display)),
    }
}

/// Distinguish a permission problem from an unparseable file
fn classify_open_failure(path: &Path) -> TagError {
    match std::fs::File::open(path) {
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            TagError::Permission(format!("{}: {}", path.display(), e))
        }
        Err(e) => TagError::Parse(format!("{}: {}", path.display(), e)),
        Ok(_) => TagError::Parse(path.display().to_string()),
    }
}
