//! Tag library seam
//!
//! A backend parses and rewrites the tag block of one file. It reports read
//! results through the registry callbacks (`put_str`, `put_lyrics`,
//! `put_lyric_line`) under the buffer id it is given, and signals the outcome
//! with a status code. Backends may panic; `TagStore` contains that.

use std::path::Path;

/// Outcome of one backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Ok,
    /// File could not be opened or its container/tag block parsed
    ParseFailed,
    /// File parsed but carries no usable audio stream
    AudioPropertiesFailed,
    /// File is not writable
    ReadOnly,
    /// Tag block could not be written back
    SaveFailed,
}

/// Native tag read/write implementation
pub trait TagBackend: Send + Sync + 'static {
    /// Report every tag of `path` into buffer `buffer_id`
    fn read(&self, path: &Path, buffer_id: u32) -> BackendStatus;

    /// Set (or with an empty `value`, remove) a user-defined text tag
    fn write_tag(&self, path: &Path, name: &str, value: &str) -> BackendStatus;

    /// Replace the unsynchronised lyrics for `lang` (empty `text` removes them)
    fn write_lyrics(&self, path: &Path, lang: &str, text: &str) -> BackendStatus;
}
