//! User-requested energy/mood edits
//!
//! The file tag is written first; the library record is only touched once
//! that succeeds, so a failed file write leaves the record (and its
//! `updated_at`) exactly as it was.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::db::MediaFileStore;
use crate::models::MediaFile;
use crate::tags::{TagError, TagStore, ENERGY_TAG, MOOD_TAG};

/// Allowed energy values ("" clears the tag)
pub const ENERGY_VALUES: [&str; 4] = ["", "low", "medium", "high"];

/// Allowed mood values ("" clears the tag)
pub const MOOD_VALUES: [&str; 4] = ["", "negative", "neutral", "positive"];

/// Editable tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Energy,
    Mood,
}

impl TagField {
    /// Name of the tag in the audio file
    pub fn file_tag(&self) -> &'static str {
        match self {
            TagField::Energy => ENERGY_TAG,
            TagField::Mood => MOOD_TAG,
        }
    }

    /// Name of the tag in the library record and API responses
    pub fn key(&self) -> &'static str {
        match self {
            TagField::Energy => "energy",
            TagField::Mood => "mood",
        }
    }

    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            TagField::Energy => &ENERGY_VALUES,
            TagField::Mood => &MOOD_VALUES,
        }
    }

    pub fn is_allowed(&self, value: &str) -> bool {
        self.allowed_values().contains(&value)
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TagField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "energy" => Ok(TagField::Energy),
            "mood" => Ok(TagField::Mood),
            other => Err(format!("Unknown tag field: {}", other)),
        }
    }
}

/// Tag edit errors
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Song {0} not found")]
    NotFound(String),

    #[error("Invalid {field} value '{value}', expected one of {allowed}")]
    InvalidValue {
        field: TagField,
        value: String,
        allowed: String,
    },

    #[error("Failed to write tag to file: {0}")]
    FileWrite(#[from] TagError),

    #[error("Failed to save song: {0}")]
    Persist(tunetag_common::Error),
}

/// Applies validated energy/mood edits to file and record
#[derive(Clone)]
pub struct TagMutationService {
    library: Arc<dyn MediaFileStore>,
    tag_store: TagStore,
}

impl TagMutationService {
    pub fn new(library: Arc<dyn MediaFileStore>, tag_store: TagStore) -> Self {
        Self { library, tag_store }
    }

    /// Set (or with `""` clear) one tag on a song
    pub async fn set_tag(
        &self,
        id: &str,
        field: TagField,
        value: &str,
    ) -> Result<MediaFile, MutationError> {
        if !field.is_allowed(value) {
            return Err(MutationError::InvalidValue {
                field,
                value: value.to_string(),
                allowed: field
                    .allowed_values()
                    .iter()
                    .map(|v| format!("\"{}\"", v))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let mut file = match self.library.get(id).await {
            Ok(file) => file,
            Err(tunetag_common::Error::NotFound(_)) => {
                return Err(MutationError::NotFound(id.to_string()))
            }
            Err(e) => return Err(MutationError::Persist(e)),
        };

        let path = file.absolute_path();
        self.tag_store
            .write_tag_async(path.clone(), field.file_tag().to_string(), value.to_string())
            .await
            .map_err(|e| {
                error!(path = %path.display(), tag = field.file_tag(), error = %e, "Failed to write tag to file");
                MutationError::FileWrite(e)
            })?;

        file.tags.set_single(field.key(), value);
        file.updated_at = chrono::Utc::now();

        self.library.put(&file).await.map_err(|e| {
            error!(id, error = %e, "Failed to save song");
            match e {
                tunetag_common::Error::NotFound(_) => MutationError::NotFound(id.to_string()),
                other => MutationError::Persist(other),
            }
        })?;

        info!(id, field = %field, value, "Updated song tag");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_values() {
        assert!(TagField::Energy.is_allowed(""));
        assert!(TagField::Energy.is_allowed("medium"));
        assert!(!TagField::Energy.is_allowed("extreme"));
        assert!(!TagField::Energy.is_allowed("High"));
        assert!(TagField::Mood.is_allowed("neutral"));
        assert!(!TagField::Mood.is_allowed("high"));
    }

    #[test]
    fn test_field_names() {
        assert_eq!(TagField::Energy.file_tag(), "ENERGY");
        assert_eq!(TagField::Mood.key(), "mood");
        assert_eq!("Mood".parse::<TagField>().unwrap(), TagField::Mood);
        assert!("tempo".parse::<TagField>().is_err());
    }
}
