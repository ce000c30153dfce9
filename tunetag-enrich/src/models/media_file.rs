//! Media file record and its tag mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Tag mapping: tag name → ordered values
///
/// Names are stored lower-cased so lookups are case-insensitive. Values keep
/// insertion order. An absent key means "unset"; the mapping never holds an
/// empty-string entry for a single-valued tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(HashMap<String, Vec<String>>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values for a tag
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// First value for a tag
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_lowercase())
    }

    /// Append a value, keeping earlier values
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replace a tag with a single value; an empty value removes the tag
    pub fn set_single(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.remove(name);
        } else {
            self.0.insert(name.to_lowercase(), vec![value.to_string()]);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(&name.to_lowercase())
    }

    /// Mutable access to the value list of an existing tag
    pub(crate) fn values_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        self.0.get_mut(&name.to_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (name, value) in iter {
            tags.push(name.as_ref(), value);
        }
        tags
    }
}

/// A library entry describing one audio file
///
/// Rows are created and removed by the library scanner; the enrichment
/// pipeline only updates `tags`, `lyrics` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    /// Library root the relative path is resolved against
    pub library_path: String,
    /// Path relative to `library_path`
    pub path: String,
    pub album_id: Option<String>,
    pub artist: String,
    pub title: String,
    pub tags: Tags,
    /// JSON list of structured lyrics; empty when none are known
    pub lyrics: String,
    pub updated_at: DateTime<Utc>,
}

impl MediaFile {
    /// Full path to the audio file on disk
    pub fn absolute_path(&self) -> PathBuf {
        PathBuf::from(&self.library_path).join(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_insensitive() {
        let mut tags = Tags::new();
        tags.set_single("ENERGY", "high");

        assert_eq!(tags.first("energy"), Some("high"));
        assert_eq!(tags.first("Energy"), Some("high"));
        assert!(tags.contains_key("eNeRgY"));
        assert_eq!(tags.keys().collect::<Vec<_>>(), vec!["energy"]);
    }

    #[test]
    fn test_empty_value_removes_tag() {
        let mut tags = Tags::new();
        tags.set_single("mood", "positive");
        tags.set_single("MOOD", "");

        assert!(!tags.contains_key("mood"));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_push_preserves_insertion_order() {
        let tags: Tags = vec![("genre", "rock"), ("GENRE", "pop"), ("genre", "jazz")]
            .into_iter()
            .collect();

        assert_eq!(
            tags.get("genre").unwrap(),
            &["rock".to_string(), "pop".to_string(), "jazz".to_string()]
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut tags = Tags::new();
        tags.set_single("energy", "low");

        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"energy":["low"]}"#);

        let parsed: Tags = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tags);
    }

    #[test]
    fn test_absolute_path_joins_library_root() {
        let file = MediaFile {
            id: "1".into(),
            library_path: "/music".into(),
            path: "artist/album/01.flac".into(),
            album_id: None,
            artist: "Artist".into(),
            title: "Title".into(),
            tags: Tags::new(),
            lyrics: String::new(),
            updated_at: Utc::now(),
        };

        assert_eq!(
            file.absolute_path(),
            PathBuf::from("/music/artist/album/01.flac")
        );
    }
}
