//! Lyrics lookup through the bundled lyrics script
//!
//! The script prints the lyric text on stdout and exits 0, or exits non-zero
//! when nothing was found. Lookup problems never surface as errors here:
//! they are logged and reported as "no lyrics". Only cancellation is an
//! error.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::capabilities::LyricsInvocation;
use super::{ConcurrencyPolicy, Enrichment, EnrichmentProvider, ProviderError};
use crate::config::GENIUS_TOKEN_ENV;
use crate::models::lyrics::UNSPECIFIED_LANGUAGE;
use crate::models::{Lyrics, MediaFile, Tags};
use crate::tags::{TagStore, LYRICS_PREFIX};

/// Default number of lookups in flight per batch
pub const DEFAULT_LYRICS_PARALLELISM: usize = 4;

/// Fetches lyrics and stores them in the file's tag block
#[derive(Debug, Clone)]
pub struct LyricsProvider {
    invocation: Option<LyricsInvocation>,
    tag_store: TagStore,
    parallelism: usize,
}

impl LyricsProvider {
    pub fn new(invocation: Option<LyricsInvocation>, tag_store: TagStore, parallelism: usize) -> Self {
        Self {
            invocation,
            tag_store,
            parallelism: parallelism.max(1),
        }
    }

    pub fn is_available(&self) -> bool {
        self.invocation.is_some()
    }

    /// Look lyrics up by artist and title
    ///
    /// `Ok(None)` when unavailable, when artist or title is blank, when
    /// nothing was found, or when the lookup failed unexpectedly.
    pub async fn fetch(
        &self,
        artist: &str,
        title: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        let Some(invocation) = &self.invocation else {
            debug!("Lyrics lookup not available");
            return Ok(None);
        };

        if artist.trim().is_empty() || title.trim().is_empty() {
            debug!(artist, title, "Cannot look up lyrics: missing artist or title");
            return Ok(None);
        }

        debug!(artist, title, "Looking up lyrics");

        let child = Command::new(&invocation.interpreter)
            .arg(&invocation.script)
            .arg(artist)
            .arg(title)
            .env(GENIUS_TOKEN_ENV, &invocation.access_token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                error!(artist, title, error = %e, "Failed to start lyrics lookup");
                return Ok(None);
            }
        };

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = child.wait_with_output() => match result {
                Ok(output) => output,
                Err(e) => {
                    error!(artist, title, error = %e, "Lyrics lookup failed");
                    return Ok(None);
                }
            },
        };

        if !output.status.success() {
            debug!(
                artist,
                title,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "No lyrics found"
            );
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            debug!(artist, title, "Lyrics lookup returned empty text");
            return Ok(None);
        }

        info!(artist, title, "Fetched lyrics");
        Ok(Some(text))
    }

    /// Fetch lyrics for a library file and best-effort save them to its tags
    pub async fn fetch_for_file(
        &self,
        file: &MediaFile,
        cancel: &CancellationToken,
    ) -> Result<Option<Lyrics>, ProviderError> {
        let Some(text) = self.fetch(&file.artist, &file.title, cancel).await? else {
            return Ok(None);
        };

        let Some(lyrics) = Lyrics::parse(UNSPECIFIED_LANGUAGE, &text) else {
            return Ok(None);
        };

        let path = file.absolute_path();
        match self
            .tag_store
            .write_lyrics_async(path.clone(), UNSPECIFIED_LANGUAGE.to_string(), text)
            .await
        {
            Ok(()) => info!(path = %path.display(), "Saved lyrics to audio file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save lyrics to audio file"),
        }

        Ok(Some(lyrics))
    }
}

/// A file already has lyrics when some key starts with `lyrics:`
///
/// Legacy spellings (`unsyncedlyrics`, `txxx:unsyncedlyrics`) do not count.
pub fn has_stored_lyrics(tags: &Tags) -> bool {
    tags.keys()
        .any(|key| key.to_lowercase().starts_with(LYRICS_PREFIX))
}

#[async_trait]
impl EnrichmentProvider for LyricsProvider {
    fn name(&self) -> &'static str {
        "lyrics"
    }

    fn is_available(&self) -> bool {
        LyricsProvider::is_available(self)
    }

    fn concurrency(&self) -> ConcurrencyPolicy {
        ConcurrencyPolicy::Parallel {
            max_in_flight: self.parallelism,
        }
    }

    fn already_enriched(&self, tags: &Tags) -> bool {
        has_stored_lyrics(tags)
    }

    async fn enrich(
        &self,
        file: &MediaFile,
        cancel: &CancellationToken,
    ) -> Result<Enrichment, ProviderError> {
        match self.fetch_for_file(file, cancel).await? {
            Some(lyrics) => Ok(Enrichment {
                record_lyrics: Some(vec![lyrics]),
                ..Enrichment::default()
            }),
            None => Err(ProviderError::NotFound(format!(
                "No lyrics for '{}' by '{}'",
                file.title, file.artist
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_rule_requires_prefixed_key() {
        let tags: Tags = vec![("unsyncedlyrics", "la la"), ("txxx:unsyncedlyrics", "la")]
            .into_iter()
            .collect();
        assert!(!has_stored_lyrics(&tags));

        let tags: Tags = vec![("lyrics:eng", "la la")].into_iter().collect();
        assert!(has_stored_lyrics(&tags));

        let tags: Tags = vec![("LYRICS:XXX", "la la")].into_iter().collect();
        assert!(has_stored_lyrics(&tags));
    }

    #[tokio::test]
    async fn test_blank_artist_is_no_result() {
        let provider = LyricsProvider::new(
            Some(LyricsInvocation {
                interpreter: "/nonexistent/python".into(),
                script: "/nonexistent/script.py".into(),
                access_token: "token".into(),
            }),
            TagStore::default(),
            2,
        );

        let result = provider
            .fetch("  ", "Title", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_no_result() {
        let provider = LyricsProvider::new(
            Some(LyricsInvocation {
                interpreter: "/nonexistent/python".into(),
                script: "/nonexistent/script.py".into(),
                access_token: "token".into(),
            }),
            TagStore::default(),
            2,
        );

        let result = provider
            .fetch("Artist", "Title", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_output_is_trimmed_and_token_passed() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lyrics.sh");
        std::fs::write(
            &script,
            format!("printf '\\n  %s by %s (%s)\\n\\n' \"$2\" \"$1\" \"${}\"\n", GENIUS_TOKEN_ENV),
        )
        .unwrap();

        let provider = LyricsProvider::new(
            Some(LyricsInvocation {
                interpreter: "sh".into(),
                script,
                access_token: "tok".into(),
            }),
            TagStore::default(),
            1,
        );

        let text = provider
            .fetch("Artist", "Song", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("Song by Artist (tok)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lyrics.sh");
        std::fs::write(&script, "echo 'No lyrics found' >&2\nexit 1\n").unwrap();

        let provider = LyricsProvider::new(
            Some(LyricsInvocation {
                interpreter: "sh".into(),
                script,
                access_token: "tok".into(),
            }),
            TagStore::default(),
            1,
        );

        let text = provider
            .fetch("Artist", "Song", &CancellationToken::new())
            .await
            .unwrap();
        assert!(text.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_running_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lyrics.sh");
        std::fs::write(&script, "exec sleep 30\n").unwrap();

        let provider = LyricsProvider::new(
            Some(LyricsInvocation {
                interpreter: "sh".into(),
                script,
                access_token: "tok".into(),
            }),
            TagStore::default(),
            1,
        );
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            provider.fetch("Artist", "Song", &cancel),
        )
        .await
        .expect("lookup kept running after cancellation");

        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }
}
