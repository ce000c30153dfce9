//! Per-call result buffers keyed by correlation id
//!
//! A tag backend reports what it finds through the `put_*` callbacks, naming
//! the buffer by the id it was handed. Each store call leases a fresh id and
//! a private buffer; the lease removes the buffer when it is dropped, so
//! success, error and panic paths all release it.

use crate::models::Tags;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use super::LYRICS_PREFIX;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

static BUFFERS: Lazy<Mutex<HashMap<u32, Tags>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Lock the registry, recovering from a poisoned lock
///
/// A panic inside a backend never happens while the lock is held, but a
/// poisoned map is still consistent (every operation is a single insert,
/// lookup or remove).
fn buffers() -> MutexGuard<'static, HashMap<u32, Tags>> {
    BUFFERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scoped ownership of one result buffer
#[derive(Debug)]
pub struct BufferLease {
    id: u32,
}

impl BufferLease {
    /// Allocate a fresh id and register an empty buffer for it
    pub fn acquire() -> Self {
        let mut map = buffers();
        let mut id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        // Wrap-around: skip ids still in use and the reserved 0
        while id == 0 || map.contains_key(&id) {
            id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        }
        map.insert(id, Tags::new());
        Self { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Take the collected tags, releasing the buffer
    pub fn into_tags(self) -> Tags {
        buffers().remove(&self.id).unwrap_or_default()
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        buffers().remove(&self.id);
    }
}

/// Number of buffers currently registered
pub fn active_buffers() -> usize {
    buffers().len()
}

fn with_buffer(id: u32, f: impl FnOnce(&mut Tags)) {
    match buffers().get_mut(&id) {
        Some(tags) => f(tags),
        None => trace!(id, "Dropping tag for released buffer"),
    }
}

/// Record a plain tag value
///
/// Keys are lower-cased and values trimmed; blank keys or values are ignored.
pub fn put_str(id: u32, key: &str, value: &str) {
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return;
    }
    with_buffer(id, |tags| tags.push(key, value));
}

/// Record untimed lyrics for a language under `lyrics:<lang>`
pub fn put_lyrics(id: u32, lang: &str, text: &str) {
    put_str(id, &lyrics_key(lang), text);
}

/// Record one timed lyric line
///
/// Lines of the same language accumulate into a single value, one
/// `[mm:ss.cc]text` row per line.
pub fn put_lyric_line(id: u32, lang: &str, text: &str, time_ms: u32) {
    let line = format_timed_line(text, time_ms);
    let key = lyrics_key(lang);

    with_buffer(id, |tags| match tags.values_mut(&key) {
        Some(values) if !values.is_empty() => values[0].push_str(&line),
        _ => tags.push(&key, line),
    });
}

fn lyrics_key(lang: &str) -> String {
    format!("{}{}", LYRICS_PREFIX, lang)
}

fn format_timed_line(text: &str, time_ms: u32) -> String {
    let centis = (time_ms % 1000) / 10;
    let total_secs = time_ms / 1000;
    format!(
        "[{:02}:{:02}.{:02}]{}\n",
        total_secs / 60,
        total_secs % 60,
        centis,
        text
    )
}
