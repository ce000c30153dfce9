//! Tag backend built on `id3` (MP3) and `lofty` (everything else)
//!
//! MP3 files carry user tags as ID3v2.4 `TXXX` frames and lyrics as `USLT`
//! frames. Other formats go through lofty's generic tag: Vorbis comments for
//! FLAC/Ogg/Opus, freeform `----:com.apple.iTunes:<NAME>` atoms for MP4, APE
//! items for APE-tagged formats.

use std::path::Path;

use id3::frame::{ExtendedText, Lyrics as Id3Lyrics, TimestampFormat};
use id3::{Content, Frame, TagLike, Version};
use lofty::config::WriteOptions;
use lofty::file::{FileType, TaggedFile};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemValue, Tag, TagType};
use tracing::{debug, warn};

use super::backend::{BackendStatus, TagBackend};
use super::registry::{put_lyric_line, put_lyrics, put_str};
use crate::models::lyrics::UNSPECIFIED_LANGUAGE;

/// Prefix of MP4 freeform atom keys as reported by lofty (compared lower-case)
const ITUNES_KEY_PREFIX: &str = "----:com.apple.itunes:";

/// Freeform atom namespace used when writing MP4 tags
const ITUNES_FREEFORM: &str = "----:com.apple.iTunes:";

/// Production tag backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl TagBackend for NativeBackend {
    fn read(&self, path: &Path, buffer_id: u32) -> BackendStatus {
        if is_mpeg(path) {
            read_id3(path, buffer_id)
        } else {
            read_generic(path, buffer_id)
        }
    }

    fn write_tag(&self, path: &Path, name: &str, value: &str) -> BackendStatus {
        if let Some(status) = check_writable(path) {
            return status;
        }
        if is_mpeg(path) {
            write_id3_text(path, name, value)
        } else {
            write_generic_text(path, name, value)
        }
    }

    fn write_lyrics(&self, path: &Path, lang: &str, text: &str) -> BackendStatus {
        if let Some(status) = check_writable(path) {
            return status;
        }
        if is_mpeg(path) {
            write_id3_lyrics(path, lang, text)
        } else {
            write_generic_lyrics(path, text)
        }
    }
}

fn is_mpeg(path: &Path) -> bool {
    matches!(FileType::from_path(path), Some(FileType::Mpeg))
}

/// `Some(status)` when the file cannot be written at all
fn check_writable(path: &Path) -> Option<BackendStatus> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.permissions().readonly() => Some(BackendStatus::ReadOnly),
        Ok(_) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot stat file");
            Some(BackendStatus::ParseFailed)
        }
    }
}

// ---------------------------------------------------------------------------
// MP3 (id3)
// ---------------------------------------------------------------------------

/// Load the ID3v2 tag; a file without one yields an empty tag
fn load_id3(path: &Path) -> Result<id3::Tag, BackendStatus> {
    match id3::Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Ok(id3::Tag::new()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to read ID3 tag");
            Err(BackendStatus::ParseFailed)
        }
    }
}

fn save_id3(tag: &id3::Tag, path: &Path) -> BackendStatus {
    match tag.write_to_path(path, Version::Id3v24) {
        Ok(()) => BackendStatus::Ok,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to save ID3 tag");
            BackendStatus::SaveFailed
        }
    }
}

/// Plain-name mapping for the standard ID3v2 text frames
fn id3_frame_name(id: &str) -> Option<&'static str> {
    match id {
        "TIT2" => Some("title"),
        "TPE1" => Some("artist"),
        "TPE2" => Some("albumartist"),
        "TALB" => Some("album"),
        "TCON" => Some("genre"),
        "TRCK" => Some("track"),
        "TPOS" => Some("disc"),
        "TDRC" | "TYER" => Some("date"),
        "TCOM" => Some("composer"),
        "TBPM" => Some("bpm"),
        _ => None,
    }
}

fn read_id3(path: &Path, id: u32) -> BackendStatus {
    let tag = match load_id3(path) {
        Ok(tag) => tag,
        Err(status) => return status,
    };

    for frame in tag.frames() {
        match frame.content() {
            Content::ExtendedText(ext) => put_str(id, &ext.description, &ext.value),
            Content::Lyrics(lyrics) => put_lyrics(id, &lyrics.lang, &lyrics.text),
            Content::SynchronisedLyrics(sylt) => {
                if sylt.timestamp_format != TimestampFormat::Ms {
                    continue;
                }
                for (time_ms, text) in &sylt.content {
                    put_lyric_line(id, &sylt.lang, text, *time_ms);
                }
            }
            Content::Comment(comment) => put_str(id, "comment", &comment.text),
            Content::Text(text) => {
                if let Some(name) = id3_frame_name(frame.id()) {
                    for value in text.split('\0') {
                        put_str(id, name, value);
                    }
                }
            }
            _ => {}
        }
    }

    BackendStatus::Ok
}

fn write_id3_text(path: &Path, name: &str, value: &str) -> BackendStatus {
    let mut tag = match load_id3(path) {
        Ok(tag) => tag,
        Err(status) => return status,
    };

    // Drop every TXXX with this description regardless of case
    let kept: Vec<Frame> = tag
        .remove("TXXX")
        .into_iter()
        .filter(|frame| match frame.content() {
            Content::ExtendedText(ext) => !ext.description.eq_ignore_ascii_case(name),
            _ => true,
        })
        .collect();
    for frame in kept {
        tag.add_frame(frame);
    }

    if !value.is_empty() {
        tag.add_frame(ExtendedText {
            description: name.to_string(),
            value: value.to_string(),
        });
    }

    save_id3(&tag, path)
}

fn write_id3_lyrics(path: &Path, lang: &str, text: &str) -> BackendStatus {
    let mut tag = match load_id3(path) {
        Ok(tag) => tag,
        Err(status) => return status,
    };

    let kept: Vec<Frame> = tag
        .remove("USLT")
        .into_iter()
        .filter(|frame| match frame.content() {
            Content::Lyrics(lyrics) => lyrics.lang != lang,
            _ => true,
        })
        .collect();
    for frame in kept {
        tag.add_frame(frame);
    }

    if !text.is_empty() {
        tag.add_frame(Id3Lyrics {
            lang: lang.to_string(),
            description: String::new(),
            text: text.to_string(),
        });
    }

    save_id3(&tag, path)
}

// ---------------------------------------------------------------------------
// Other formats (lofty)
// ---------------------------------------------------------------------------

fn open_generic(path: &Path) -> Result<TaggedFile, BackendStatus> {
    Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|e| {
            debug!(path = %path.display(), error = %e, "Failed to parse file");
            BackendStatus::ParseFailed
        })
}

/// Lower-cased tag name of a generic key, MP4 namespace stripped
fn generic_key_name(key: &ItemKey, tag_type: TagType) -> Option<String> {
    let raw = key.map_key(tag_type, true)?.to_lowercase();
    Some(match raw.strip_prefix(ITUNES_KEY_PREFIX) {
        Some(stripped) => stripped.to_string(),
        None => raw,
    })
}

fn read_generic(path: &Path, id: u32) -> BackendStatus {
    let tagged = match open_generic(path) {
        Ok(tagged) => tagged,
        Err(status) => return status,
    };

    let properties = tagged.properties();
    if properties.sample_rate().is_none() && properties.duration().is_zero() {
        return BackendStatus::AudioPropertiesFailed;
    }

    for tag in tagged.tags() {
        let tag_type = tag.tag_type();
        for item in tag.items() {
            let ItemValue::Text(value) = item.value() else {
                continue;
            };
            if *item.key() == ItemKey::Lyrics {
                put_lyrics(id, UNSPECIFIED_LANGUAGE, value);
            } else if let Some(name) = generic_key_name(item.key(), tag_type) {
                put_str(id, &name, value);
            }
        }
    }

    BackendStatus::Ok
}

/// Run `edit` against the primary tag (created if missing) and save it
fn edit_primary_tag(path: &Path, edit: impl FnOnce(&mut Tag, TagType) -> bool) -> BackendStatus {
    let mut tagged = match open_generic(path) {
        Ok(tagged) => tagged,
        Err(status) => return status,
    };

    let tag_type = tagged.primary_tag_type();
    if tagged.tag_mut(tag_type).is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged.tag_mut(tag_type) else {
        return BackendStatus::ParseFailed;
    };

    if !edit(tag, tag_type) {
        warn!(path = %path.display(), ?tag_type, "Tag type rejected the item");
        return BackendStatus::SaveFailed;
    }

    match tag.save_to_path(path, WriteOptions::default()) {
        Ok(()) => BackendStatus::Ok,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to save tag");
            BackendStatus::SaveFailed
        }
    }
}

fn write_generic_text(path: &Path, name: &str, value: &str) -> BackendStatus {
    edit_primary_tag(path, |tag, tag_type| {
        tag.retain(|item| {
            generic_key_name(item.key(), tag_type)
                .map_or(true, |existing| !existing.eq_ignore_ascii_case(name))
        });

        if value.is_empty() {
            return true;
        }

        let key = match tag_type {
            TagType::Mp4Ilst => ItemKey::Unknown(format!("{}{}", ITUNES_FREEFORM, name)),
            _ => ItemKey::Unknown(name.to_string()),
        };
        tag.insert_text(key, value.to_string())
    })
}

fn write_generic_lyrics(path: &Path, text: &str) -> BackendStatus {
    edit_primary_tag(path, |tag, _| {
        tag.retain(|item| *item.key() != ItemKey::Lyrics);
        text.is_empty() || tag.insert_text(ItemKey::Lyrics, text.to_string())
    })
}
