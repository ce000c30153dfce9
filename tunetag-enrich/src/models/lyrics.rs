//! Structured lyrics
//!
//! Plain text is one line per row. Timed text uses LRC-style prefixes
//! (`[mm:ss]`, `[mm:ss.cc]` or `[mm:ss.mmm]`); LRC header tags such as
//! `[ar:Artist]` are dropped.

use serde::{Deserialize, Serialize};

/// Language code used when the source does not report one
pub const UNSPECIFIED_LANGUAGE: &str = "xxx";

/// One lyric line, optionally timed (milliseconds from track start)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    pub value: String,
}

/// Lyrics in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    pub lang: String,
    pub synced: bool,
    pub line: Vec<LyricLine>,
}

impl Lyrics {
    /// Parse lyric text; `None` when nothing but whitespace or header tags remain
    pub fn parse(lang: &str, text: &str) -> Option<Self> {
        let mut lines = Vec::new();

        for raw in text.trim().lines() {
            let raw = raw.trim_end();
            match split_timestamp(raw) {
                Timestamp::Timed(start, rest) => lines.push(LyricLine {
                    start: Some(start),
                    value: rest.trim().to_string(),
                }),
                Timestamp::Header => {}
                Timestamp::None => lines.push(LyricLine {
                    start: None,
                    value: raw.to_string(),
                }),
            }
        }

        if lines.iter().all(|l| l.value.trim().is_empty()) {
            return None;
        }

        let synced = lines
            .iter()
            .filter(|l| !l.value.is_empty())
            .all(|l| l.start.is_some());

        Some(Self {
            lang: lang.to_string(),
            synced,
            line: lines,
        })
    }

    /// Serialize a lyric list for the `lyrics` column
    pub fn to_json_list(list: &[Lyrics]) -> serde_json::Result<String> {
        serde_json::to_string(list)
    }
}

enum Timestamp<'a> {
    Timed(i64, &'a str),
    Header,
    None,
}

fn split_timestamp(line: &str) -> Timestamp<'_> {
    let Some(rest) = line.strip_prefix('[') else {
        return Timestamp::None;
    };
    let Some(close) = rest.find(']') else {
        return Timestamp::None;
    };

    let inner = &rest[..close];
    let after = &rest[close + 1..];

    match parse_time(inner) {
        Some(ms) => Timestamp::Timed(ms, after),
        None if after.trim().is_empty() && is_id_tag(inner) => Timestamp::Header,
        None => Timestamp::None,
    }
}

/// LRC ID tags; section markers such as `[Verse 1: Artist]` are lyric text
const ID_TAGS: [&str; 9] = ["ar", "ti", "al", "au", "by", "offset", "length", "re", "ve"];

fn is_id_tag(inner: &str) -> bool {
    if inner.starts_with('#') {
        return true;
    }
    inner
        .split_once(':')
        .map_or(false, |(tag, _)| ID_TAGS.iter().any(|t| tag.trim().eq_ignore_ascii_case(t)))
}

/// `mm:ss`, `mm:ss.c`, `mm:ss.cc` or `mm:ss.mmm` → milliseconds
fn parse_time(inner: &str) -> Option<i64> {
    let (minutes, seconds) = inner.split_once(':')?;
    let minutes: i64 = minutes.trim().parse().ok()?;

    let (secs, frac) = match seconds.split_once('.') {
        Some((s, f)) => (s, f),
        None => (seconds, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    if !(0..60).contains(&secs) {
        return None;
    }

    let frac_ms = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 100,
        2 => frac.parse::<i64>().ok()? * 10,
        3 => frac.parse::<i64>().ok()?,
        _ => return None,
    };

    if minutes < 0 {
        return None;
    }

    // Absurd minute counts make the line untimed
    minutes
        .checked_mul(60)?
        .checked_add(secs)?
        .checked_mul(1000)?
        .checked_add(frac_ms)
}
