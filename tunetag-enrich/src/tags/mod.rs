//! Audio file tag access
//!
//! `TagStore` is the entry point; `registry` holds the per-call result
//! buffers that backends report into.

pub mod backend;
pub mod native;
pub mod registry;
pub mod store;

pub use backend::{BackendStatus, TagBackend};
pub use native::NativeBackend;
pub use registry::{put_lyric_line, put_lyrics, put_str, BufferLease};
pub use store::{TagError, TagStore};

/// Key prefix of lyric entries (`lyrics:<language>`)
pub const LYRICS_PREFIX: &str = "lyrics:";

/// File tag holding the energy label
pub const ENERGY_TAG: &str = "ENERGY";

/// File tag holding the mood label
pub const MOOD_TAG: &str = "MOOD";
