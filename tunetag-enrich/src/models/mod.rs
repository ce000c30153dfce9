//! Data model shared by the enrichment pipeline

pub mod analysis;
pub mod enrichment;
pub mod lyrics;
pub mod media_file;

pub use analysis::{AnalysisResult, AudioMetrics, EnergyLevel, ScoreBreakdown, TrackMetrics};
pub use enrichment::{EnrichmentResult, ItemOutcome};
pub use lyrics::{LyricLine, Lyrics};
pub use media_file::{MediaFile, Tags};
