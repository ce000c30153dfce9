//! Audio analysis and track analytics values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw metrics produced by one feature-extraction run
///
/// Always fully populated: a failed extraction produces no metrics at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetrics {
    /// Beats per minute (≥ 0)
    pub bpm: f64,
    /// Mean loudness of the beats (0.0-1.0)
    pub beats_loudness: f64,
    /// Normalised average loudness (0.0-1.0)
    pub average_loudness: f64,
    /// Danceability probability (0.0-1.0)
    pub danceability: f64,
}

/// Sub-scores behind an energy classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub bpm_score: u32,
    pub beats_score: u32,
    pub loudness_score: u32,
    pub danceability_score: u32,
    pub total_score: u32,
}

/// Three-level energy label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

impl EnergyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyLevel::Low => "low",
            EnergyLevel::Medium => "medium",
            EnergyLevel::High => "high",
        }
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggested energy plus the metrics and scores it was derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub suggested_energy: EnergyLevel,
    pub metrics: AudioMetrics,
    pub score: ScoreBreakdown,
}

/// Track analytics from the third-party metrics service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetrics {
    #[serde(rename = "energy")]
    pub energy_val: i64,
    pub happiness: i64,
    pub instrumentalness: i64,
}

/// File tag names written for track analytics
pub const TRACK_METRIC_TAGS: [&str; 3] = ["ENERGYVAL", "HAPPINESS", "INSTRUMENTALNESS"];

impl TrackMetrics {
    /// Tag name / value pairs in write order
    pub fn tag_entries(&self) -> [(&'static str, String); 3] {
        [
            (TRACK_METRIC_TAGS[0], self.energy_val.to_string()),
            (TRACK_METRIC_TAGS[1], self.happiness.to_string()),
            (TRACK_METRIC_TAGS[2], self.instrumentalness.to_string()),
        ]
    }
}
