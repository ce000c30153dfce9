//! Energy classification from audio metrics
//!
//! Each metric contributes a sub-score; thresholds are inclusive and checked
//! from the highest band down.

use crate::models::{AudioMetrics, EnergyLevel, ScoreBreakdown};

/// Total score at or above which a track is "high" energy
pub const HIGH_ENERGY_MIN_SCORE: u32 = 5;

/// Total score at or above which a track is "medium" energy
pub const MEDIUM_ENERGY_MIN_SCORE: u32 = 2;

fn bpm_score(bpm: f64) -> u32 {
    if bpm >= 130.0 {
        3
    } else if bpm >= 110.0 {
        2
    } else if bpm >= 85.0 {
        1
    } else {
        0
    }
}

fn beats_score(beats_loudness: f64) -> u32 {
    if beats_loudness >= 0.7 {
        2
    } else if beats_loudness >= 0.4 {
        1
    } else {
        0
    }
}

fn loudness_score(average_loudness: f64) -> u32 {
    u32::from(average_loudness >= 0.8)
}

fn danceability_score(danceability: f64) -> u32 {
    u32::from(danceability >= 0.7)
}

/// Classify metrics into an energy label and its score breakdown
pub fn classify(metrics: &AudioMetrics) -> (EnergyLevel, ScoreBreakdown) {
    let bpm_score = bpm_score(metrics.bpm);
    let beats_score = beats_score(metrics.beats_loudness);
    let loudness_score = loudness_score(metrics.average_loudness);
    let danceability_score = danceability_score(metrics.danceability);
    let total_score = bpm_score + beats_score + loudness_score + danceability_score;

    let level = if total_score >= HIGH_ENERGY_MIN_SCORE {
        EnergyLevel::High
    } else if total_score >= MEDIUM_ENERGY_MIN_SCORE {
        EnergyLevel::Medium
    } else {
        EnergyLevel::Low
    };

    (
        level,
        ScoreBreakdown {
            bpm_score,
            beats_score,
            loudness_score,
            danceability_score,
            total_score,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(bpm: f64, beats: f64, loudness: f64, dance: f64) -> AudioMetrics {
        AudioMetrics {
            bpm,
            beats_loudness: beats,
            average_loudness: loudness,
            danceability: dance,
        }
    }

    #[test]
    fn test_high_energy_track() {
        let (level, score) = classify(&metrics(140.0, 0.75, 0.85, 0.75));
        assert_eq!(level, EnergyLevel::High);
        assert_eq!(
            score,
            ScoreBreakdown {
                bpm_score: 3,
                beats_score: 2,
                loudness_score: 1,
                danceability_score: 1,
                total_score: 7,
            }
        );
    }

    #[test]
    fn test_low_energy_track() {
        let (level, score) = classify(&metrics(90.0, 0.3, 0.5, 0.2));
        assert_eq!(level, EnergyLevel::Low);
        assert_eq!(
            (score.bpm_score, score.beats_score, score.loudness_score, score.danceability_score),
            (1, 0, 0, 0)
        );
        assert_eq!(score.total_score, 1);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(bpm_score(130.0), 3);
        assert_eq!(bpm_score(129.99), 2);
        assert_eq!(bpm_score(110.0), 2);
        assert_eq!(bpm_score(85.0), 1);
        assert_eq!(bpm_score(84.9), 0);
        assert_eq!(beats_score(0.7), 2);
        assert_eq!(beats_score(0.4), 1);
        assert_eq!(beats_score(0.39), 0);
        assert_eq!(loudness_score(0.8), 1);
        assert_eq!(danceability_score(0.7), 1);
        assert_eq!(danceability_score(0.69), 0);
    }

    #[test]
    fn test_label_thresholds() {
        // total 2 → medium
        let (level, score) = classify(&metrics(110.0, 0.0, 0.0, 0.0));
        assert_eq!(score.total_score, 2);
        assert_eq!(level, EnergyLevel::Medium);

        // total 5 → high
        let (level, score) = classify(&metrics(130.0, 0.4, 0.8, 0.0));
        assert_eq!(score.total_score, 5);
        assert_eq!(level, EnergyLevel::High);

        // total 4 → medium
        let (level, _) = classify(&metrics(130.0, 0.4, 0.0, 0.0));
        assert_eq!(level, EnergyLevel::Medium);
    }

    #[test]
    fn test_deterministic() {
        let m = metrics(121.3, 0.55, 0.81, 0.66);
        assert_eq!(classify(&m), classify(&m));
    }
}
