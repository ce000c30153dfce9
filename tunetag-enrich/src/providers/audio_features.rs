//! Audio feature extraction through an external tool
//!
//! The tool (native extractor binary or the bundled script) writes a JSON
//! document to a private temporary file which is removed when the call
//! returns, whatever the outcome.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capabilities::AnalyzerInvocation;
use super::energy::classify;
use crate::models::{AnalysisResult, AudioMetrics};

/// Default upper bound for one extraction run
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(300);

/// Audio analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No extractor installed
    #[error("Audio analyzer not available: install essentia_streaming_extractor_music or the Python essentia module")]
    NotAvailable,

    /// Input file missing
    #[error("Audio file not found: {0}")]
    FileNotFound(String),

    /// Extractor failed or produced unusable output
    #[error("Audio analysis failed: {0}")]
    AnalysisFailed(String),

    /// Caller cancelled the request
    #[error("Audio analysis cancelled")]
    Cancelled,

    /// Extractor exceeded the configured time limit
    #[error("Audio analysis timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Deserialize)]
struct ExtractorOutput {
    rhythm: Option<Rhythm>,
    lowlevel: Option<LowLevel>,
    highlevel: Option<HighLevel>,
}

#[derive(Debug, Deserialize)]
struct Rhythm {
    bpm: Option<f64>,
    beats_loudness: Option<Stats>,
}

#[derive(Debug, Deserialize)]
struct Stats {
    mean: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LowLevel {
    average_loudness: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HighLevel {
    danceability: Option<Danceability>,
}

#[derive(Debug, Deserialize)]
struct Danceability {
    all: Option<DanceabilityClasses>,
}

#[derive(Debug, Deserialize)]
struct DanceabilityClasses {
    danceable: Option<f64>,
}

/// Parse extractor JSON into metrics; any missing value is an error
pub fn parse_extractor_output(json: &str) -> Result<AudioMetrics, AnalysisError> {
    let output: ExtractorOutput = serde_json::from_str(json)
        .map_err(|e| AnalysisError::AnalysisFailed(format!("Malformed output: {}", e)))?;

    let missing = |field: &str| AnalysisError::AnalysisFailed(format!("Output has no {}", field));

    let rhythm = output.rhythm.ok_or_else(|| missing("rhythm"))?;
    let bpm = rhythm.bpm.ok_or_else(|| missing("rhythm.bpm"))?;
    let beats_loudness = rhythm
        .beats_loudness
        .and_then(|s| s.mean)
        .ok_or_else(|| missing("rhythm.beats_loudness.mean"))?;
    let average_loudness = output
        .lowlevel
        .and_then(|l| l.average_loudness)
        .ok_or_else(|| missing("lowlevel.average_loudness"))?;
    let danceability = output
        .highlevel
        .and_then(|h| h.danceability)
        .and_then(|d| d.all)
        .and_then(|a| a.danceable)
        .ok_or_else(|| missing("highlevel.danceability.all.danceable"))?;

    Ok(AudioMetrics {
        bpm: bpm.max(0.0),
        beats_loudness,
        average_loudness,
        danceability,
    })
}

/// Runs the feature extractor and classifies its output
#[derive(Debug, Clone)]
pub struct AudioFeatureProvider {
    invocation: Option<AnalyzerInvocation>,
    timeout: Duration,
}

impl AudioFeatureProvider {
    pub fn new(invocation: Option<AnalyzerInvocation>, timeout: Duration) -> Self {
        Self {
            invocation,
            timeout,
        }
    }

    /// Decided by the startup probe; never re-probed
    pub fn is_available(&self) -> bool {
        self.invocation.is_some()
    }

    /// Extract metrics and classify them
    pub async fn analyze(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let metrics = self.extract(path, cancel).await?;
        let (suggested_energy, score) = classify(&metrics);

        info!(
            path = %path.display(),
            bpm = metrics.bpm,
            total_score = score.total_score,
            suggested = %suggested_energy,
            "Audio analysis complete"
        );

        Ok(AnalysisResult {
            suggested_energy,
            metrics,
            score,
        })
    }

    /// Run the extractor and parse its output
    pub async fn extract(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<AudioMetrics, AnalysisError> {
        let invocation = self.invocation.as_ref().ok_or(AnalysisError::NotAvailable)?;

        if !path.exists() {
            return Err(AnalysisError::FileNotFound(path.display().to_string()));
        }

        // Removed on drop
        let output_file = tempfile::Builder::new()
            .prefix("tunetag_analysis_")
            .suffix(".json")
            .tempfile()
            .map_err(|e| AnalysisError::AnalysisFailed(format!("Temp file: {}", e)))?;

        let mut command = match invocation {
            AnalyzerInvocation::Native { program } => Command::new(program),
            AnalyzerInvocation::Script {
                interpreter,
                script,
            } => {
                let mut command = Command::new(interpreter);
                command.arg(script);
                command
            }
        };
        command
            .arg(path)
            .arg(output_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            audio_file = %path.display(),
            output_file = %output_file.path().display(),
            mode = invocation.mode(),
            "Running feature extractor"
        );

        let child = command
            .spawn()
            .map_err(|e| AnalysisError::AnalysisFailed(format!("Failed to start extractor: {}", e)))?;

        // Dropping the child future on cancel/timeout kills the process
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(path = %path.display(), "Audio analysis cancelled");
                return Err(AnalysisError::Cancelled);
            }
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Err(_) => {
                    warn!(path = %path.display(), timeout = ?self.timeout, "Feature extractor timed out");
                    return Err(AnalysisError::TimedOut(self.timeout));
                }
                Ok(Err(e)) => return Err(AnalysisError::AnalysisFailed(e.to_string())),
                Ok(Ok(output)) => output,
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::AnalysisFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let json = tokio::fs::read_to_string(output_file.path())
            .await
            .map_err(|e| AnalysisError::AnalysisFailed(format!("Reading output: {}", e)))?;

        parse_extractor_output(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_OUTPUT: &str = r#"{
        "rhythm": { "bpm": 128.4, "beats_loudness": { "mean": 0.62 } },
        "lowlevel": { "average_loudness": 0.83, "dynamic_complexity": 3.1 },
        "highlevel": { "danceability": { "all": { "danceable": 0.71, "not_danceable": 0.29 } } }
    }"#;

    #[test]
    fn test_parse_full_output() {
        let metrics = parse_extractor_output(FULL_OUTPUT).unwrap();
        assert_eq!(
            metrics,
            AudioMetrics {
                bpm: 128.4,
                beats_loudness: 0.62,
                average_loudness: 0.83,
                danceability: 0.71,
            }
        );
    }

    #[test]
    fn test_missing_section_is_failure_not_zero() {
        let json = r#"{ "rhythm": { "bpm": 120.0, "beats_loudness": { "mean": 0.5 } },
                        "lowlevel": { "average_loudness": 0.5 } }"#;
        match parse_extractor_output(json) {
            Err(AnalysisError::AnalysisFailed(msg)) => assert!(msg.contains("danceable")),
            other => panic!("expected AnalysisFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_extractor_output("not json"),
            Err(AnalysisError::AnalysisFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_without_invocation() {
        let provider = AudioFeatureProvider::new(None, DEFAULT_ANALYSIS_TIMEOUT);
        assert!(!provider.is_available());

        let result = provider
            .analyze(Path::new("/music/a.flac"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AnalysisError::NotAvailable)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_output_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("track.flac");
        std::fs::write(&audio, b"audio").unwrap();

        // Stand-in extractor: copies a canned result to the output path
        let script = dir.path().join("fake_extractor.sh");
        std::fs::write(
            &script,
            format!("cat > \"$2\" <<'EOF'\n{}\nEOF\n", FULL_OUTPUT),
        )
        .unwrap();

        let provider = AudioFeatureProvider::new(
            Some(AnalyzerInvocation::Script {
                interpreter: "sh".into(),
                script,
            }),
            Duration::from_secs(10),
        );

        let result = provider
            .analyze(&audio, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.metrics.bpm, 128.4);
        assert_eq!(result.score.total_score, 2 + 1 + 1 + 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_analysis_failed() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("track.flac");
        std::fs::write(&audio, b"audio").unwrap();
        let script = dir.path().join("failing.sh");
        std::fs::write(&script, "echo boom >&2\nexit 3\n").unwrap();

        let provider = AudioFeatureProvider::new(
            Some(AnalyzerInvocation::Script {
                interpreter: "sh".into(),
                script,
            }),
            Duration::from_secs(10),
        );

        match provider.analyze(&audio, &CancellationToken::new()).await {
            Err(AnalysisError::AnalysisFailed(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected AnalysisFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_stops_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("track.flac");
        std::fs::write(&audio, b"audio").unwrap();
        let script = dir.path().join("slow.sh");
        std::fs::write(&script, "sleep 30\n").unwrap();

        let provider = AudioFeatureProvider::new(
            Some(AnalyzerInvocation::Script {
                interpreter: "sh".into(),
                script,
            }),
            Duration::from_secs(60),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = provider.analyze(&audio, &cancel).await;
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
