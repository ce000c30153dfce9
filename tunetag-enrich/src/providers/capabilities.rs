//! One-time detection of external tools and credentials
//!
//! `Capabilities::probe` inspects the environment and produces an immutable
//! descriptor. The service runs it once through `init_global`; providers are
//! handed the part of the descriptor they need and never probe again.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

/// Feature-extraction binary looked up on `PATH`
pub const ANALYZER_BINARY: &str = "essentia_streaming_extractor_music";

/// Script used when only the Python bindings are installed
pub const ANALYZER_SCRIPT: &str = "essentia_analyze.py";

/// Lyrics lookup script
pub const LYRICS_SCRIPT: &str = "genius_lyrics.py";

/// How the feature extractor is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerInvocation {
    /// `<program> <audio> <output.json>`
    Native { program: PathBuf },
    /// `<interpreter> <script> <audio> <output.json>`
    Script { interpreter: PathBuf, script: PathBuf },
}

impl AnalyzerInvocation {
    pub fn mode(&self) -> &'static str {
        match self {
            AnalyzerInvocation::Native { .. } => "native",
            AnalyzerInvocation::Script { .. } => "script",
        }
    }
}

/// How lyrics are looked up: `<interpreter> <script> <artist> <title>`
#[derive(Clone, PartialEq, Eq)]
pub struct LyricsInvocation {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    pub access_token: String,
}

impl std::fmt::Debug for LyricsInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyricsInvocation")
            .field("interpreter", &self.interpreter)
            .field("script", &self.script)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Track-analysis API key
#[derive(Clone, PartialEq, Eq)]
pub struct TrackMetricsCredential {
    pub api_key: String,
}

impl std::fmt::Debug for TrackMetricsCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackMetricsCredential")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Inputs to the capability probe
#[derive(Debug, Clone, Default)]
pub struct ProbeSettings {
    /// Extra directory searched first for helper scripts
    pub scripts_dir: Option<PathBuf>,
    /// Lyrics service token, already resolved (env over TOML)
    pub genius_access_token: Option<String>,
    /// Track-analysis key, already resolved (env over TOML)
    pub rapidapi_key: Option<String>,
}

/// What this process can do, decided once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub audio_analyzer: Option<AnalyzerInvocation>,
    pub lyrics: Option<LyricsInvocation>,
    pub track_metrics: Option<TrackMetricsCredential>,
}

/// `GET /api/capabilities` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySummary {
    pub audio_analyzer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer_mode: Option<&'static str>,
    pub lyrics: bool,
    pub track_metrics: bool,
}

static GLOBAL: OnceCell<Capabilities> = OnceCell::new();

impl Capabilities {
    /// Nothing available
    pub fn none() -> Self {
        Self::default()
    }

    /// Inspect the environment
    pub fn probe(settings: &ProbeSettings) -> Self {
        let search = script_search_path(settings.scripts_dir.as_deref());
        let python = find_python();

        let capabilities = Self {
            audio_analyzer: probe_analyzer(python.as_deref(), &search),
            lyrics: probe_lyrics(
                python.as_deref(),
                &search,
                settings.genius_access_token.as_deref(),
            ),
            track_metrics: settings
                .rapidapi_key
                .clone()
                .map(|api_key| TrackMetricsCredential { api_key }),
        };

        info!(
            audio_analyzer = capabilities.audio_analyzer.is_some(),
            analyzer_mode = capabilities.audio_analyzer.as_ref().map(|a| a.mode()),
            lyrics = capabilities.lyrics.is_some(),
            track_metrics = capabilities.track_metrics.is_some(),
            "Capability probe complete"
        );

        capabilities
    }

    /// Probe once per process; later calls return the first result
    pub fn init_global(settings: &ProbeSettings) -> &'static Capabilities {
        init_once(&GLOBAL, || Self::probe(settings))
    }

    /// The process-wide descriptor, if `init_global` has run
    pub fn global() -> Option<&'static Capabilities> {
        GLOBAL.get()
    }

    pub fn summary(&self) -> CapabilitySummary {
        CapabilitySummary {
            audio_analyzer: self.audio_analyzer.is_some(),
            analyzer_mode: self.audio_analyzer.as_ref().map(|a| a.mode()),
            lyrics: self.lyrics.is_some(),
            track_metrics: self.track_metrics.is_some(),
        }
    }
}

/// Single-execution guard: concurrent first callers block until one probe
/// finishes and all observe its result
fn init_once<'a>(
    cell: &'a OnceCell<Capabilities>,
    probe: impl FnOnce() -> Capabilities,
) -> &'a Capabilities {
    cell.get_or_init(probe)
}

fn probe_analyzer(python: Option<&Path>, search: &[PathBuf]) -> Option<AnalyzerInvocation> {
    if let Some(program) = find_in_path(ANALYZER_BINARY) {
        info!(program = %program.display(), "Found feature extractor");
        return Some(AnalyzerInvocation::Native { program });
    }

    let Some(interpreter) = python else {
        warn!("Feature extractor not found and no Python interpreter available");
        return None;
    };

    if !python_can_import(interpreter, "essentia") {
        warn!("Feature extractor not found and Python essentia module not installed");
        return None;
    }

    match find_script(ANALYZER_SCRIPT, search) {
        Some(script) => {
            info!(script = %script.display(), "Using scripted feature extractor");
            Some(AnalyzerInvocation::Script {
                interpreter: interpreter.to_path_buf(),
                script,
            })
        }
        None => {
            warn!(searched = ?search, "{} not found", ANALYZER_SCRIPT);
            None
        }
    }
}

fn probe_lyrics(
    python: Option<&Path>,
    search: &[PathBuf],
    token: Option<&str>,
) -> Option<LyricsInvocation> {
    let Some(access_token) = token else {
        info!("Lyrics lookup disabled: no access token configured");
        return None;
    };

    let Some(interpreter) = python else {
        warn!("Lyrics lookup disabled: Python not found");
        return None;
    };

    if !python_can_import(interpreter, "lyricsgenius") {
        warn!("Lyrics lookup disabled: lyricsgenius module not installed");
        return None;
    }

    let Some(script) = find_script(LYRICS_SCRIPT, search) else {
        warn!(searched = ?search, "Lyrics lookup disabled: {} not found", LYRICS_SCRIPT);
        return None;
    };

    info!(script = %script.display(), python = %interpreter.display(), "Found lyrics script");
    Some(LyricsInvocation {
        interpreter: interpreter.to_path_buf(),
        script,
        access_token: access_token.to_string(),
    })
}

/// Directories searched for helper scripts, in priority order
pub fn script_search_path(scripts_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = scripts_dir {
        dirs.push(dir.to_path_buf());
    }
    dirs.push(PathBuf::from("scripts"));

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            dirs.push(exe_dir.join("scripts"));
            dirs.push(exe_dir.join("..").join("scripts"));
        }
    }

    dirs
}

/// First directory in `search` containing `name`
pub fn find_script(name: &str, search: &[PathBuf]) -> Option<PathBuf> {
    search
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Look a program up on `PATH`
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn find_python() -> Option<PathBuf> {
    find_in_path("python3").or_else(|| find_in_path("python"))
}

fn python_can_import(interpreter: &Path, module: &str) -> bool {
    Command::new(interpreter)
        .arg("-c")
        .arg(format!("import {}", module))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
