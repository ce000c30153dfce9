//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting that can come from more than one place:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: the service logs a
//! warning and continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "TUNETAG_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TUNETAG_ROOT_FOLDER";

/// Lyrics service access token
pub const GENIUS_TOKEN_ENV: &str = "GENIUS_CLIENT_ACCESS_TOKEN";

/// Track-analysis API key
pub const RAPIDAPI_KEY_ENV: &str = "RAPIDAPI_KEY";

/// Default HTTP port for tunetag-enrich
pub const DEFAULT_PORT: u16 = 5780;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default track-analysis endpoint
pub const DEFAULT_TRACK_ANALYSIS_URL: &str = "https://track-analysis.p.rapidapi.com/pktx/analysis";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "tunetag.db";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// On-disk TOML configuration
///
/// Every field is optional so that a partial file (or no file) still yields
/// a usable configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database
    pub root_folder: Option<PathBuf>,
    /// Address the HTTP server binds to
    pub bind_address: Option<String>,
    /// Port the HTTP server listens on
    pub port: Option<u16>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Extra directory searched for helper scripts
    pub scripts_dir: Option<PathBuf>,
    /// Lyrics service token (environment variable wins)
    pub genius_access_token: Option<String>,
    /// Track-analysis API key (environment variable wins)
    pub rapidapi_key: Option<String>,
    /// Track-analysis endpoint override
    pub track_analysis_url: Option<String>,
    /// Outbound request budget for the track-analysis API
    pub track_analysis_requests_per_second: Option<u32>,
    /// Concurrent lyric lookups per batch
    pub lyrics_parallelism: Option<usize>,
    /// Upper bound for a single audio analysis run
    pub analysis_timeout_secs: Option<u64>,
}

impl TomlConfig {
    /// Database path inside the given root folder
    pub fn database_path(root_folder: &Path) -> PathBuf {
        root_folder.join(DATABASE_FILE_NAME)
    }

    /// Resolved bind address and port
    pub fn listen_address(&self, port_override: Option<u16>) -> String {
        let host = self
            .bind_address
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDRESS);
        let port = port_override.or(self.port).unwrap_or(DEFAULT_PORT);
        format!("{}:{}", host, port)
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file, falling back to defaults
///
/// `explicit` is the path given on the command line or via
/// `TUNETAG_CONFIG`; otherwise the platform locations are searched.
pub fn load_or_default(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(find_config_file),
    };

    let Some(path) = path else {
        warn!("No config file found, using defaults");
        return TomlConfig::default();
    };

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Search the platform config locations
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tunetag").join("tunetag.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/tunetag/tunetag.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Root folder resolution (CLI → ENV → TOML → default)
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_value: toml.root_folder.clone(),
        }
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tunetag"))
        .unwrap_or_else(|| PathBuf::from("./tunetag_data"))
}

/// Resolve a credential: environment variable first, then TOML
///
/// Blank and whitespace-only values count as absent.
pub fn resolve_credential(env_name: &str, toml_value: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_name) {
        if is_valid_key(&value) {
            return Some(value.trim().to_string());
        }
    }

    toml_value
        .filter(|v| is_valid_key(v))
        .map(|v| v.trim().to_string())
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
