//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-audit\config.toml
//! - macOS: ~/Library/Application Support/music-audit/config.toml
//! - Linux: ~/.config/music-audit/config.toml
//!
//! The config file is human-readable and editable. Command-line flags
//! override whatever it contains.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::Format;
use crate::store::DEFAULT_STORE_NAME;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Checksum store settings
    pub store: StoreConfig,

    /// File discovery settings
    pub scan: ScanConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Checksum store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store file location
    pub path: PathBuf,

    /// Whether a missing store outside the default location may be created
    pub allow_create: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_NAME),
            allow_create: false,
        }
    }
}

/// File discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Formats to process; files of other formats are ignored
    pub formats: Vec<Format>,

    /// Require file content to agree with the extension
    pub verify_magic: bool,

    /// Follow symbolic links while walking
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            formats: Format::ALL.to_vec(),
            verify_magic: true,
            follow_links: false,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for this crate: "off", "error", "warn", "info", "debug", "trace"
    pub level: String,
}

impl LoggingConfig {
    /// Level that turns all output off.
    pub const SILENT: &'static str = "off";

    /// Whether console reports should be suppressed too.
    pub fn is_silent(&self) -> bool {
        self.level.eq_ignore_ascii_case(Self::SILENT)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-audit"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the standard location.
///
/// Returns the default config if there is no config directory or file.
pub fn load() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) => load_from(&path),
        None => Ok(Config::default()),
    }
}

/// Load configuration from `path`.
///
/// A missing file is not an error and yields the default config. Read and
/// parse failures are returned so the caller can report them once logging
/// is up.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

// ============================================================================
// Tests
// ============================================================================
