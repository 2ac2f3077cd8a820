use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field has a default; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Custom session store path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Root directory for exported stems and mixes.
    pub output_dir: PathBuf,
    /// Requested length of a new session, in seconds.
    pub default_duration: f64,
    /// Built-in sketch engine settings.
    pub engine: EngineConfig,
    /// Export settings.
    pub export: ExportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            output_dir: PathBuf::from("loops"),
            default_duration: 8.0,
            engine: EngineConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Generation engine configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Hard cap on a single render, in seconds.
    pub max_duration_secs: f64,
    /// Pin the engine's randomness. Unset = different output every call.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32_000,
            max_duration_secs: 32.0,
            seed: None,
        }
    }
}

/// Export configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Also write `mixed.wav` next to the stems.
    pub mix: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { mix: true }
    }
}

impl AppConfig {
    /// Load config from `~/.config/stemlock/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default session store path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("stemlock.db")
    } else {
        // Fallback: current directory
        PathBuf::from("stemlock.db")
    }
}
