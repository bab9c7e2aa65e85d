use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Highlight colors offered by the selection toolbar.
pub const DEFAULT_PALETTE: [&str; 5] = ["#fff475", "#a7ffeb", "#ffd6a5", "#caffbf", "#fdffb6"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anchoring: AnchoringConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// How much surrounding text an anchor records and how strictly it is
/// compared when the anchor is resolved again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchoringConfig {
    /// Characters of prefix/suffix captured at creation time
    pub context_chars: usize,
    /// Characters inspected on either side of a candidate occurrence
    pub match_window: usize,
    /// Characters of prefix tail / suffix head that must match inside the window
    pub match_len: usize,
}

impl Default for AnchoringConfig {
    fn default() -> Self {
        Self {
            context_chars: 30,
            match_window: 10,
            match_len: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub note_preview_chars: usize,
    pub palette: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            note_preview_chars: 200,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl RenderConfig {
    /// First palette entry, used when a highlight is created without a color
    pub fn default_color(&self) -> &str {
        self.palette
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_PALETTE[0])
    }
}

/// Timer settings for the reconciliation scheduler, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub calm_ms: u64,
    pub max_wait_ms: u64,
    pub debounce_ms: u64,
    pub throttle_ms: u64,
    pub suppression_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            calm_ms: 300,
            max_wait_ms: 5000,
            debounce_ms: 500,
            throttle_ms: 1000,
            suppression_ms: 500,
        }
    }
}

impl ReconcileConfig {
    pub fn calm(&self) -> Duration {
        Duration::from_millis(self.calm_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn suppression(&self) -> Duration {
        Duration::from_millis(self.suppression_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum queued operations replayed per retry sweep
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { batch_size: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub store_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("~/.local/share/highlight-notes/store.json"),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config.storage.store_path =
            Self::expand_path(&config.storage.store_path).unwrap_or(config.storage.store_path);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load the config file if present, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        match Self::load_from_path(config_path)? {
            Some(config) => Ok(config),
            None => {
                let mut config = Config::default();
                config.storage.store_path = Self::expand_path(&config.storage.store_path)
                    .unwrap_or(config.storage.store_path);
                Ok(config)
            }
        }
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/highlight-notes");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
