use crate::error::{MirrorError, Result};
use crate::queue::DEFAULT_HISTORY_LIMIT;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub directory: Utf8PathBuf,
    /// Names the cache file, one per remote server/user pair.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            instance_id: default_instance_id(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            page_size: default_page_size(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_owned()
}

fn default_cache_dir() -> Utf8PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("tunemirror"))
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("~/.cache/tunemirror"))
}

fn default_instance_id() -> String {
    "default".to_owned()
}

const fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

const fn default_interval_secs() -> u64 {
    3600
}

const fn default_page_size() -> u64 {
    500
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MirrorError::Config(format!("Failed to read config: {}", e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| MirrorError::Config(format!("Failed to parse config: {}", e)))?;

        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|_| Self::default())
    }

    /// Full path of the cache database file.
    pub fn cache_file(&self) -> Utf8PathBuf {
        self.cache
            .directory
            .join(format!("{}.db", self.cache.instance_id))
    }

    fn find_config_file() -> Result<PathBuf> {
        let candidates = [
            dirs::config_dir().map(|p| p.join("tunemirror/tunemirror.toml")),
            Some(PathBuf::from("/etc/tunemirror/tunemirror.toml")),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(MirrorError::Config("Config file not found".to_owned()))
    }

    fn expand_paths(&mut self) {
        fn expand_tilde(path: &Utf8PathBuf) -> Utf8PathBuf {
            let path_str = path.as_str();
            if path_str.starts_with("~/") {
                if let Some(home) = dirs::home_dir() {
                    if let Some(home_str) = home.to_str() {
                        return Utf8PathBuf::from(path_str.replacen("~", home_str, 1));
                    }
                }
            }
            path.clone()
        }

        self.cache.directory = expand_tilde(&self.cache.directory);
    }

    fn validate(&self) -> Result<()> {
        if self.cache.instance_id.trim().is_empty() {
            return Err(MirrorError::Config("cache.instance_id must not be empty".to_owned()));
        }
        if self.cache.instance_id.contains(['/', '\\']) {
            return Err(MirrorError::Config(format!(
                "cache.instance_id is not a valid file name: {}",
                self.cache.instance_id
            )));
        }
        if self.sync.page_size == 0 {
            return Err(MirrorError::Config("sync.page_size must be positive".to_owned()));
        }
        Ok(())
    }
}
