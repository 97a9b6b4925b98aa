use std::{fs, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::vfs::VfsConfig;

pub const APP_NAME: &str = "diskfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const TOKEN_ENV_VAR: &str = "DISKFS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the disk REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// OAuth token, overridden by `DISKFS_TOKEN` when set
    #[serde(default)]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    common::remote::DiskClient::DEFAULT_BASE_URL.to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    #[serde(default = "default_ttl_secs")]
    pub attribute_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub directory_ttl_secs: u64,
    /// Unset keeps chunks until the size bound evicts them
    #[serde(default = "default_chunk_ttl_secs")]
    pub chunk_ttl_secs: Option<u64>,
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: u64,
    /// Defaults to the platform cache directory
    #[serde(default)]
    pub chunk_dir: Option<PathBuf>,
}

fn default_chunk_size() -> u64 {
    VfsConfig::DEFAULT_CHUNK_SIZE
}

fn default_ttl_secs() -> u64 {
    VfsConfig::DEFAULT_TTL.as_secs()
}

fn default_chunk_ttl_secs() -> Option<u64> {
    Some(default_ttl_secs())
}

fn default_max_cache_bytes() -> u64 {
    VfsConfig::DEFAULT_MAX_CACHE_BYTES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
            attribute_ttl_secs: default_ttl_secs(),
            directory_ttl_secs: default_ttl_secs(),
            chunk_ttl_secs: default_chunk_ttl_secs(),
            max_cache_bytes: default_max_cache_bytes(),
            chunk_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily-rolling log files, stdout only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.level).unwrap_or(tracing::Level::INFO)
    }
}

impl AppConfig {
    /// Projection tuning derived from the `[cache]` table
    pub fn vfs_config(&self) -> Result<VfsConfig, StateError> {
        let cache = &self.cache;
        if cache.chunk_size_bytes == 0 || cache.chunk_size_bytes > VfsConfig::MAX_CHUNK_SIZE {
            return Err(StateError::InvalidChunkSize(cache.chunk_size_bytes));
        }

        Ok(VfsConfig {
            chunk_size: cache.chunk_size_bytes,
            attribute_ttl: Duration::from_secs(cache.attribute_ttl_secs),
            directory_ttl: Duration::from_secs(cache.directory_ttl_secs),
            chunk_ttl: cache.chunk_ttl_secs.map(Duration::from_secs),
            max_cache_bytes: cache.max_cache_bytes,
            chunk_dir: cache
                .chunk_dir
                .clone()
                .unwrap_or_else(VfsConfig::default_chunk_dir),
        })
    }

    /// The token to authenticate with, environment first
    pub fn token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.remote.token.clone())
    }

    pub fn base_url(&self) -> Result<Url, StateError> {
        Ok(Url::parse(&self.remote.base_url)?)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the diskfs directory (~/.diskfs)
    pub diskfs_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the diskfs directory path (custom or default ~/.diskfs)
    pub fn diskfs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory holding a default config
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let diskfs_dir = Self::diskfs_dir(custom_path)?;

        if diskfs_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&diskfs_dir)?;

        let config = config.unwrap_or_default();
        let config_path = diskfs_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            diskfs_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the diskfs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let diskfs_dir = Self::diskfs_dir(custom_path)?;

        if !diskfs_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = diskfs_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            diskfs_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("diskfs directory not initialized. Run 'diskfs init' first")]
    NotInitialized,

    #[error("diskfs directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid chunk_size_bytes {0} (expected 1 to {} bytes)", VfsConfig::MAX_CHUNK_SIZE)]
    InvalidChunkSize(u64),

    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("state");

        let state = AppState::init(Some(dir.clone()), None).unwrap();
        assert!(state.config_path.exists());

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config.cache.chunk_size_bytes, 1024 * 1024);
        assert_eq!(loaded.config.remote.base_url, default_base_url());

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            AppState::load(Some(tmp.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [cache]
            chunk_size_bytes = 4096
            chunk_dir = "/tmp/chunks"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        let vfs = config.vfs_config().unwrap();
        assert_eq!(vfs.chunk_size, 4096);
        assert_eq!(vfs.attribute_ttl, Duration::from_secs(1800));
        assert_eq!(vfs.chunk_ttl, Some(Duration::from_secs(1800)));
        assert_eq!(vfs.max_cache_bytes, 1024 * 1024 * 1024);
        assert_eq!(vfs.chunk_dir, PathBuf::from("/tmp/chunks"));
        assert_eq!(config.log.level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_chunk_size_out_of_range() {
        let mut config = AppConfig::default();

        config.cache.chunk_size_bytes = 5 * 1024 * 1024 * 1024;
        assert!(matches!(
            config.vfs_config(),
            Err(StateError::InvalidChunkSize(size)) if size == 5 * 1024 * 1024 * 1024
        ));

        config.cache.chunk_size_bytes = 0;
        assert!(matches!(
            config.vfs_config(),
            Err(StateError::InvalidChunkSize(0))
        ));

        config.cache.chunk_size_bytes = VfsConfig::MAX_CHUNK_SIZE;
        assert_eq!(
            config.vfs_config().unwrap().chunk_size,
            VfsConfig::MAX_CHUNK_SIZE
        );
    }
}
