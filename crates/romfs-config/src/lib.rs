//! # romfs-config
//!
//! Configuration for romfs tools.
//!
//! Loads configuration from:
//! 1. `~/.romfs/config.toml` (global)
//! 2. `.romfs/config.toml` (project-local, overrides global key by key)
//! 3. Environment variables (highest priority)

pub mod logging;

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard};
use romfs_path::{PathFlags, ENTRY_NAME_LENGTH_MAX};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use logging::{init_logging, LogLevel};

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read()
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write() = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub path: PathConfig,
    pub table: TableConfig,
    pub build: BuildConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let mut config = Self::load_from(global.as_deref(), Some(Path::new(".romfs/config.toml")))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Layers the given files (missing files are skipped) over the defaults.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                debug!("Loading config from {:?}", path);
                let contents = std::fs::read_to_string(path)?;
                let layer: toml::Table = toml::from_str(&contents)?;
                merge_tables(&mut merged, layer);
            }
        }
        Ok(Config::deserialize(toml::Value::Table(merged))?)
    }

    /// Global config path: ~/.romfs/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".romfs/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `ROMFS_DIR_BUCKETS`, `ROMFS_FILE_BUCKETS` and `ROMFS_LOG_LEVEL`
    /// as resolved by `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let parse_count = |key: &'static str, value: String| {
            value
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue { key, value })
        };
        if let Some(value) = lookup("ROMFS_DIR_BUCKETS") {
            self.table.directory_buckets = parse_count("ROMFS_DIR_BUCKETS", value)?;
        }
        if let Some(value) = lookup("ROMFS_FILE_BUCKETS") {
            self.table.file_buckets = parse_count("ROMFS_FILE_BUCKETS", value)?;
        }
        if let Some(value) = lookup("ROMFS_LOG_LEVEL") {
            if value.parse::<LogLevel>().is_err() {
                return Err(ConfigError::InvalidValue {
                    key: "ROMFS_LOG_LEVEL",
                    value,
                });
            }
            self.log.level = value;
        }
        Ok(())
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Recursively overlays `overlay` onto `base`; tables merge, values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Default normalization flags and buffer size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Output buffer for normalization, including the terminator
    pub max_path_length: usize,
    pub windows_path: bool,
    pub relative_path: bool,
    pub empty_path: bool,
    pub mount_name: bool,
    pub backslash: bool,
    pub all_characters: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_path_length: ENTRY_NAME_LENGTH_MAX + 1,
            windows_path: false,
            relative_path: false,
            empty_path: false,
            mount_name: false,
            backslash: false,
            all_characters: false,
        }
    }
}

impl PathConfig {
    pub fn flags(&self) -> PathFlags {
        let mut flags = PathFlags::new();
        if self.windows_path {
            flags = flags.allow_windows_path();
        }
        if self.relative_path {
            flags = flags.allow_relative_path();
        }
        if self.empty_path {
            flags = flags.allow_empty_path();
        }
        if self.mount_name {
            flags = flags.allow_mount_name();
        }
        if self.backslash {
            flags = flags.allow_backslash();
        }
        if self.all_characters {
            flags = flags.allow_all_characters();
        }
        flags
    }
}

/// Hash table sizing (0 = derive from entry count)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub directory_buckets: u32,
    pub file_buckets: u32,
}

/// Image builder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// File data alignment in bytes (power of two)
    pub data_alignment: u64,
    pub follow_symlinks: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            data_alignment: 0x10,
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LogConfig {
    /// Configured level, `Warn` when unparseable.
    pub fn level(&self) -> LogLevel {
        self.level.parse().unwrap_or(LogLevel::Warn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.path.max_path_length, 0x301);
        assert_eq!(config.path.flags(), PathFlags::new());
        assert_eq!(config.build.data_alignment, 16);
        assert_eq!(config.log.level(), LogLevel::Warn);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[path]"));
        assert!(toml_str.contains("[table]"));
        assert!(toml_str.contains("data_alignment = 16"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_flags_from_config() {
        let path = PathConfig {
            windows_path: true,
            mount_name: true,
            ..PathConfig::default()
        };
        assert_eq!(
            path.flags(),
            PathFlags::new().allow_windows_path().allow_mount_name()
        );
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("ROMFS_DIR_BUCKETS", "31"), ("ROMFS_LOG_LEVEL", "debug")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.table.directory_buckets, 31);
        assert_eq!(config.table.file_buckets, 0);
        assert_eq!(config.log.level(), LogLevel::Debug);

        let err = config
            .apply_overrides(|key| (key == "ROMFS_FILE_BUCKETS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "ROMFS_FILE_BUCKETS", .. }));
    }

    #[test]
    fn test_merge_tables_is_key_by_key() {
        let mut base: toml::Table = toml::from_str("[table]\ndirectory_buckets = 7\nfile_buckets = 9").unwrap();
        let overlay: toml::Table = toml::from_str("[table]\nfile_buckets = 11").unwrap();
        merge_tables(&mut base, overlay);
        let config = Config::deserialize(toml::Value::Table(base)).unwrap();
        assert_eq!(config.table.directory_buckets, 7);
        assert_eq!(config.table.file_buckets, 11);
    }
}
