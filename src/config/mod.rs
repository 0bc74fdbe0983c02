//! Configuration module
//!
//! Handles loading and saving bridgewire configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{
    Codec, DEFAULT_MAGIC, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAYLOAD_LEN, DEFAULT_PORT,
};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Wire protocol constants, must match the peer runtime
    #[serde(default)]
    pub wire: WireConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log filter directive, overrides `verbose` (e.g. "bridgewire=trace")
    pub log_filter: Option<String>,
}

/// Wire protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Envelope sentinel
    #[serde(default = "default_magic")]
    pub magic: u16,
    /// Largest accepted length prefix or element count
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,
    /// Deepest accepted nesting of messages
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_magic() -> u16 {
    DEFAULT_MAGIC
}

fn default_max_payload_len() -> usize {
    DEFAULT_MAX_PAYLOAD_LEN
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            magic: default_magic(),
            max_payload_len: default_max_payload_len(),
            max_depth: default_max_depth(),
        }
    }
}

impl WireConfig {
    /// Build a codec over the process-wide registry
    pub fn codec(&self) -> Codec {
        Codec::new()
            .with_magic(self.magic)
            .with_max_payload_len(self.max_payload_len)
            .with_max_depth(self.max_depth)
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port to listen on or connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Time to wait for a reply in ms
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("bridgewire/config.toml")),
            Some(PathBuf::from("./bridgewire.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.wire.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "wire.max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.wire.max_payload_len > i32::MAX as usize {
            return Err(ConfigError::Invalid {
                field: "wire.max_payload_len",
                reason: format!("must not exceed {}", i32::MAX),
            });
        }
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            verbose: false,
            log_filter: Some("bridgewire=info".to_string()),
        },
        network: NetworkConfig {
            bind_address: "0.0.0.0".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.port, DEFAULT_PORT);
        assert_eq!(config.wire.magic, DEFAULT_MAGIC);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.wire.magic = 0xCAFE;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.port, config.network.port);
        assert_eq!(loaded.wire.magic, 0xCAFE);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[wire]\nmagic = 0xBEEF\n\n[network]\nport = 9000").unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.wire.magic, 0xBEEF);
        assert_eq!(loaded.wire.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(loaded.network.port, 9000);
        assert_eq!(loaded.network.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[wire]\nmax_depth = 0").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid { field: "wire.max_depth", .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = PathBuf::from("/nonexistent/bridgewire.toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.network.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_codec_uses_configured_magic() {
        let wire = WireConfig {
            magic: 0x1234,
            ..Default::default()
        };
        assert_eq!(wire.codec().magic(), 0x1234);
    }
}
