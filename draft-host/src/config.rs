// Configuration loading and parsing (draft.toml).

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

/// Top-level assembled configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub draft: DraftConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket hub binds to.
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding the character records.
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Explicit participant ids to draft with. When empty, every
    /// player-owned actor in the store is selected.
    pub participants: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            draft: DraftConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 30040,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: "skilldraft.db".to_string(),
        }
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        DraftConfig {
            participants: Vec::new(),
        }
    }
}

/// Load configuration from the first `draft.toml` found: the current
/// directory, then the per-user config directory. Missing files are not an
/// error; defaults apply.
pub fn load_config() -> Result<Config, ConfigError> {
    match find_config_file() {
        Some(path) => load_from_path(&path),
        None => Ok(Config::default()),
    }
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("draft.toml");
    if local.exists() {
        return Some(local);
    }
    let dirs = ProjectDirs::from("", "", "skilldraft")?;
    let path = dirs.config_dir().join("draft.toml");
    path.exists().then_some(path)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".to_string(),
            message: "port must be non-zero".to_string(),
        });
    }
    if config.store.db_path.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "store.db_path".to_string(),
            message: "db_path must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 30040);
        assert!(config.draft.participants.is_empty());
    }

    #[test]
    fn parses_full_file() {
        let raw = r#"
            [server]
            bind = "0.0.0.0"
            port = 9001

            [store]
            db_path = "/tmp/draft-test.db"

            [draft]
            participants = ["a1", "a2", "a3"]
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.store.db_path, "/tmp/draft-test.db");
        assert_eq!(config.draft.participants, vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let raw = r#"
            [server]
            port = 9002
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9002);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.store.db_path, "skilldraft.db");
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = Config {
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 0,
            },
            ..Config::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
