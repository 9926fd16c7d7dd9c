//! Configuration for the kv-bench harness.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::backend::BackendKind;
use crate::scanner::{DEFAULT_CAPACITY, MIN_CAPACITY};

/// Command-line arguments for the benchmark harness
#[derive(Parser, Debug)]
#[command(name = "kv-bench")]
#[command(author = "kv-bench authors")]
#[command(version = "0.1.0")]
#[command(about = "Stream get/put commands into a key-value backend", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backend to drive (dummy, memory, memcached)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Backend server address (e.g., 127.0.0.1:11211)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Read commands from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Scan buffer capacity in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub bench: BenchConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Harness-related configuration
#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    /// Scan buffer capacity in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Command stream file; stdin when absent
    pub input: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            input: None,
        }
    }
}

/// Backend-related configuration
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Which backend to drive
    #[serde(default = "default_backend")]
    pub kind: BackendKind,
    /// Server address, used by the memcached backend
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend(),
            address: default_address(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_CAPACITY
}

fn default_backend() -> BackendKind {
    BackendKind::Dummy
}

fn default_address() -> String {
    "127.0.0.1:11211".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub address: String,
    pub input: Option<PathBuf>,
    pub buffer_size: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::resolve(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    fn resolve(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            backend: cli.backend.unwrap_or(toml_config.backend.kind),
            address: cli.address.unwrap_or(toml_config.backend.address),
            input: cli.input.or(toml_config.bench.input),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.bench.buffer_size),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.buffer_size < MIN_CAPACITY {
            return Err(ConfigError::BufferTooSmall(config.buffer_size));
        }
        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    BufferTooSmall(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::BufferTooSmall(size) => {
                write!(
                    f,
                    "Buffer size {} is below the minimum of {} bytes",
                    size, MIN_CAPACITY
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.bench.buffer_size, DEFAULT_CAPACITY);
        assert_eq!(config.bench.input, None);
        assert_eq!(config.backend.kind, BackendKind::Dummy);
        assert_eq!(config.backend.address, "127.0.0.1:11211");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [bench]
            buffer_size = 8192
            input = "commands.txt"

            [backend]
            kind = "memcached"
            address = "10.0.0.5:11211"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bench.buffer_size, 8192);
        assert_eq!(config.bench.input, Some(PathBuf::from("commands.txt")));
        assert_eq!(config.backend.kind, BackendKind::Memcached);
        assert_eq!(config.backend.address, "10.0.0.5:11211");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_backend_kind_is_rejected() {
        let toml_str = r#"
            [backend]
            kind = "redis"
        "#;
        assert!(toml::from_str::<TomlConfig>(toml_str).is_err());
    }

    #[test]
    fn test_cli_takes_precedence_over_toml() {
        let cli = CliArgs::try_parse_from([
            "kv-bench",
            "--backend",
            "memory",
            "--buffer-size",
            "1024",
            "--log-level",
            "trace",
        ])
        .unwrap();
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [bench]
            buffer_size = 8192

            [backend]
            kind = "memcached"
            address = "10.0.0.5:11211"

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let config = Config::resolve(cli, toml_config).unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.log_level, "trace");
        // Not set on the CLI: the file value stands.
        assert_eq!(config.address, "10.0.0.5:11211");
    }

    #[test]
    fn test_buffer_size_below_minimum_is_rejected() {
        let cli = CliArgs::try_parse_from(["kv-bench", "--buffer-size", "8"]).unwrap();
        match Config::resolve(cli, TomlConfig::default()) {
            Err(ConfigError::BufferTooSmall(8)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
