//! Configuration module for the CAVE server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. With neither,
//! the server listens on port 7777 on all interfaces.

use crate::protocol::DEFAULT_PORT;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the chat server
#[derive(Parser, Debug)]
#[command(name = "cave-server")]
#[command(version = "0.1.0")]
#[command(about = "A minimal line-oriented chat server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:7777)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum number of connected clients
    #[arg(short = 'n', long)]
    pub max_clients: Option<usize>,

    /// Maximum input line length in bytes, including the terminator
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Maximum bytes queued for a single client before it is dropped
    #[arg(long)]
    pub max_pending_output: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Client table capacity
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Input line bound in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Per-client outbound queue bound in bytes
    #[serde(default = "default_max_pending_output")]
    pub max_pending_output: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_clients: default_max_clients(),
            max_line_length: default_max_line_length(),
            max_pending_output: default_max_pending_output(),
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

fn default_listen() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_max_clients() -> usize {
    32
}

fn default_max_line_length() -> usize {
    4096
}

fn default_max_pending_output() -> usize {
    256 * 1024 // 256 KB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub max_clients: usize,
    pub max_line_length: usize,
    pub max_pending_output: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config).validate()
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            max_clients: cli.max_clients.unwrap_or(toml_config.server.max_clients),
            max_line_length: cli
                .max_line_length
                .unwrap_or(toml_config.server.max_line_length),
            max_pending_output: cli
                .max_pending_output
                .unwrap_or(toml_config.server.max_pending_output),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be at least 1"));
        }
        // Room for at least one byte plus the terminator.
        if self.max_line_length < 2 {
            return Err(ConfigError::Invalid("max_line_length must be at least 2"));
        }
        Ok(self)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str),
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
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {reason}"),
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
        assert_eq!(config.server.listen, "0.0.0.0:7777");
        assert_eq!(config.server.max_clients, 32);
        assert_eq!(config.server.max_line_length, 4096);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_no_arguments_uses_defaults() {
        let cli = CliArgs::try_parse_from(["cave-server"]).unwrap();
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.listen, "0.0.0.0:7777");
        assert_eq!(config.max_clients, 32);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:9000"
            max_clients = 4

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.max_clients, 4);
        assert_eq!(config.server.max_line_length, 4096);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:9000"
            max_clients = 4
            "#,
        )
        .unwrap();
        let cli =
            CliArgs::try_parse_from(["cave-server", "-n", "8", "--log-level", "warn"]).unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.max_clients, 8);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_zero_clients_rejected() {
        let cli = CliArgs::try_parse_from(["cave-server", "--max-clients", "0"]).unwrap();
        assert!(matches!(
            Config::from_cli(cli),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_config_file() {
        let cli =
            CliArgs::try_parse_from(["cave-server", "-c", "/nonexistent/cave.toml"]).unwrap();
        assert!(matches!(
            Config::from_cli(cli),
            Err(ConfigError::FileRead(_, _))
        ));
    }
}
