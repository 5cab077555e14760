use clap::Parser;
use lib_status::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Game-Network Status Stream Client", version)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[clap(long, env = "STATUS_URL", help = "WebSocket URL of the status stream.")]
    pub url: Option<String>,

    #[clap(long, env = "STATUS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "STATUS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "STATUS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "STATUS_CONNECTION_TIMEOUT_MS", help = "Milliseconds a single open attempt may take before it is abandoned.")]
    pub connection_timeout_ms: Option<u64>,

    #[clap(long, env = "STATUS_MAX_RECONNECT_ATTEMPTS", help = "Retry budget before the client reports terminal failure.")]
    pub max_reconnect_attempts: Option<u32>,

    #[clap(long, env = "STATUS_RECONNECT_INTERVALS_MS", value_delimiter = ',', help = "Comma-separated backoff table in milliseconds; the last entry repeats.")]
    pub reconnect_intervals_ms: Option<Vec<u64>>,

    #[clap(long, env = "STATUS_DISABLE_RECONNECT", help = "Never schedule reconnect attempts (testing/operator override).")]
    pub disable_reconnect: Option<bool>,

    #[clap(long, env = "STATUS_PROTOCOL_VERSION", help = "Highest stream protocol version this client understands.")]
    pub supported_protocol_version: Option<u32>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            url: other.url.or(self.url),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            connection_timeout_ms: other.connection_timeout_ms.or(self.connection_timeout_ms),
            max_reconnect_attempts: other.max_reconnect_attempts.or(self.max_reconnect_attempts),
            reconnect_intervals_ms: other.reconnect_intervals_ms.or(self.reconnect_intervals_ms),
            disable_reconnect: other.disable_reconnect.or(self.disable_reconnect),
            supported_protocol_version: other
                .supported_protocol_version
                .or(self.supported_protocol_version),
        }
    }

    /// Resolves into the library's connection settings, filling gaps from
    /// the library defaults.
    pub fn connection(&self) -> ConnectionConfig {
        let defaults = ConnectionConfig::default();
        ConnectionConfig {
            url: self.url.clone().unwrap_or(defaults.url),
            connection_timeout_ms: self
                .connection_timeout_ms
                .unwrap_or(defaults.connection_timeout_ms),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_intervals_ms: self
                .reconnect_intervals_ms
                .clone()
                .unwrap_or(defaults.reconnect_intervals_ms),
            disable_reconnect: self.disable_reconnect.unwrap_or(defaults.disable_reconnect),
            supported_protocol_version: self
                .supported_protocol_version
                .unwrap_or(defaults.supported_protocol_version),
        }
    }
}

pub fn load_config() -> Config {
    // 1. Load defaults
    let default_config = Config {
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        ..Default::default()
    };

    // 2. Load from config file (client_status.conf) if present.
    //    Allow overriding default config file path with CLI arg.
    let cli_args_for_path = Config::parse(); // Parse CLI to get potential config_path override early

    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("client_status.conf"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                log::warn!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            log::warn!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // 3. Override with environment variables and CLI arguments.
    //    clap::Parser automatically handles env vars and CLI args; we merge
    //    them over the file config.
    let cli_args_final = Config::parse();
    current_config.merge(cli_args_final)
}
