use serde::{Deserialize, Serialize};

/// Default connection target for local development setups.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:9002/ws";

/// Default backoff table: quick retries first, then a 30s plateau.
pub const DEFAULT_RECONNECT_INTERVALS_MS: [u64; 5] = [1000, 2000, 5000, 10000, 30000];

/// Immutable connection settings for the status client.
///
/// Supplied at construction and only ever replaced wholesale through
/// `update_config`; nothing mutates an instance in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// WebSocket URL of the status stream.
    pub url: String,
    /// How long a single open attempt may stay in CONNECTING before it is abandoned.
    pub connection_timeout_ms: u64,
    /// Retry budget before the client reports terminal failure.
    pub max_reconnect_attempts: u32,
    /// Ordered backoff table, indexed by attempt number; the last entry repeats.
    pub reconnect_intervals_ms: Vec<u64>,
    /// Operator/testing override: never schedule retries.
    pub disable_reconnect: bool,
    /// Highest stream protocol version this client understands. Informational:
    /// the `protocol_version` on full snapshots is surfaced to the caller, not
    /// validated here.
    pub supported_protocol_version: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connection_timeout_ms: 10_000,
            max_reconnect_attempts: 10,
            reconnect_intervals_ms: DEFAULT_RECONNECT_INTERVALS_MS.to_vec(),
            disable_reconnect: false,
            supported_protocol_version: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_table_is_nonempty_and_sorted() {
        let config = ConnectionConfig::default();
        assert!(!config.reconnect_intervals_ms.is_empty());
        assert!(config
            .reconnect_intervals_ms
            .windows(2)
            .all(|w| w[0] <= w[1]));
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"url":"wss://example.net/ws","maxReconnectAttempts":3}"#)
                .unwrap();
        assert_eq!(config.url, "wss://example.net/ws");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.connection_timeout_ms, 10_000);
        assert!(!config.disable_reconnect);
    }
}
