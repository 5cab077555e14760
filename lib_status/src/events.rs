//! Public domain events published to downstream consumers.
//!
//! Every event is an immutable snapshot: the client never mutates a payload
//! after emission, and events are never buffered or replayed to late
//! subscribers.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::maintenance::MaintenanceState;
use crate::parser::ServerEntry;

/// Exhaustive set of public event names, used as emitter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Connected,
    Disconnected,
    Reconnecting,
    ConnectionFailed,
    Error,
    FullUpdate,
    PlayerAdd,
    PlayerRemove,
    PlayerMove,
    PlayerUpdate,
    ServerUpdate,
    MaintenanceUpdate,
}

impl EventName {
    /// Every event name, for consumers that subscribe across the board.
    pub const ALL: [EventName; 12] = [
        EventName::Connected,
        EventName::Disconnected,
        EventName::Reconnecting,
        EventName::ConnectionFailed,
        EventName::Error,
        EventName::FullUpdate,
        EventName::PlayerAdd,
        EventName::PlayerRemove,
        EventName::PlayerMove,
        EventName::PlayerUpdate,
        EventName::ServerUpdate,
        EventName::MaintenanceUpdate,
    ];
}

/// Aggregate player-count block of a full snapshot.
///
/// The service reports `online` as a string ("0", "17", ...); numeric values
/// are stringified on the way in so consumers see one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayersInfo {
    pub online: String,
    pub current_players: Map<String, Value>,
}

impl Default for PlayersInfo {
    fn default() -> Self {
        Self {
            online: "0".to_string(),
            current_players: Map::new(),
        }
    }
}

impl PlayersInfo {
    /// Builds from the raw `players` blob; anything unusable falls back to
    /// the empty default.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            online: obj
                .get("online")
                .and_then(stringify_count)
                .unwrap_or_else(|| "0".to_string()),
            current_players: obj
                .get("currentPlayers")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullUpdate {
    pub servers: BTreeMap<String, ServerEntry>,
    pub players: PlayersInfo,
    pub running_time: Option<i64>,
    pub total_running_time: Option<i64>,
    pub is_maintenance: bool,
    pub maintenance_start_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerAddEvent {
    pub player_id: Option<String>,
    pub server_id: Option<String>,
    pub player_info: Option<Value>,
    /// The player record exactly as it arrived.
    pub player: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRemoveEvent {
    pub player_id: Option<String>,
    pub player_info: Option<Value>,
    pub player: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMoveEvent {
    pub player_id: Option<String>,
    pub from_server: Option<String>,
    pub to_server: Option<String>,
    pub player_info: Option<Value>,
}

/// Aggregate-count companion event fired after a join or leave.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerUpdateEvent {
    /// Stringified total, or `None` when the triggering message carried no
    /// authoritative count (leaves never do).
    pub total_online_players: Option<String>,
    /// The wire kind string of the triggering message.
    pub kind: String,
    pub player: Option<Value>,
}

/// One public event. Fire-and-forget, ordered per emitter instance.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected {
        code: Option<u16>,
        reason: String,
    },
    Reconnecting {
        attempt: u32,
        delay_ms: u64,
        max_attempts: u32,
    },
    ConnectionFailed {
        max_attempts: u32,
        total_attempts: u32,
    },
    Error {
        cause: String,
    },
    FullUpdate(FullUpdate),
    PlayerAdd(PlayerAddEvent),
    PlayerRemove(PlayerRemoveEvent),
    PlayerMove(PlayerMoveEvent),
    PlayerUpdate(PlayerUpdateEvent),
    ServerUpdate {
        servers: BTreeMap<String, ServerEntry>,
    },
    MaintenanceUpdate(MaintenanceState),
}

impl ClientEvent {
    pub fn name(&self) -> EventName {
        match self {
            ClientEvent::Connected => EventName::Connected,
            ClientEvent::Disconnected { .. } => EventName::Disconnected,
            ClientEvent::Reconnecting { .. } => EventName::Reconnecting,
            ClientEvent::ConnectionFailed { .. } => EventName::ConnectionFailed,
            ClientEvent::Error { .. } => EventName::Error,
            ClientEvent::FullUpdate(_) => EventName::FullUpdate,
            ClientEvent::PlayerAdd(_) => EventName::PlayerAdd,
            ClientEvent::PlayerRemove(_) => EventName::PlayerRemove,
            ClientEvent::PlayerMove(_) => EventName::PlayerMove,
            ClientEvent::PlayerUpdate(_) => EventName::PlayerUpdate,
            ClientEvent::ServerUpdate { .. } => EventName::ServerUpdate,
            ClientEvent::MaintenanceUpdate(_) => EventName::MaintenanceUpdate,
        }
    }
}

/// Stringifies a count that may arrive as a JSON number or string.
pub(crate) fn stringify_count(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn players_info_defaults_when_absent_or_malformed() {
        assert_eq!(PlayersInfo::from_value(None), PlayersInfo::default());
        assert_eq!(
            PlayersInfo::from_value(Some(&json!("nope"))),
            PlayersInfo::default()
        );
        assert_eq!(PlayersInfo::default().online, "0");
    }

    #[test]
    fn players_info_stringifies_numeric_online() {
        let info = PlayersInfo::from_value(Some(
            &json!({"online": 42, "currentPlayers": {"x": {"currentServer": "s1"}}}),
        ));
        assert_eq!(info.online, "42");
        assert!(info.current_players.contains_key("x"));
    }

    #[test]
    fn every_event_maps_to_its_name() {
        let event = ClientEvent::Reconnecting {
            attempt: 1,
            delay_ms: 1000,
            max_attempts: 10,
        };
        assert_eq!(event.name(), EventName::Reconnecting);
        assert_eq!(EventName::ALL.len(), 12);
    }
}
