//! # Status Stream Message Parser
//!
//! Stateless translation of one raw text frame into a validated, classified
//! [`Envelope`]. All of the wire protocol's historical looseness is absorbed
//! here: the discriminator may arrive as `type` or as the legacy `packet_id`
//! alias, and a per-server snapshot entry may be a bare player count or a
//! structured record. Downstream code only ever sees the canonical shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire value of the `type` field for full snapshots.
pub const KIND_FULL: &str = "full";
/// Wire value for maintenance directives.
pub const KIND_MAINTENANCE: &str = "maintenance";
/// Wire value for player join events.
pub const KIND_PLAYER_ADD: &str = "players_update_add";
/// Wire value for player leave events.
pub const KIND_PLAYER_REMOVE: &str = "players_update_remove";
/// Wire value for per-server occupancy updates.
pub const KIND_SERVER_UPDATE: &str = "server_update";

/// Why a frame could not be turned into an [`Envelope`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no `type` (or legacy `packet_id`) discriminator")]
    MissingType,

    #[error("`{kind}` message is missing required field `{field}`")]
    MissingField { kind: String, field: &'static str },
}

/// Canonical per-server snapshot entry.
///
/// A bare integer on the wire means "this many players, server up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub online: i64,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
}

/// Full state snapshot of the tracked network.
#[derive(Debug, Clone, PartialEq)]
pub struct FullSnapshot {
    /// Normalized server map; `None` when the snapshot carried no `servers`
    /// field (a players-only snapshot).
    pub servers: Option<BTreeMap<String, ServerEntry>>,
    /// Raw players blob as sent by the service.
    pub players: Option<Value>,
    pub running_time: Option<i64>,
    pub total_running_time: Option<i64>,
    pub is_maintenance: Option<bool>,
    pub maintenance_start_time: Option<i64>,
    /// Informational only; never validated by this client.
    pub protocol_version: Option<i64>,
}

/// Authoritative maintenance-mode override.
///
/// `status` is kept raw: the service has historically sent booleans and the
/// strings `"true"`/`"false"`; interpretation belongs to the maintenance
/// handler.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceDirective {
    pub status: Value,
    pub maintenance_start_time: Option<i64>,
}

/// The nested player record carried by player events and server updates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub uuid: Option<String>,
    pub current_server: Option<String>,
    pub previous_server: Option<String>,
    pub new_server: Option<String>,
    pub player_info: Option<Value>,
    /// The record exactly as it arrived, for consumers that want fields this
    /// client does not model.
    pub raw: Value,
}

/// A player join or leave message.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEventMessage {
    pub player: PlayerRecord,
    pub total_online_players: Option<Value>,
    /// The wire kind string, re-emitted verbatim on player-update events.
    pub kind: String,
}

/// A per-server occupancy update, optionally carrying a player move.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerUpdateMessage {
    pub servers: BTreeMap<String, ServerEntry>,
    pub player: Option<PlayerRecord>,
}

/// The canonical, validated, kind-discriminated form of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Full(FullSnapshot),
    Maintenance(MaintenanceDirective),
    PlayerAdd(PlayerEventMessage),
    PlayerRemove(PlayerEventMessage),
    ServerUpdate(ServerUpdateMessage),
    /// Well-formed frame with an unrecognized kind. Kept for forward
    /// compatibility with server-side protocol additions; the router logs
    /// and drops these.
    Unclassified { kind: String, raw: Value },
}

/// Parses one raw text frame into an [`Envelope`].
pub fn parse(raw: &str) -> Result<Envelope, ParseError> {
    let value: Value = serde_json::from_str(raw)?;
    let obj = value.as_object().ok_or(ParseError::NotAnObject)?;
    let kind = message_kind(obj).ok_or(ParseError::MissingType)?;

    match kind.as_str() {
        KIND_FULL => parse_full(obj).map(Envelope::Full),
        KIND_MAINTENANCE => parse_maintenance(obj).map(Envelope::Maintenance),
        KIND_PLAYER_ADD => parse_player_event(obj, &kind).map(Envelope::PlayerAdd),
        KIND_PLAYER_REMOVE => parse_player_event(obj, &kind).map(Envelope::PlayerRemove),
        KIND_SERVER_UPDATE => parse_server_update(obj).map(Envelope::ServerUpdate),
        _ => Ok(Envelope::Unclassified {
            kind: kind.clone(),
            raw: value.clone(),
        }),
    }
}

/// Normalizes a raw `servers` blob into the canonical map.
///
/// Numeric entries become `{online: n, isOnline: true}`; object entries pass
/// through with their own fields; anything else (null, string, ...) is
/// dropped silently so one malformed entry never invalidates the snapshot.
pub fn normalize_server_data(raw: &Value) -> BTreeMap<String, ServerEntry> {
    let mut normalized = BTreeMap::new();
    let Some(map) = raw.as_object() else {
        return normalized;
    };
    for (name, entry) in map {
        if let Some(count) = as_count(entry) {
            normalized.insert(
                name.clone(),
                ServerEntry {
                    online: count,
                    is_online: true,
                },
            );
        } else if let Some(obj) = entry.as_object() {
            normalized.insert(
                name.clone(),
                ServerEntry {
                    online: obj.get("online").and_then(as_count).unwrap_or(0),
                    is_online: obj.get("isOnline").and_then(Value::as_bool).unwrap_or(true),
                },
            );
        }
    }
    normalized
}

/// Extracts and normalizes the `servers` field of a message, if present.
pub fn extract_server_data(message: &Value) -> Option<BTreeMap<String, ServerEntry>> {
    message
        .as_object()
        .and_then(|obj| obj.get("servers"))
        .map(normalize_server_data)
}

/// `true` when the message carries a nested player record.
pub fn has_player_data(message: &Value) -> bool {
    message
        .as_object()
        .and_then(|obj| obj.get("player"))
        .is_some_and(Value::is_object)
}

/// Extracts the `playerInfo` blob of the nested player record, if any.
pub fn extract_player_info(message: &Value) -> Option<Value> {
    message
        .as_object()
        .and_then(|obj| obj.get("player"))
        .and_then(Value::as_object)
        .and_then(|player| player.get("playerInfo"))
        .cloned()
}

fn message_kind(obj: &Map<String, Value>) -> Option<String> {
    // `packet_id` is the legacy discriminator; both spellings normalize to
    // one kind string.
    for key in ["type", "packet_id"] {
        match obj.get(key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn parse_full(obj: &Map<String, Value>) -> Result<FullSnapshot, ParseError> {
    if !obj.contains_key("servers") && !obj.contains_key("players") {
        return Err(ParseError::MissingField {
            kind: KIND_FULL.to_string(),
            field: "servers/players",
        });
    }
    Ok(FullSnapshot {
        servers: obj.get("servers").map(normalize_server_data),
        players: obj.get("players").cloned(),
        running_time: int_field(obj, "runningTime"),
        total_running_time: int_field(obj, "totalRunningTime"),
        is_maintenance: obj.get("isMaintenance").and_then(Value::as_bool),
        maintenance_start_time: int_field(obj, "maintenanceStartTime"),
        protocol_version: int_field(obj, "protocol_version"),
    })
}

fn parse_maintenance(obj: &Map<String, Value>) -> Result<MaintenanceDirective, ParseError> {
    let status = obj.get("status").ok_or_else(|| ParseError::MissingField {
        kind: KIND_MAINTENANCE.to_string(),
        field: "status",
    })?;
    Ok(MaintenanceDirective {
        status: status.clone(),
        maintenance_start_time: int_field(obj, "maintenanceStartTime"),
    })
}

fn parse_player_event(obj: &Map<String, Value>, kind: &str) -> Result<PlayerEventMessage, ParseError> {
    let player = obj
        .get("player")
        .and_then(player_record)
        .ok_or_else(|| ParseError::MissingField {
            kind: kind.to_string(),
            field: "player",
        })?;
    Ok(PlayerEventMessage {
        player,
        total_online_players: obj
            .get("totalOnlinePlayers")
            .filter(|v| !v.is_null())
            .cloned(),
        kind: kind.to_string(),
    })
}

fn parse_server_update(obj: &Map<String, Value>) -> Result<ServerUpdateMessage, ParseError> {
    let servers = obj.get("servers").ok_or_else(|| ParseError::MissingField {
        kind: KIND_SERVER_UPDATE.to_string(),
        field: "servers",
    })?;
    Ok(ServerUpdateMessage {
        servers: normalize_server_data(servers),
        player: obj.get("player").and_then(player_record),
    })
}

fn player_record(value: &Value) -> Option<PlayerRecord> {
    let obj = value.as_object()?;
    Some(PlayerRecord {
        uuid: str_field(obj, "uuid"),
        current_server: str_field(obj, "currentServer"),
        previous_server: str_field(obj, "previousServer"),
        new_server: str_field(obj, "newServer"),
        player_info: obj.get("playerInfo").cloned(),
        raw: value.clone(),
    })
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    obj.get(key).and_then(as_count)
}

fn as_count(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_keeps_objects_and_lifts_integers_and_drops_junk() {
        let raw = json!({"a": 10, "b": {"online": 5, "isOnline": false}, "c": null});
        let normalized = normalize_server_data(&raw);

        assert_eq!(
            normalized.get("a"),
            Some(&ServerEntry {
                online: 10,
                is_online: true
            })
        );
        assert_eq!(
            normalized.get("b"),
            Some(&ServerEntry {
                online: 5,
                is_online: false
            })
        );
        assert!(!normalized.contains_key("c"));
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn normalize_drops_string_entries() {
        let raw = json!({"lobby": "busy", "pvp": 3});
        let normalized = normalize_server_data(&raw);
        assert_eq!(normalized.len(), 1);
        assert!(normalized.contains_key("pvp"));
    }

    #[test]
    fn full_requires_servers_or_players() {
        let err = parse(r#"{"type":"full","runningTime":5}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field, .. } if field == "servers/players"));

        let ok = parse(r#"{"type":"full","servers":{"lobby":3}}"#).unwrap();
        match ok {
            Envelope::Full(snapshot) => {
                let servers = snapshot.servers.unwrap();
                assert_eq!(servers["lobby"].online, 3);
                assert!(servers["lobby"].is_online);
            }
            other => panic!("expected full snapshot, got {other:?}"),
        }
    }

    #[test]
    fn packet_id_alias_is_normalized_into_type() {
        let envelope = parse(r#"{"packet_id":"maintenance","status":true}"#).unwrap();
        assert!(matches!(envelope, Envelope::Maintenance(_)));
    }

    #[test]
    fn maintenance_requires_status() {
        let err = parse(r#"{"type":"maintenance"}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "status", .. }));
    }

    #[test]
    fn player_events_require_a_nested_player_record() {
        let err = parse(r#"{"type":"players_update_add","totalOnlinePlayers":9}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "player", .. }));

        let envelope = parse(
            r#"{"type":"players_update_add","player":{"uuid":"x","currentServer":"s1"},"totalOnlinePlayers":10}"#,
        )
        .unwrap();
        match envelope {
            Envelope::PlayerAdd(msg) => {
                assert_eq!(msg.player.uuid.as_deref(), Some("x"));
                assert_eq!(msg.player.current_server.as_deref(), Some("s1"));
                assert_eq!(msg.total_online_players, Some(json!(10)));
            }
            other => panic!("expected player add, got {other:?}"),
        }
    }

    #[test]
    fn server_update_carries_optional_move_record() {
        let envelope = parse(
            r#"{"type":"server_update","servers":{"s1":4,"s2":6},"player":{"uuid":"x","previousServer":"s1","newServer":"s2"}}"#,
        )
        .unwrap();
        match envelope {
            Envelope::ServerUpdate(msg) => {
                assert_eq!(msg.servers.len(), 2);
                let player = msg.player.unwrap();
                assert_eq!(player.previous_server.as_deref(), Some("s1"));
                assert_eq!(player.new_server.as_deref(), Some("s2"));
            }
            other => panic!("expected server update, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_unclassified_not_an_error() {
        let envelope = parse(r#"{"type":"notice_list","entries":[]}"#).unwrap();
        match envelope {
            Envelope::Unclassified { kind, .. } => assert_eq!(kind, "notice_list"),
            other => panic!("expected unclassified, got {other:?}"),
        }
    }

    #[test]
    fn malformed_frames_fail_to_parse() {
        assert!(matches!(parse("not json"), Err(ParseError::Json(_))));
        assert!(matches!(parse("[1,2,3]"), Err(ParseError::NotAnObject)));
        assert!(matches!(parse(r#"{"status":true}"#), Err(ParseError::MissingType)));
    }

    #[test]
    fn helpers_return_none_or_false_when_fields_are_absent() {
        let message = json!({"type": "server_update"});
        assert!(extract_server_data(&message).is_none());
        assert!(!has_player_data(&message));
        assert!(extract_player_info(&message).is_none());

        let message = json!({"player": {"uuid": "x", "playerInfo": {"name": "Steve"}}});
        assert!(has_player_data(&message));
        assert_eq!(
            extract_player_info(&message),
            Some(json!({"name": "Steve"}))
        );
    }
}
