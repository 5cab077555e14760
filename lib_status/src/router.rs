//! # Message Router
//!
//! Consumes raw inbound frames, parses them, feeds maintenance-relevant
//! messages to the [`MaintenanceHandler`] and emits one or more domain
//! events per message.

use std::sync::Arc;

use crate::emitter::EventEmitter;
use crate::events::{
    stringify_count, ClientEvent, EventName, FullUpdate, PlayerAddEvent, PlayerMoveEvent,
    PlayerRemoveEvent, PlayerUpdateEvent, PlayersInfo,
};
use crate::maintenance::MaintenanceHandler;
use crate::parser::{self, Envelope, FullSnapshot, PlayerEventMessage, ServerUpdateMessage};

pub struct MessageRouter {
    emitter: Arc<EventEmitter<EventName, ClientEvent>>,
    maintenance: Arc<MaintenanceHandler>,
}

impl MessageRouter {
    pub fn new(
        emitter: Arc<EventEmitter<EventName, ClientEvent>>,
        maintenance: Arc<MaintenanceHandler>,
    ) -> Self {
        Self { emitter, maintenance }
    }

    /// Parses and dispatches one raw frame.
    ///
    /// A malformed frame is logged and dropped without emitting anything: it
    /// must never crash the client, and must never masquerade as a
    /// valid-but-empty update.
    pub fn handle_frame(&self, raw: &str) {
        let envelope = match parser::parse(raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                log::warn!("Dropping malformed frame: {}", error);
                return;
            }
        };
        match envelope {
            Envelope::Full(snapshot) => self.route_full(snapshot),
            Envelope::Maintenance(directive) => {
                // The handler's own deduped change notification is what the
                // coordinator turns into the public maintenance event; the
                // router never duplicates it.
                self.maintenance.handle_maintenance_message(&directive);
            }
            Envelope::PlayerAdd(message) => self.route_player_add(message),
            Envelope::PlayerRemove(message) => self.route_player_remove(message),
            Envelope::ServerUpdate(message) => self.route_server_update(message),
            Envelope::Unclassified { kind, .. } => {
                log::warn!("Ignoring frame with unrecognized type `{}`", kind);
            }
        }
    }

    fn route_full(&self, snapshot: FullSnapshot) {
        self.maintenance.handle_full_message(&snapshot);
        let update = FullUpdate {
            servers: snapshot.servers.unwrap_or_default(),
            players: PlayersInfo::from_value(snapshot.players.as_ref()),
            running_time: snapshot.running_time,
            total_running_time: snapshot.total_running_time,
            is_maintenance: snapshot.is_maintenance.unwrap_or(false),
            maintenance_start_time: snapshot.maintenance_start_time,
        };
        self.emit(ClientEvent::FullUpdate(update));
    }

    fn route_player_add(&self, message: PlayerEventMessage) {
        let player = message.player;
        self.emit(ClientEvent::PlayerAdd(PlayerAddEvent {
            player_id: player.uuid.clone(),
            server_id: player.current_server.clone(),
            player_info: player.player_info.clone(),
            player: player.raw,
        }));
        self.emit(ClientEvent::PlayerUpdate(PlayerUpdateEvent {
            total_online_players: message
                .total_online_players
                .as_ref()
                .and_then(stringify_count),
            kind: message.kind,
            player: None,
        }));
    }

    fn route_player_remove(&self, message: PlayerEventMessage) {
        let player = message.player;
        self.emit(ClientEvent::PlayerRemove(PlayerRemoveEvent {
            player_id: player.uuid.clone(),
            player_info: player.player_info.clone(),
            player: player.raw.clone(),
        }));
        // A leave never carries an authoritative total; consumers re-count
        // from the next snapshot.
        self.emit(ClientEvent::PlayerUpdate(PlayerUpdateEvent {
            total_online_players: None,
            kind: message.kind,
            player: Some(player.raw),
        }));
    }

    fn route_server_update(&self, message: ServerUpdateMessage) {
        if let Some(player) = &message.player {
            if player.previous_server.is_some() || player.new_server.is_some() {
                self.emit(ClientEvent::PlayerMove(PlayerMoveEvent {
                    player_id: player.uuid.clone(),
                    from_server: player.previous_server.clone(),
                    to_server: player.new_server.clone(),
                    player_info: player.player_info.clone(),
                }));
            }
        }
        self.emit(ClientEvent::ServerUpdate {
            servers: message.servers,
        });
    }

    fn emit(&self, event: ClientEvent) {
        self.emitter.emit(event.name(), &event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn setup() -> (MessageRouter, Arc<MaintenanceHandler>, Arc<Mutex<Vec<ClientEvent>>>) {
        let emitter = Arc::new(EventEmitter::new());
        let maintenance = Arc::new(MaintenanceHandler::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        for name in EventName::ALL {
            let events = Arc::clone(&events);
            emitter.on(name, move |event: &ClientEvent| {
                events.lock().unwrap().push(event.clone());
            });
        }
        let router = MessageRouter::new(Arc::clone(&emitter), Arc::clone(&maintenance));
        (router, maintenance, events)
    }

    #[test]
    fn player_add_emits_add_then_update_with_stringified_total() {
        let (router, _, events) = setup();
        router.handle_frame(
            r#"{"type":"players_update_add","player":{"uuid":"x","currentServer":"s1"},"totalOnlinePlayers":10}"#,
        );

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ClientEvent::PlayerAdd(add) => {
                assert_eq!(add.player_id.as_deref(), Some("x"));
                assert_eq!(add.server_id.as_deref(), Some("s1"));
            }
            other => panic!("expected PlayerAdd first, got {other:?}"),
        }
        match &events[1] {
            ClientEvent::PlayerUpdate(update) => {
                assert_eq!(update.total_online_players.as_deref(), Some("10"));
                assert_eq!(update.kind, "players_update_add");
                assert!(update.player.is_none());
            }
            other => panic!("expected PlayerUpdate second, got {other:?}"),
        }
    }

    #[test]
    fn player_remove_emits_update_with_null_total_and_the_player() {
        let (router, _, events) = setup();
        router.handle_frame(
            r#"{"type":"players_update_remove","player":{"uuid":"x"},"totalOnlinePlayers":9}"#,
        );

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ClientEvent::PlayerRemove(_)));
        match &events[1] {
            ClientEvent::PlayerUpdate(update) => {
                assert!(update.total_online_players.is_none());
                assert_eq!(update.kind, "players_update_remove");
                assert!(update.player.is_some());
            }
            other => panic!("expected PlayerUpdate second, got {other:?}"),
        }
    }

    #[test]
    fn full_snapshot_defaults_missing_fields() {
        let (router, _, events) = setup();
        router.handle_frame(r#"{"type":"full","servers":{"lobby":4,"pvp":{"online":2,"isOnline":false}}}"#);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ClientEvent::FullUpdate(update) => {
                assert_eq!(update.players.online, "0");
                assert!(update.players.current_players.is_empty());
                assert!(!update.is_maintenance);
                assert!(update.maintenance_start_time.is_none());
                assert_eq!(update.servers["lobby"].online, 4);
                assert!(!update.servers["pvp"].is_online);
            }
            other => panic!("expected FullUpdate, got {other:?}"),
        }
    }

    #[test]
    fn full_snapshot_feeds_the_maintenance_handler() {
        let (router, maintenance, events) = setup();
        router.handle_frame(
            r#"{"type":"full","servers":{},"isMaintenance":true,"maintenanceStartTime":1700000000000}"#,
        );

        assert!(maintenance.state().is_maintenance);
        assert!(!maintenance.state().force_show_maintenance);
        // FullUpdate is emitted; the MaintenanceUpdate event belongs to the
        // coordinator's wiring, not the router.
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ClientEvent::FullUpdate(_)));
    }

    #[test]
    fn maintenance_directive_goes_to_the_handler_without_direct_events() {
        let (router, maintenance, events) = setup();
        router.handle_frame(r#"{"type":"maintenance","status":"true"}"#);

        assert!(maintenance.state().is_maintenance);
        assert!(maintenance.state().force_show_maintenance);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn server_update_with_move_record_emits_move_then_servers() {
        let (router, _, events) = setup();
        router.handle_frame(
            r#"{"type":"server_update","servers":{"s1":3,"s2":7},"player":{"uuid":"x","previousServer":"s1","newServer":"s2"}}"#,
        );

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ClientEvent::PlayerMove(mv) => {
                assert_eq!(mv.from_server.as_deref(), Some("s1"));
                assert_eq!(mv.to_server.as_deref(), Some("s2"));
            }
            other => panic!("expected PlayerMove first, got {other:?}"),
        }
        assert!(matches!(events[1], ClientEvent::ServerUpdate { .. }));
    }

    #[test]
    fn server_update_without_move_record_emits_only_servers() {
        let (router, _, events) = setup();
        router.handle_frame(r#"{"type":"server_update","servers":{"s1":3},"player":{"uuid":"x"}}"#);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ClientEvent::ServerUpdate { .. }));
    }

    #[test]
    fn malformed_and_unknown_frames_emit_nothing() {
        let (router, _, events) = setup();
        router.handle_frame("garbage");
        router.handle_frame(r#"{"type":"full"}"#);
        router.handle_frame(r#"{"type":"notice_list","entries":[]}"#);
        assert!(events.lock().unwrap().is_empty());
    }
}
