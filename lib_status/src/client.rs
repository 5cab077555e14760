//! # Status Client Facade
//!
//! One constructor call that assembles emitter, connection manager,
//! maintenance handler, message router and event coordinator, wires the
//! frame stream into the router and hands the coordinator a connect
//! function that reopens the managed socket. This is the surface the
//! surrounding application talks to.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::json;

use crate::config::ConnectionConfig;
use crate::connection::{ConnectionError, ConnectionManager, ConnectionState};
use crate::coordinator::{ConnectFn, EventCoordinator};
use crate::emitter::{EventEmitter, ListenerId};
use crate::events::{ClientEvent, EventName};
use crate::maintenance::{MaintenanceHandler, MaintenanceState};
use crate::reconnect::{ReconnectConfigUpdate, ReconnectProgress};
use crate::router::MessageRouter;
use crate::transport::Transport;
use crate::transport_ws::WsTransport;

#[derive(Clone)]
pub struct StatusClient {
    emitter: Arc<EventEmitter<EventName, ClientEvent>>,
    manager: ConnectionManager,
    maintenance: Arc<MaintenanceHandler>,
    coordinator: EventCoordinator,
    // Kept alive for the lifetime of the client; the manager's frame
    // listener holds the only other reference.
    _router: Arc<MessageRouter>,
}

impl StatusClient {
    /// Builds a client over the production WebSocket transport.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport::new()))
    }

    /// Builds a client over a caller-supplied transport.
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        let emitter = Arc::new(EventEmitter::new());
        let maintenance = Arc::new(MaintenanceHandler::new());
        let manager = ConnectionManager::new(config.clone(), transport);
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&emitter),
            Arc::clone(&maintenance),
        ));

        {
            let router = Arc::clone(&router);
            manager.on_frame(move |frame| router.handle_frame(frame));
        }

        let connect_fn: ConnectFn = {
            let manager = manager.clone();
            Arc::new(move || {
                let manager = manager.clone();
                async move {
                    if let Err(e) = manager.connect().await {
                        log::warn!("Reconnect attempt failed: {}", e);
                    }
                }
                .boxed()
            })
        };
        let coordinator = EventCoordinator::new(
            Arc::clone(&emitter),
            manager.clone(),
            Arc::clone(&maintenance),
            &config,
            connect_fn,
        );

        Self {
            emitter,
            manager,
            maintenance,
            coordinator,
            _router: router,
        }
    }

    /// Opens the connection. Failures surface through the event stream and
    /// the reconnect policy as well as through the returned error.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.manager.connect().await.map(|_| ())
    }

    /// Closes the socket gracefully. Reconnection policy still applies; use
    /// [`StatusClient::shutdown`] to stop for good.
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Permanent teardown: cancels timers, detaches the connect function and
    /// silences the manager.
    pub fn shutdown(&self) {
        self.coordinator.cleanup();
        self.manager.force_close();
    }

    pub fn on(
        &self,
        name: EventName,
        handler: impl Fn(&ClientEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.emitter.on(name, handler)
    }

    pub fn off(&self, name: EventName, id: ListenerId) -> bool {
        self.emitter.off(name, id)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn maintenance_state(&self) -> MaintenanceState {
        self.maintenance.state()
    }

    pub fn reconnect_progress(&self) -> ReconnectProgress {
        self.coordinator.progress()
    }

    /// Operator override for the maintenance banner, independent of what the
    /// stream reports.
    pub fn force_maintenance_mode(&self, enabled: bool) -> MaintenanceState {
        self.maintenance.force_maintenance_mode(enabled)
    }

    pub fn disable_reconnect(&self) {
        self.coordinator.disable_reconnect();
    }

    pub fn enable_reconnect(&self) {
        self.coordinator.enable_reconnect();
    }

    /// Replaces the configuration wholesale: the manager takes the new
    /// connection settings, the reconnect policy the new retry settings.
    /// The attempt counter survives.
    pub fn update_config(&self, config: ConnectionConfig) {
        self.coordinator.update_reconnect_config(ReconnectConfigUpdate {
            max_attempts: Some(config.max_reconnect_attempts),
            intervals_ms: Some(config.reconnect_intervals_ms.clone()),
            disabled: Some(config.disable_reconnect),
        });
        self.manager.update_config(config);
    }

    /// Requests a page of service notices over the live socket.
    pub fn request_notices(&self, page: u32, counts: u32) -> Result<(), ConnectionError> {
        self.send_request(json!({"type": "get_notice", "page": page, "counts": counts}))
    }

    /// Sends an arbitrary `type`-discriminated request frame.
    pub fn send_request(&self, request: serde_json::Value) -> Result<(), ConnectionError> {
        self.manager.send_frame(&request.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTransport;
    use crate::transport::SocketEvent;
    use std::sync::Mutex;

    #[tokio::test]
    async fn frames_flow_end_to_end_into_public_events() {
        let transport = MockTransport::always_open();
        let client =
            StatusClient::with_transport(ConnectionConfig::default(), Arc::clone(&transport) as _);

        let events = Arc::new(Mutex::new(Vec::new()));
        for name in EventName::ALL {
            let events = Arc::clone(&events);
            client.on(name, move |event| {
                events.lock().unwrap().push(event.clone());
            });
        }

        client.connect().await.unwrap();
        transport.push_event(SocketEvent::Frame(
            r#"{"type":"full","servers":{"lobby":4},"players":{"online":"4"},"isMaintenance":false}"#
                .to_string(),
        ));
        for _ in 0..100 {
            if events.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let events = events.lock().unwrap();
        assert!(matches!(events[0], ClientEvent::Connected));
        match &events[1] {
            ClientEvent::FullUpdate(update) => {
                assert_eq!(update.players.online, "4");
                assert_eq!(update.servers["lobby"].online, 4);
            }
            other => panic!("expected FullUpdate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_notices_writes_the_wire_shape() {
        let transport = MockTransport::always_open();
        let client =
            StatusClient::with_transport(ConnectionConfig::default(), Arc::clone(&transport) as _);

        client.connect().await.unwrap();
        client.request_notices(2, 10).unwrap();

        let sent = transport.last_socket().unwrap().sent();
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value["type"], "get_notice");
        assert_eq!(value["page"], 2);
        assert_eq!(value["counts"], 10);
    }

    #[tokio::test]
    async fn shutdown_silences_the_client() {
        let transport = MockTransport::always_open();
        let client =
            StatusClient::with_transport(ConnectionConfig::default(), Arc::clone(&transport) as _);

        client.connect().await.unwrap();
        client.shutdown();

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(client.connect().await.is_err());
    }
}
