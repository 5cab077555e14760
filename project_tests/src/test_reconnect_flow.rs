//! # Status Client Reconnect Flow Test
//!
//! Spins up a local WebSocket mock of the status service, then drives the
//! client through connect -> snapshot -> connection drop -> reconnect ->
//! maintenance directive, and verifies the public event stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use lib_status::{ClientEvent, ConnectionConfig, EventName, StatusClient};

const FULL_SNAPSHOT: &str = r#"{"type":"full","servers":{"lobby":7,"pvp":{"online":3,"isOnline":true}},"players":{"online":"10","currentPlayers":{}},"runningTime":3600,"protocol_version":2}"#;
const MAINTENANCE_DIRECTIVE: &str = r#"{"type":"maintenance","status":true,"maintenanceStartTime":1700000000000}"#;

#[tokio::main]
async fn main() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    println!("[*] Mock status service listening on {}", addr);

    tokio::spawn(async move {
        // Session 1: send a snapshot, then drop the connection.
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(mut ws) = accept_async(stream).await {
                let _ = ws.send(Message::Text(FULL_SNAPSHOT.to_string().into())).await;
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = ws.close(None).await;
            }
        }
        // Session 2: the reconnected client gets a maintenance directive and
        // the socket stays up until the client goes away.
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(mut ws) = accept_async(stream).await {
                let _ = ws
                    .send(Message::Text(MAINTENANCE_DIRECTIVE.to_string().into()))
                    .await;
                while let Some(msg) = ws.next().await {
                    if msg.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let config = ConnectionConfig {
        url: format!("ws://{}", addr),
        reconnect_intervals_ms: vec![200],
        max_reconnect_attempts: 5,
        ..ConnectionConfig::default()
    };
    let client = StatusClient::new(config);

    let events = Arc::new(Mutex::new(Vec::new()));
    for name in EventName::ALL {
        let events = Arc::clone(&events);
        client.on(name, move |event| {
            events.lock().unwrap().push(event.clone());
        });
    }

    client.connect().await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let seen: Vec<EventName> = events.lock().unwrap().iter().map(ClientEvent::name).collect();
    println!("[*] Observed events: {:?}", seen);

    let mut failures: Vec<String> = Vec::new();
    for expected in [
        EventName::Connected,
        EventName::FullUpdate,
        EventName::Disconnected,
        EventName::Reconnecting,
        EventName::MaintenanceUpdate,
    ] {
        if !seen.contains(&expected) {
            failures.push(format!("missing {:?}", expected));
        }
    }
    if seen.iter().filter(|name| **name == EventName::Connected).count() < 2 {
        failures.push("client never reconnected".to_string());
    }
    if !client.maintenance_state().is_maintenance {
        failures.push("maintenance directive not applied".to_string());
    }

    client.shutdown();

    if failures.is_empty() {
        println!("[SUCCESS] Reconnect flow verified.");
        Ok(())
    } else {
        eprintln!("[ERROR] Reconnect flow incomplete:");
        for failure in &failures {
            eprintln!(">>> {}", failure);
        }
        std::process::exit(1);
    }
}
