use std::path::PathBuf;

use anyhow::Result;
use tokio::signal;

mod status_logic;
use status_logic::{config, logger};

use lib_status::{ClientEvent, EventName, StatusClient};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();

    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    logger::setup_logging(&log_dir, &log_level)?;

    let client = StatusClient::new(config.connection());
    register_event_loggers(&client);

    if let Err(e) = client.connect().await {
        // The coordinator keeps retrying on its own; just report the first miss.
        log::error!("Initial connection failed: {}", e);
    }

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    client.shutdown();
    log::info!("Shutdown complete.");
    Ok(())
}

/// Subscribes a logging listener for every public event the client emits.
fn register_event_loggers(client: &StatusClient) {
    for name in EventName::ALL {
        client.on(name, move |event| match event {
            ClientEvent::Connected => log::info!("Connected to status stream"),
            ClientEvent::Disconnected { code, reason } => {
                log::warn!("Disconnected (code {:?}) {}", code, reason);
            }
            ClientEvent::Reconnecting {
                attempt,
                delay_ms,
                max_attempts,
            } => {
                log::info!(
                    "Reconnect attempt {}/{} after {} ms",
                    attempt,
                    max_attempts,
                    delay_ms
                );
            }
            ClientEvent::ConnectionFailed {
                max_attempts,
                total_attempts,
            } => {
                log::error!(
                    "Giving up after {} of {} allowed attempts",
                    total_attempts,
                    max_attempts
                );
            }
            ClientEvent::Error { cause } => log::error!("Connection error: {}", cause),
            ClientEvent::FullUpdate(update) => {
                log::info!(
                    "Snapshot: {} servers, {} players online",
                    update.servers.len(),
                    update.players.online
                );
            }
            ClientEvent::PlayerAdd(add) => {
                log::info!("Player {:?} joined {:?}", add.player_id, add.server_id);
            }
            ClientEvent::PlayerRemove(remove) => {
                log::info!("Player {:?} left", remove.player_id);
            }
            ClientEvent::PlayerMove(moved) => {
                log::info!(
                    "Player {:?} moved {:?} -> {:?}",
                    moved.player_id,
                    moved.from_server,
                    moved.to_server
                );
            }
            ClientEvent::PlayerUpdate(update) => {
                log::debug!("Player totals: {:?}", update.total_online_players);
            }
            ClientEvent::ServerUpdate { servers } => {
                log::debug!("Server update for {} servers", servers.len());
            }
            ClientEvent::MaintenanceUpdate(state) => {
                log::warn!(
                    "Maintenance mode: {} (forced: {})",
                    state.is_maintenance,
                    state.force_show_maintenance
                );
            }
        });
    }
}
