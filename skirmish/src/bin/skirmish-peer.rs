//! Headless peer: joins a relay room and runs a session with idle input.
//! Useful as a soak client and for watching the relay under load.

use anyhow::Context;
use skirmish::components::InputFrame;
use skirmish::events::GameEvent;
use skirmish::network::NetworkManager;
use skirmish::simulation::GameSession;
use skirmish::transport::WsTransport;
use skirmish::tuning::world::TICK_RATE;
use skirmish::wire_format::epoch_millis;
use skirmish::{config, telemetry};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Status line every ten seconds of ticks
const STATUS_EVERY_TICKS: u64 = 600;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    telemetry::init_tracing();

    let url = config::relay_url();
    let mut transport = WsTransport::initialize(&url)
        .await
        .with_context(|| format!("failed to connect to relay at {url}"))?;

    match config::room_code() {
        Some(code) => transport
            .join_room(&code)
            .await
            .with_context(|| format!("failed to join room {code}"))?,
        None => {
            let code = transport.create_room().await.context("failed to create room")?;
            info!(room = %code, "room ready, share this code");
        }
    }

    let session_config = config::session_config();
    let network = NetworkManager::new(
        Box::new(transport),
        &session_config.player_name,
        TICK_RATE,
        session_config.sync_rate,
        session_config.interpolation_delay_ms,
    );
    let mut session = GameSession::online(session_config, network, epoch_millis());
    let mut events = session.subscribe();

    let mut interval = time::interval(Duration::from_secs_f32(1.0 / TICK_RATE));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let idle = InputFrame::default();
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            _ = interval.tick() => {
                let dt = last_tick.elapsed().as_secs_f32() * TICK_RATE;
                last_tick = Instant::now();

                let Some(result) = session.step(dt, epoch_millis(), &idle) else {
                    break;
                };
                if result.tick % STATUS_EVERY_TICKS == 0 {
                    let hud = &result.snapshot.hud;
                    info!(
                        tick = result.tick,
                        wave = hud.wave,
                        enemies = hud.enemies_alive,
                        players = hud.peer_count,
                        latency = ?hud.latency,
                        "status"
                    );
                }

                while let Ok(event) = events.try_recv() {
                    log_event(&event);
                }
            }
        }
    }

    session.stop();
    Ok(())
}

fn log_event(event: &GameEvent) {
    match event {
        GameEvent::KillFeed {
            killer,
            victim,
            weapon,
        } => info!(%killer, %victim, %weapon, "kill feed"),
        GameEvent::WaveStarted { wave, count } => info!(wave, count, "wave"),
        GameEvent::PlayerJoined { peer_id, name } => info!(%peer_id, %name, "player joined"),
        GameEvent::PlayerLeft { peer_id, name } => info!(%peer_id, %name, "player left"),
        GameEvent::Chat { name, text, .. } => info!(%name, %text, "chat"),
        GameEvent::NetworkError { message } => warn!(%message, "network error"),
        other => debug!(event = ?other, "event"),
    }
}
