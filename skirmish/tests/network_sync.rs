use glam::Vec2;
use skirmish::components::InputFrame;
use skirmish::events::GameEvent;
use skirmish::map::MapData;
use skirmish::network::NetworkManager;
use skirmish::simulation::{BotMode, GameSession, SessionConfig};
use skirmish::transport::{MemoryHub, MemoryTransport};
use skirmish::tuning::world::TICK_RATE;
use tokio::sync::broadcast::Receiver;

fn peer_session(transport: MemoryTransport, name: &str, pos: Vec2) -> GameSession {
    let map = MapData::open_arena(1200.0, 1200.0);
    let config = SessionConfig {
        player_name: name.to_string(),
        world_size: map.size(),
        bot_mode: BotMode::Fixed { count: 0 },
        ..SessionConfig::default()
    };
    let network = NetworkManager::new(
        Box::new(transport),
        name,
        TICK_RATE,
        config.sync_rate,
        config.interpolation_delay_ms,
    );
    let mut session = GameSession::new(config, map, Some(network), 0);
    session.local_player_mut().body.pos = pos;
    session
}

fn two_peers() -> (GameSession, GameSession) {
    peers_at(
        ("Alice", Vec2::new(300.0, 500.0)),
        ("Bob", Vec2::new(900.0, 500.0)),
    )
}

fn peers_at(host: (&str, Vec2), guest: (&str, Vec2)) -> (GameSession, GameSession) {
    let hub = MemoryHub::new();
    let mut host_transport = hub.connect();
    let room = host_transport.create_room().unwrap();
    let mut guest_transport = hub.connect();
    guest_transport.join_room(&room).unwrap();
    (
        peer_session(host_transport, host.0, host.1),
        peer_session(guest_transport, guest.0, guest.1),
    )
}

fn run(mut sessions: [&mut GameSession; 2], from: u64, ticks: u64) -> u64 {
    let idle = InputFrame::default();
    let mut now = from;
    for _ in 0..ticks {
        now += 16;
        for session in sessions.iter_mut() {
            session.step(1.0, now, &idle);
        }
    }
    now
}

fn drain(events: &mut Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn peers_discover_each_other_and_replicate_positions() {
    let (mut host, mut guest) = two_peers();
    let mut guest_events = guest.subscribe();

    run([&mut host, &mut guest], 0, 30);

    assert_eq!(host.remote_players().len(), 1);
    assert_eq!(host.remote_players()[0].name, "Bob");
    assert_eq!(guest.remote_players().len(), 1);

    let proxy = &guest.remote_players()[0];
    assert_eq!(proxy.name, "Alice");
    assert_eq!(proxy.body.id, host.local_player().body.id);
    assert_eq!(proxy.body.pos, host.local_player().body.pos);

    let events = drain(&mut guest_events);
    assert!(events.contains(&GameEvent::Welcome { wave: 0 }));
    assert!(events.iter().any(
        |e| matches!(e, GameEvent::PlayerJoined { name, .. } if name == "Alice")
    ));

    let hud = guest.snapshot().hud;
    assert_eq!(hud.peer_count, 2);
    assert_eq!(guest.snapshot().players.len(), 2);
}

#[test]
fn chat_reaches_the_other_peer() {
    let (mut host, mut guest) = two_peers();
    let now = run([&mut host, &mut guest], 0, 3);
    let mut guest_events = guest.subscribe();

    host.send_chat("  good game  ", now);
    run([&mut host, &mut guest], now, 1);

    let chat: Vec<_> = drain(&mut guest_events)
        .into_iter()
        .filter_map(|e| match e {
            GameEvent::Chat { name, text, .. } => Some((name, text)),
            _ => None,
        })
        .collect();
    assert_eq!(chat, vec![("Alice".to_string(), "good game".to_string())]);
}

#[test]
fn remote_shots_are_simulated_locally() {
    let (mut host, mut guest) = two_peers();
    let now = run([&mut host, &mut guest], 0, 3);

    let fire = InputFrame {
        aim: Vec2::new(900.0, 500.0),
        fire_pressed: true,
        ..InputFrame::default()
    };
    host.step(1.0, now + 16, &fire);
    assert_eq!(host.bullets().len(), 1);

    guest.step(1.0, now + 16, &InputFrame::default());
    let host_id = host.local_player().body.id.clone();
    assert_eq!(guest.bullets().len(), 1);
    assert_eq!(guest.bullets()[0].owner_id, host_id);
}

#[test]
fn departing_peers_are_removed() {
    let (mut host, mut guest) = two_peers();
    let now = run([&mut host, &mut guest], 0, 10);
    let mut guest_events = guest.subscribe();

    host.stop();
    guest.step(1.0, now + 16, &InputFrame::default());

    assert!(guest.remote_players().is_empty());
    assert!(drain(&mut guest_events).iter().any(
        |e| matches!(e, GameEvent::PlayerLeft { name, .. } if name == "Alice")
    ));
    assert_eq!(guest.snapshot().hud.peer_count, 1);
}

#[test]
fn bot_kill_is_credited_only_to_the_shooter() {
    // Same display name on both peers
    let (mut host, mut guest) = peers_at(
        ("Player", Vec2::new(300.0, 500.0)),
        ("Player", Vec2::new(900.0, 900.0)),
    );
    let mut now = run([&mut host, &mut guest], 0, 3);
    let mut guest_events = guest.subscribe();

    let bot = host.spawn_bot(Vec2::new(400.0, 500.0), 1, now);
    bot.hp = 60.0;
    bot.max_hp = 60.0;
    bot.speed = 0.0;

    let fire = InputFrame {
        aim: Vec2::new(400.0, 500.0),
        fire_pressed: true,
        ..InputFrame::default()
    };
    for _ in 0..300 {
        now += 16;
        host.step(1.0, now, &fire);
        guest.step(1.0, now, &InputFrame::default());
        if host.bots()[0].dead {
            break;
        }
    }
    assert!(host.bots()[0].dead);
    run([&mut host, &mut guest], now, 30);

    assert_eq!(host.local_player().kills, 1);
    assert_eq!(host.local_player().score, 100);
    assert_eq!(guest.local_player().kills, 0);
    assert_eq!(guest.local_player().score, 0);

    // The kill is still reported in the guest's feed and replicated on the proxy
    assert!(drain(&mut guest_events).iter().any(|e| matches!(
        e,
        GameEvent::KillFeed { killer, weapon, .. } if killer == "Player" && weapon == "Pistol"
    )));
    assert_eq!(guest.remote_players()[0].kills, 1);
}

#[test]
fn player_kill_between_namesakes_credits_the_killer() {
    let (mut host, mut guest) = peers_at(
        ("Player", Vec2::new(300.0, 500.0)),
        ("Player", Vec2::new(450.0, 500.0)),
    );
    // Let spawn protection run out
    let mut now = run([&mut host, &mut guest], 0, 140);

    let fire = InputFrame {
        aim: Vec2::new(450.0, 500.0),
        fire_pressed: true,
        ..InputFrame::default()
    };
    for _ in 0..600 {
        now += 16;
        host.step(1.0, now, &fire);
        guest.step(1.0, now, &InputFrame::default());
        if guest.local_player().dead {
            break;
        }
    }
    assert!(guest.local_player().dead);
    run([&mut host, &mut guest], now, 5);

    assert_eq!(host.local_player().kills, 1);
    assert_eq!(host.local_player().score, 100);
    assert_eq!(guest.local_player().kills, 0);
    assert_eq!(guest.local_player().score, 0);
    assert_eq!(guest.local_player().deaths, 1);
}
