use glam::Vec2;
use skirmish::components::{Action, ActionEvent, InputFrame};
use skirmish::events::GameEvent;
use skirmish::map::MapData;
use skirmish::simulation::{BotMode, GameSession, SessionConfig};
use tokio::sync::broadcast::Receiver;

fn arena_session() -> GameSession {
    let map = MapData::open_arena(800.0, 600.0);
    let config = SessionConfig {
        world_size: map.size(),
        bot_mode: BotMode::Fixed { count: 0 },
        ..SessionConfig::default()
    };
    let mut session = GameSession::new(config, map, None, 0);
    session.local_player_mut().body.pos = Vec2::new(100.0, 100.0);
    session
}

/// Bot that stands still so shots are deterministic
fn place_target(session: &mut GameSession, pos: Vec2, hp: f32) -> String {
    let bot = session.spawn_bot(pos, 1, 0);
    bot.hp = hp;
    bot.max_hp = hp;
    bot.speed = 0.0;
    bot.body.id.clone()
}

fn drain(events: &mut Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn three_pistol_hits_kill_a_bot() {
    let mut session = arena_session();
    let mut events = session.subscribe();
    place_target(&mut session, Vec2::new(200.0, 100.0), 60.0);

    let mut hp_after_hits = Vec::new();
    let mut now = 0;
    for _ in 0..300 {
        now += 16;
        let bot = &session.bots()[0];
        let before = bot.hp;
        let input = InputFrame {
            aim: bot.body.pos,
            fire_pressed: true,
            ..InputFrame::default()
        };
        session.step(1.0, now, &input);

        let bot = &session.bots()[0];
        if bot.hp < before {
            hp_after_hits.push(bot.hp);
        }
        if bot.dead {
            break;
        }
    }

    assert_eq!(hp_after_hits, vec![40.0, 20.0, 0.0]);
    assert!(session.bots()[0].dead);

    let me = session.local_player();
    assert_eq!(me.kills, 1);
    assert_eq!(me.score, 100);

    let bot_name = session.bots()[0].name.clone();
    assert!(drain(&mut events).contains(&GameEvent::KillFeed {
        killer: me.name.clone(),
        victim: bot_name,
        weapon: "Pistol".to_string(),
    }));
}

#[test]
fn rocket_blast_falls_off_with_distance() {
    let mut session = arena_session();
    place_target(&mut session, Vec2::new(200.0, 100.0), 200.0);
    // Off the firing line so the bots' own shots cannot hit each other
    place_target(&mut session, Vec2::new(200.0, 150.0), 200.0);

    let select = InputFrame {
        actions: vec![ActionEvent {
            action: Action::SelectWeapon(5),
            pressed: true,
        }],
        ..InputFrame::default()
    };
    session.step(1.0, 16, &select);

    let fire = InputFrame {
        aim: Vec2::new(200.0, 100.0),
        fire_pressed: true,
        ..InputFrame::default()
    };
    session.step(1.0, 32, &fire);

    let idle = InputFrame {
        aim: Vec2::new(200.0, 100.0),
        ..InputFrame::default()
    };
    let mut now = 32;
    for _ in 0..30 {
        now += 16;
        session.step(1.0, now, &idle);
    }

    let near = &session.bots()[0];
    let far = &session.bots()[1];
    assert!(near.hp < 200.0, "direct hit should hurt");
    assert!(far.hp < 200.0, "splash should reach the second bot");
    assert!(near.hp < far.hp, "damage falls off with distance");
    assert!(200.0 - near.hp < 60.0, "even the direct hit is past the blast centre");
}

#[test]
fn walls_stop_bullets() {
    let mut map = MapData::open_arena(800.0, 600.0);
    map.walls.push(skirmish::math::Rect::new(150.0, 50.0, 20.0, 100.0));
    let config = SessionConfig {
        world_size: map.size(),
        bot_mode: BotMode::Fixed { count: 0 },
        ..SessionConfig::default()
    };
    let mut session = GameSession::new(config, map, None, 0);
    session.local_player_mut().body.pos = Vec2::new(100.0, 100.0);
    place_target(&mut session, Vec2::new(220.0, 100.0), 60.0);

    let mut now = 0;
    for _ in 0..60 {
        now += 16;
        let input = InputFrame {
            aim: Vec2::new(220.0, 100.0),
            fire_pressed: true,
            ..InputFrame::default()
        };
        session.step(1.0, now, &input);
    }

    assert_eq!(session.bots()[0].hp, 60.0);
}

#[test]
fn dash_is_limited_by_cooldown() {
    let mut session = arena_session();
    let dash = InputFrame {
        aim: Vec2::new(400.0, 100.0),
        actions: vec![ActionEvent {
            action: Action::Dash,
            pressed: true,
        }],
        ..InputFrame::default()
    };

    session.step(1.0, 16, &dash);
    assert!(session.local_player().dashing);
    let after_first = session.local_player().body.pos.x;

    // Dash has ended but the cooldown has not
    session.step(1.0, 400, &dash);
    assert!(!session.local_player().dashing);
    assert!(after_first > 100.0);

    session.step(1.0, 16 + 2000, &dash);
    assert!(session.local_player().dashing);
}

#[test]
fn pistol_hit_lands_once_bullet_and_bot_touch() {
    let mut session = arena_session();
    place_target(&mut session, Vec2::new(200.0, 100.0), 60.0);
    let shooter = session.local_player().body.id.clone();
    let bot_pos = session.bots()[0].body.pos;
    let bot_radius = session.bots()[0].radius;

    let mut now = 0;
    let mut hits = 0;
    for _ in 0..300 {
        now += 16;
        let before = session.bots()[0].hp;
        // Where our in-flight bullets will be after this tick's move
        let touching = session
            .bullets()
            .iter()
            .filter(|b| b.owner_id == shooter)
            .any(|b| (b.body.pos + b.body.vel).distance(bot_pos) < b.radius + bot_radius);

        let input = InputFrame {
            aim: bot_pos,
            fire_pressed: true,
            ..InputFrame::default()
        };
        session.step(1.0, now, &input);

        let hit = session.bots()[0].hp < before;
        assert_eq!(hit, touching, "hit registered at the wrong separation at {now} ms");
        if hit {
            hits += 1;
        }
        if session.bots()[0].dead {
            break;
        }
    }
    assert_eq!(hits, 3);
}
