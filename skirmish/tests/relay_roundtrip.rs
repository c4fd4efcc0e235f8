mod support;

use skirmish::transport::{PeerTransport, TransportError, TransportEvent, WsTransport};
use std::time::Duration;
use tokio::time::Instant;

async fn next_event(transport: &mut WsTransport) -> TransportEvent {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(event) = transport.try_recv() {
            return event;
        }
        assert!(Instant::now() < deadline, "timed out waiting for an event");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn peers_in_a_room_exchange_payloads() {
    let url = support::ensure_relay();

    let mut host = WsTransport::initialize(url).await.unwrap();
    let room = host.create_room().await.unwrap();
    assert_eq!(room.len(), 6);
    assert!(host.is_host());

    let mut guest = WsTransport::initialize(url).await.unwrap();
    guest.join_room(&room).await.unwrap();
    assert!(!guest.is_host());
    assert_eq!(guest.room_id(), Some(room.as_str()));

    let host_id = host.local_id().to_string();
    let guest_id = guest.local_id().to_string();
    assert_ne!(host_id, guest_id);

    assert_eq!(next_event(&mut guest).await, TransportEvent::PeerJoined(host_id.clone()));
    assert_eq!(next_event(&mut host).await, TransportEvent::PeerJoined(guest_id.clone()));
    assert_eq!(host.peer_count(), 1);

    guest.send(&host_id, r#"{"t":"ping","d":{"t":1},"ts":1}"#.to_string());
    assert_eq!(
        next_event(&mut host).await,
        TransportEvent::Message {
            from: guest_id.clone(),
            payload: r#"{"t":"ping","d":{"t":1},"ts":1}"#.to_string(),
        }
    );

    host.broadcast("to everyone".to_string());
    assert_eq!(
        next_event(&mut guest).await,
        TransportEvent::Message {
            from: host_id.clone(),
            payload: "to everyone".to_string(),
        }
    );

    guest.close();
    assert_eq!(next_event(&mut host).await, TransportEvent::PeerLeft(guest_id));
    assert_eq!(host.peer_count(), 0);
}

#[tokio::test]
async fn joining_an_unknown_room_fails() {
    let url = support::ensure_relay();
    let mut peer = WsTransport::initialize(url).await.unwrap();

    let err = peer.join_room("ZZZZZZ").await.unwrap_err();
    assert_eq!(err, TransportError::RoomNotFound("ZZZZZZ".to_string()));
    assert_eq!(peer.room_id(), None);
}

#[tokio::test]
async fn joining_a_full_room_reports_room_full() {
    let url = support::ensure_relay();
    let mut host = WsTransport::initialize(url).await.unwrap();
    let room = host.create_room().await.unwrap();

    let mut members = Vec::new();
    for _ in 1..skirmish::tuning::network::MAX_PLAYERS {
        let mut peer = WsTransport::initialize(url).await.unwrap();
        peer.join_room(&room).await.unwrap();
        members.push(peer);
    }

    let mut late = WsTransport::initialize(url).await.unwrap();
    assert_eq!(late.join_room(&room).await.unwrap_err(), TransportError::RoomFull);
    assert_eq!(late.room_id(), None);
}
