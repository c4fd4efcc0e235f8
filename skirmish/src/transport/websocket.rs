//! Transport over the room relay (`skirmish-relay`) using WebSockets
//!
//! A writer task drains outgoing frames into the socket and a reader task
//! parses incoming relay frames into a channel, so the synchronous
//! [`PeerTransport`] side never blocks the simulation tick.

use super::{PeerTransport, TransportError, TransportEvent};
use crate::relay::{ClientFrame, ErrorCode, RelayFrame};
use crate::tuning::network;
use futures_util::{SinkExt, StreamExt};
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

pub struct WsTransport {
    id: String,
    room: Option<String>,
    host: bool,
    outbound: UnboundedSender<ClientFrame>,
    inbound: UnboundedReceiver<RelayFrame>,
    /// Frames read while waiting on a specific reply
    pending: VecDeque<RelayFrame>,
    peers: HashSet<String>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl WsTransport {
    /// Connects to the relay and waits for it to assign our peer id
    pub async fn initialize(url: &str) -> Result<Self, TransportError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<RelayFrame>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let Ok(json) = serde_json::to_string(&frame) else {
                    continue;
                };
                if sink.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                        Ok(frame) => {
                            if inbound_tx.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "unparseable relay frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        warn!(error = %e, "relay connection error");
                        break;
                    }
                    _ => {}
                }
            }
        });

        let mut transport = Self {
            id: String::new(),
            room: None,
            host: false,
            outbound,
            inbound,
            pending: VecDeque::new(),
            peers: HashSet::new(),
            tasks: vec![writer, reader],
            closed: false,
        };

        let deadline = Instant::now() + join_timeout();
        transport.id = transport
            .wait_for(deadline, |frame| match frame {
                RelayFrame::Welcome { peer_id } => Some(Ok(peer_id.clone())),
                _ => None,
            })
            .await?;
        info!(peer_id = %transport.id, %url, "connected to relay");
        Ok(transport)
    }

    pub async fn create_room(&mut self) -> Result<String, TransportError> {
        self.push(ClientFrame::CreateRoom)?;
        let deadline = Instant::now() + join_timeout();
        let code = self
            .wait_for(deadline, |frame| match frame {
                RelayFrame::RoomCreated { room_code } => Some(Ok(room_code.clone())),
                RelayFrame::Error { message, .. } => {
                    Some(Err(TransportError::Rejected(message.clone())))
                }
                _ => None,
            })
            .await?;

        self.room = Some(code.clone());
        self.host = true;
        self.peers.clear();
        info!(peer_id = %self.id, room = %code, "room created");
        Ok(code)
    }

    /// Joins `room_code`; existing members surface as `PeerJoined` events
    pub async fn join_room(&mut self, room_code: &str) -> Result<(), TransportError> {
        self.push(ClientFrame::JoinRoom {
            room_code: room_code.to_string(),
        })?;
        let deadline = Instant::now() + join_timeout();
        let peers = self
            .wait_for(deadline, |frame| match frame {
                RelayFrame::RoomJoined { peers, .. } => Some(Ok(peers.clone())),
                RelayFrame::Error { code, message } => {
                    Some(Err(join_error(*code, room_code, message)))
                }
                _ => None,
            })
            .await?;

        self.room = Some(room_code.to_string());
        self.host = false;
        self.peers.clear();
        for peer_id in peers {
            self.pending.push_back(RelayFrame::PeerJoined { peer_id });
        }
        info!(peer_id = %self.id, room = %room_code, "joined room");
        Ok(())
    }

    fn push(&self, frame: ClientFrame) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Reads frames until `accept` produces a result; unrelated frames are
    /// kept for `try_recv`.
    async fn wait_for<T>(
        &mut self,
        deadline: Instant,
        accept: impl Fn(&RelayFrame) -> Option<Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        loop {
            let frame = match time::timeout_at(deadline, self.inbound.recv()).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return Err(TransportError::Closed),
                Err(_) => return Err(TransportError::Timeout),
            };
            match accept(&frame) {
                Some(result) => return result,
                None => self.pending.push_back(frame),
            }
        }
    }

    fn next_frame(&mut self) -> Option<RelayFrame> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(frame);
        }
        match self.inbound.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    self.closed = true;
                    self.pending.push_back(RelayFrame::Error {
                        code: ErrorCode::Disconnected,
                        message: TransportError::Closed.to_string(),
                    });
                    return self.pending.pop_front();
                }
                None
            }
        }
    }
}

fn join_error(code: ErrorCode, room_code: &str, message: &str) -> TransportError {
    match code {
        ErrorCode::RoomNotFound => TransportError::RoomNotFound(room_code.to_string()),
        ErrorCode::RoomFull => TransportError::RoomFull,
        ErrorCode::NotInRoom | ErrorCode::Disconnected => {
            TransportError::Rejected(message.to_string())
        }
    }
}

fn join_timeout() -> Duration {
    Duration::from_millis(network::JOIN_TIMEOUT_MS)
}

impl PeerTransport for WsTransport {
    fn local_id(&self) -> &str {
        &self.id
    }

    fn room_id(&self) -> Option<&str> {
        self.room.as_deref()
    }

    fn is_host(&self) -> bool {
        self.host
    }

    fn send(&self, peer_id: &str, payload: String) {
        let _ = self.push(ClientFrame::Send {
            to: peer_id.to_string(),
            payload,
        });
    }

    fn broadcast(&self, payload: String) {
        let _ = self.push(ClientFrame::Broadcast { payload });
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        while let Some(frame) = self.next_frame() {
            let event = match frame {
                RelayFrame::PeerJoined { peer_id } => {
                    self.peers.insert(peer_id.clone());
                    TransportEvent::PeerJoined(peer_id)
                }
                RelayFrame::PeerLeft { peer_id } => {
                    self.peers.remove(&peer_id);
                    TransportEvent::PeerLeft(peer_id)
                }
                RelayFrame::Message { from, payload } => TransportEvent::Message { from, payload },
                RelayFrame::Error { message, .. } => TransportEvent::Error(message),
                other => {
                    debug!(frame = ?other, "ignoring relay frame");
                    continue;
                }
            };
            return Some(event);
        }
        None
    }

    fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn close(&mut self) {
        if self.room.take().is_some() {
            let _ = self.push(ClientFrame::Leave);
        }
        self.host = false;
        self.peers.clear();
        // The writer flushes the leave frame, then exits once the sender is gone
        if let Some(reader) = self.tasks.pop() {
            reader.abort();
        }
        self.closed = true;
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        // Writer ends on its own once `outbound` is dropped
        for task in self.tasks.iter().skip(1) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_errors_map_from_relay_codes() {
        assert_eq!(
            join_error(ErrorCode::RoomNotFound, "ABC123", "Room not found"),
            TransportError::RoomNotFound("ABC123".into())
        );
        // The message text is irrelevant once a code is present
        assert_eq!(
            join_error(ErrorCode::RoomFull, "ABC123", "no room at the inn"),
            TransportError::RoomFull
        );
        assert_eq!(
            join_error(ErrorCode::NotInRoom, "ABC123", "Not in a room"),
            TransportError::Rejected("Not in a room".into())
        );
    }
}
