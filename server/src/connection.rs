//! Per-connection state and the task that drives one client socket.
//!
//! Each accepted stream gets its own task. The task decodes inbound frames
//! into intents for the world loop, and turns the deliveries the world
//! publishes into framed messages. Before a delivery is written, the
//! [`ConnectionManager`] attaches the fields of the client's own player that
//! changed since the previous message, so clients stay in sync without a
//! full resend.

use crate::events::Delivery;
use crate::network::ServerEvent;
use log::{debug, error, info, warn};
use shared::{
    encode_all, ClientMessage, FrameDecoder, Happening, PlayerDiff, PlayerSnapshot, ServerMessage,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Diff baseline of one client.
#[derive(Debug)]
pub struct ConnectionManager {
    id: ConnectionId,
    /// Player state as of the last message written to this client
    last_sent: Option<PlayerSnapshot>,
}

impl ConnectionManager {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            last_sent: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Builds the outbound message for `delivery` and advances the baseline.
    ///
    /// Map snapshots always carry the complete player so a client that
    /// (re)joins starts from a known state.
    pub fn prepare(&mut self, delivery: &Delivery) -> ServerMessage {
        let player = match &delivery.player {
            Some(current) => {
                let diff = if matches!(*delivery.happening, Happening::Map { .. }) {
                    PlayerDiff::full(current)
                } else {
                    PlayerDiff::between(self.last_sent.as_ref(), current)
                };
                self.last_sent = Some(current.clone());
                diff
            }
            None => PlayerDiff::default(),
        };

        ServerMessage {
            happening: (*delivery.happening).clone(),
            player,
        }
    }
}

/// Runs one client connection until either side closes it.
///
/// Announces the connection with [`ServerEvent::Connected`] and always ends
/// with [`ServerEvent::Disconnected`]. A frame that is not JSON closes the
/// connection; JSON that is not a known request is skipped.
pub async fn serve_connection<S>(
    stream: S,
    connection: ConnectionId,
    events: mpsc::UnboundedSender<ServerEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    if events
        .send(ServerEvent::Connected {
            connection,
            outbound: outbound_tx,
        })
        .is_err()
    {
        error!("World loop is gone, dropping connection {}", connection.0);
        return;
    }

    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut manager = ConnectionManager::new(connection);
    let mut decoder = FrameDecoder::new();
    let mut buffer = [0u8; 2048];

    loop {
        tokio::select! {
            read = reader.read(&mut buffer) => {
                match read {
                    Ok(0) => {
                        info!("Connection {} closed by peer", connection.0);
                        break;
                    }
                    Ok(len) => {
                        if !forward_frames(&mut decoder, &buffer[..len], connection, &events) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Connection {} read error: {}", connection.0, e);
                        break;
                    }
                }
            },

            delivery = outbound_rx.recv() => {
                let Some(first) = delivery else {
                    break;
                };
                // coalesce everything already queued into one write
                let mut messages = vec![manager.prepare(&first)];
                while let Ok(next) = outbound_rx.try_recv() {
                    messages.push(manager.prepare(&next));
                }

                match encode_all(&messages) {
                    Ok(bytes) => {
                        if let Err(e) = writer.write_all(&bytes).await {
                            warn!("Connection {} write error: {}", manager.id().0, e);
                            break;
                        }
                    }
                    Err(e) => error!("Failed to encode messages for {}: {}", manager.id().0, e),
                }
            },
        }
    }

    let _ = writer.shutdown().await;
    let _ = events.send(ServerEvent::Disconnected { connection });
}

/// Decodes the frames completed by `bytes` and forwards them to the world.
/// Returns false when the connection must be closed.
fn forward_frames(
    decoder: &mut FrameDecoder,
    bytes: &[u8],
    connection: ConnectionId,
    events: &mpsc::UnboundedSender<ServerEvent>,
) -> bool {
    let frames = match decoder.push::<serde_json::Value>(bytes) {
        Ok(frames) => frames,
        Err(e) => {
            error!("Closing connection {}: {}", connection.0, e);
            return false;
        }
    };

    for frame in frames {
        match ClientMessage::from_value(frame.clone()) {
            Ok(message) => {
                debug!("Connection {} sent {:?}", connection.0, message);
                if events
                    .send(ServerEvent::Intent {
                        connection,
                        message,
                    })
                    .is_err()
                {
                    return false;
                }
            }
            Err(e) => warn!(
                "Ignoring unknown message from connection {}: {} ({})",
                connection.0, frame, e
            ),
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{encode, Action, CellChange, Direction, MoveIntent, Position};
    use std::sync::Arc;
    use tokio_test::io::Builder;

    fn snapshot(health: i32) -> PlayerSnapshot {
        PlayerSnapshot {
            number: Some(1),
            health,
            strength: 1,
            damaged: false,
            kills: 0,
            deaths: 0,
            position: Some(Position::new(3, 3)),
        }
    }

    fn delivery(happening: Happening, player: Option<PlayerSnapshot>) -> Delivery {
        Delivery {
            happening: Arc::new(happening),
            player,
        }
    }

    fn changes() -> Happening {
        Happening::Changes {
            data: vec![CellChange::new(Position::new(3, 3), "d1")],
        }
    }

    #[test]
    fn test_first_message_carries_full_player() {
        let mut manager = ConnectionManager::new(ConnectionId(1));
        let message = manager.prepare(&delivery(changes(), Some(snapshot(10))));
        assert_eq!(message.player, PlayerDiff::full(&snapshot(10)));
        assert_eq!(message.happening, changes());
    }

    #[test]
    fn test_later_messages_carry_only_changes() {
        let mut manager = ConnectionManager::new(ConnectionId(1));
        manager.prepare(&delivery(changes(), Some(snapshot(10))));

        let message = manager.prepare(&delivery(changes(), Some(snapshot(7))));
        assert_eq!(
            message.player,
            PlayerDiff {
                health: Some(7),
                ..Default::default()
            }
        );

        let message = manager.prepare(&delivery(changes(), Some(snapshot(7))));
        assert!(message.player.is_empty());
    }

    #[test]
    fn test_map_resends_full_player() {
        let mut manager = ConnectionManager::new(ConnectionId(1));
        manager.prepare(&delivery(changes(), Some(snapshot(10))));

        let map = Happening::Map {
            data: vec![vec!["#".to_string()]],
        };
        let message = manager.prepare(&delivery(map, Some(snapshot(10))));
        assert_eq!(message.player, PlayerDiff::full(&snapshot(10)));
    }

    #[test]
    fn test_missing_player_sends_empty_diff() {
        let mut manager = ConnectionManager::new(ConnectionId(4));
        let message = manager.prepare(&delivery(changes(), None));
        assert!(message.player.is_empty());
        assert_eq!(manager.id(), ConnectionId(4));
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        events.recv().await.expect("connection task hung up")
    }

    #[tokio::test]
    async fn test_join_request_and_reply() {
        let map = Happening::Map {
            data: vec![vec!["#".to_string(), "1".to_string()]],
        };
        let expected = encode(&ServerMessage {
            happening: map.clone(),
            player: PlayerDiff::full(&snapshot(10)),
        })
        .unwrap();

        let stream = Builder::new()
            .read("{\"type\":\"join\",\"data\":{}}µ".as_bytes())
            .write(&expected)
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(serve_connection(stream, ConnectionId(1), tx));

        let outbound = match next_event(&mut rx).await {
            ServerEvent::Connected { connection, outbound } => {
                assert_eq!(connection, ConnectionId(1));
                outbound
            }
            other => panic!("expected connect, got {:?}", other),
        };
        match next_event(&mut rx).await {
            ServerEvent::Intent { message, .. } => assert_eq!(message, ClientMessage::Join {}),
            other => panic!("expected intent, got {:?}", other),
        }

        outbound.send(delivery(map, Some(snapshot(10)))).unwrap();

        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::Disconnected { .. }
        ));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_fragmented_and_unknown_frames() {
        let stream = Builder::new()
            .read("{\"type\":\"dance\",\"data\":{}}µ{\"type\":\"mo".as_bytes())
            .read("ve\",\"data\":{\"action\":\"attack\",\"direction\":\"W\"}}µ".as_bytes())
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(serve_connection(stream, ConnectionId(2), tx));

        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::Connected { .. }
        ));
        match next_event(&mut rx).await {
            ServerEvent::Intent { message, .. } => assert_eq!(
                message,
                ClientMessage::Move(MoveIntent {
                    action: Action::Attack,
                    direction: Direction::W,
                })
            ),
            other => panic!("expected intent, got {:?}", other),
        }
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::Disconnected { .. }
        ));
    }

    #[tokio::test]
    async fn test_requests_without_data_are_forwarded() {
        let stream = Builder::new()
            .read("{\"type\":\"map\"}µ{\"type\":\"join\"}µ".as_bytes())
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(serve_connection(stream, ConnectionId(5), tx));

        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::Connected { .. }
        ));
        for expected in [ClientMessage::Map {}, ClientMessage::Join {}] {
            match next_event(&mut rx).await {
                ServerEvent::Intent { message, .. } => assert_eq!(message, expected),
                other => panic!("expected intent, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let stream = Builder::new().read("{not json}µ".as_bytes()).build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(serve_connection(stream, ConnectionId(3), tx));

        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::Connected { .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::Disconnected {
                connection: ConnectionId(3)
            }
        ));
    }
}
