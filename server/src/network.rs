//! Server network layer: TCP accept loop, discovery responder and the world loop

use crate::config::ServerConfig;
use crate::connection::{serve_connection, ConnectionId};
use crate::discovery::DiscoveryResponder;
use crate::entity::EntityId;
use crate::error::ServerError;
use crate::events::{Delivery, SubscriptionId};
use crate::world::GridWorld;
use log::{debug, error, info, warn};
use shared::ClientMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Messages sent from connection tasks to the world loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        connection: ConnectionId,
        outbound: mpsc::UnboundedSender<Delivery>,
    },
    Intent {
        connection: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        connection: ConnectionId,
    },
}

// Player and subscription owned by one connection
#[derive(Debug, Clone, Copy)]
struct Session {
    player: EntityId,
    subscription: SubscriptionId,
}

/// Authoritative game server.
///
/// Connection tasks and the discovery responder run on their own tasks; the
/// world is only ever touched from [`Server::run`].
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    discovery: Option<DiscoveryResponder>,
    world: GridWorld,
    sessions: HashMap<ConnectionId, Session>,
    epoch: Instant,

    server_tx: mpsc::UnboundedSender<ServerEvent>,
    server_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let discovery = if config.discovery.enabled {
            match DiscoveryResponder::bind(&config.discovery).await {
                Ok(responder) => Some(responder),
                Err(e) => {
                    warn!("Discovery disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            discovery,
            world: GridWorld::generate(&config.world),
            sessions: HashMap::new(),
            epoch: Instant::now(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery.as_ref().and_then(|d| d.local_addr().ok())
    }

    /// Milliseconds since the server started, the world's clock.
    fn now(&self) -> u64 {
        self.epoch
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    /// Spawns task that accepts TCP connections and starts a connection task for each
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_id = 0;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        next_id += 1;
                        let connection = ConnectionId(next_id);
                        info!("Connection {} from {}", next_id, addr);
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        tokio::spawn(serve_connection(stream, connection, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_discovery(&mut self) {
        if let Some(responder) = self.discovery.take() {
            tokio::spawn(responder.run());
        }
    }

    /// Applies one connection event to the world
    fn handle_event(&mut self, event: ServerEvent) {
        let now = self.now();
        // effects already due happen before anything requested after them
        self.world.advance(now);

        match event {
            ServerEvent::Connected {
                connection,
                outbound,
            } => {
                let player = self.world.spawn_player();
                // subscribe first so the new client sees its own join
                let subscription = self.world.attach(player, outbound);
                self.sessions.insert(
                    connection,
                    Session {
                        player,
                        subscription,
                    },
                );
                if let Err(e) = self.world.join(player) {
                    warn!("Connection {} could not join: {}", connection.0, e);
                }
            }

            ServerEvent::Intent {
                connection,
                message,
            } => {
                let Some(session) = self.sessions.get(&connection).copied() else {
                    warn!("Intent from unknown connection {}", connection.0);
                    return;
                };
                self.dispatch(session, message, now);
            }

            ServerEvent::Disconnected { connection } => {
                let Some(session) = self.sessions.remove(&connection) else {
                    return;
                };
                self.world.unsubscribe(session.subscription);
                if let Err(e) = self.world.leave(session.player, now) {
                    warn!("Connection {} left uncleanly: {}", connection.0, e);
                }
                info!(
                    "Connection {} left, {} still subscribed",
                    connection.0,
                    self.world.subscriber_count()
                );
            }
        }
    }

    fn dispatch(&mut self, session: Session, message: ClientMessage, now: u64) {
        match message {
            ClientMessage::Join {} => {
                if !self.world.is_on_map(session.player) {
                    if let Err(e) = self.world.join(session.player) {
                        warn!("Rejoin failed: {}", e);
                    }
                }
                self.world.send_map(session.subscription);
            }
            ClientMessage::Move(intent) => {
                self.world
                    .resolve(session.player, intent.action, intent.direction, now);
            }
            ClientMessage::Map {} => {
                self.world.send_map(session.subscription);
            }
            ClientMessage::Chat(chat) => {
                self.world.chat(session.player, &chat.message);
            }
        }
    }

    /// Main server loop: applies connection events and fires deferred world effects
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();
        self.spawn_discovery();

        info!("Server started successfully");

        loop {
            let deadline = self
                .world
                .next_due()
                .map(|due| self.epoch + Duration::from_millis(due));

            tokio::select! {
                event = self.server_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = wait_until(deadline) => {
                    let now = self.now();
                    let ran = self.world.advance(now);
                    debug!("Ran {} deferred effects at {}ms", ran, now);
                },
            }
        }

        Ok(())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
