//! LAN discovery responder.
//!
//! Clients multicast a request datagram to find games on the local network.
//! The responder answers every request with a unicast reply to the sender and
//! ignores any other datagram. It never touches the game state.

use crate::config::DiscoveryConfig;
use crate::error::ServerError;
use log::{debug, error, info, warn};
use shared::{is_discovery_request, DISCOVERY_REPLY};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

pub struct DiscoveryResponder {
    socket: UdpSocket,
}

impl DiscoveryResponder {
    /// Binds the discovery port and joins the multicast group.
    ///
    /// Joining the group is best effort: on hosts without a multicast route
    /// the responder still answers requests sent straight to its port.
    pub async fn bind(config: &DiscoveryConfig) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind((config.bind_host, config.port))
            .await
            .map_err(ServerError::Discovery)?;
        socket.set_broadcast(true).map_err(ServerError::Discovery)?;
        socket
            .set_multicast_ttl_v4(config.ttl)
            .map_err(ServerError::Discovery)?;

        if let Err(e) = socket.join_multicast_v4(config.group, Ipv4Addr::UNSPECIFIED) {
            warn!(
                "Could not join multicast group {}: {}; answering direct requests only",
                config.group, e
            );
        }

        info!(
            "Discovery responder listening on {}",
            socket.local_addr().map_err(ServerError::Discovery)?
        );
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.socket.local_addr().map_err(ServerError::Discovery)
    }

    /// Answers requests until the task is dropped.
    pub async fn run(self) {
        let mut buffer = [0u8; 2048];

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, from)) => {
                    let payload = &buffer[..len];
                    if !is_discovery_request(payload) {
                        debug!(
                            "Ignoring datagram from {}: {:?}",
                            from,
                            String::from_utf8_lossy(payload)
                        );
                        continue;
                    }

                    debug!("Discovery request from {}", from);
                    if let Err(e) = self.socket.send_to(DISCOVERY_REPLY, from).await {
                        warn!("Failed to answer request from {}: {}", from, e);
                    }
                }
                Err(e) => {
                    error!("Discovery receive error: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}
