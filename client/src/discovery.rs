//! Finding game servers on the local network.
//!
//! A request datagram is sent to the multicast group (or any other address,
//! such as a broadcast or a single host) and every distinct sender that
//! answers before the wait runs out is reported as a server.

use log::{debug, warn};
use shared::{
    is_discovery_request, DEFAULT_GAME_SERVER_PORT, DISCOVERY_REQUEST, MULTICAST_ADDRESS,
    MULTICAST_TTL,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

/// Multicast group and port servers listen on by default.
pub fn default_target() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(MULTICAST_ADDRESS), DEFAULT_GAME_SERVER_PORT)
}

/// Sends a discovery request to `target` and collects the addresses that answered within `wait`.
///
/// The returned addresses are the responders' UDP addresses; the game itself
/// listens on TCP at the same host, usually on the same port.
pub async fn discover_servers(target: SocketAddr, wait: Duration) -> io::Result<Vec<SocketAddr>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
    if let IpAddr::V4(group) = target.ip() {
        if group.is_multicast() {
            if let Err(e) = socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED) {
                warn!("Could not join multicast group {}: {}", group, e);
            }
        }
    }

    socket.send_to(DISCOVERY_REQUEST, target).await?;
    debug!("Sent discovery request to {}", target);

    let deadline = Instant::now() + wait;
    let mut servers = Vec::new();
    let mut buffer = [0u8; 512];

    loop {
        let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buffer)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                warn!("Discovery receive failed: {}", e);
                break;
            }
            Err(_) => break,
        };

        // our own request loops back when we are in the group
        if len == 0 || is_discovery_request(&buffer[..len]) {
            continue;
        }
        if !servers.contains(&from) {
            debug!("Discovered server at {}", from);
            servers.push(from);
        }
    }

    Ok(servers)
}
