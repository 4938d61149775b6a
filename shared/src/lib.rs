//! Types and constants shared by the game server and its clients.

use std::net::Ipv4Addr;
use std::time::Duration;

pub mod framing;
pub mod protocol;

pub use framing::{encode, encode_all, FrameDecoder, FrameError, DELIMITER};
pub use protocol::*;

/// TCP port of the game server, also the UDP port of the discovery responder.
pub const DEFAULT_GAME_SERVER_PORT: u16 = 49152;
pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(224, 69, 69, 69);
pub const MULTICAST_TTL: u32 = 128;

/// Datagram a client multicasts when looking for a game.
pub const DISCOVERY_REQUEST: &[u8] = b"LFG";
/// Datagram the server answers a request with.
pub const DISCOVERY_REPLY: &[u8] = b"i am here";

pub const MAP_WIDTH: usize = 30;
pub const MAP_HEIGHT: usize = 10;

/// How long a hit entity stays invulnerable, and the minimum time between two
/// attacks of the same entity.
pub const INVINCIBILITY_WINDOW: Duration = Duration::from_millis(300);

pub const PLAYER_HEALTH: i32 = 10;
pub const PLAYER_STRENGTH: i32 = 1;
pub const ZOMBIE_HEALTH: i32 = 3;
pub const ZOMBIE_STRENGTH: i32 = 3;

pub fn is_discovery_request(payload: &[u8]) -> bool {
    payload == DISCOVERY_REQUEST
}
