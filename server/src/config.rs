//! Server configuration, populated from the command line by the binary.

use shared::{
    DEFAULT_GAME_SERVER_PORT, INVINCIBILITY_WINDOW, MAP_HEIGHT, MAP_WIDTH, MULTICAST_ADDRESS,
    MULTICAST_TTL,
};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Parameters of the simulated world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub width: usize,
    pub height: usize,
    /// Chance that an interior cell becomes a wall.
    pub wall_chance: f64,
    /// Chance that a non-wall interior cell starts with a zombie.
    pub zombie_chance: f64,
    pub invincibility_window: Duration,
    /// Seed for map generation and spawn placement; random when `None`.
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: MAP_WIDTH,
            height: MAP_HEIGHT,
            wall_chance: 0.2,
            zombie_chance: 0.1,
            invincibility_window: INVINCIBILITY_WINDOW,
            seed: None,
        }
    }
}

/// Multicast responder settings.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub bind_host: IpAddr,
    pub port: u16,
    pub group: Ipv4Addr,
    pub ttl: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_GAME_SERVER_PORT,
            group: MULTICAST_ADDRESS,
            ttl: MULTICAST_TTL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub world: WorldConfig,
    pub discovery: DiscoveryConfig,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_GAME_SERVER_PORT,
            world: WorldConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_GAME_SERVER_PORT);
        assert_eq!(config.discovery.port, DEFAULT_GAME_SERVER_PORT);
        assert_eq!(config.discovery.group, MULTICAST_ADDRESS);
        assert_eq!(config.world.width, 30);
        assert_eq!(config.world.height, 10);
        assert_eq!(config.world.invincibility_window, Duration::from_millis(300));
        assert!(config.discovery.enabled);
    }

    #[test]
    fn test_bind_address_formatting() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:0");
        assert!(config.bind_address().parse::<std::net::SocketAddr>().is_ok());
    }
}
