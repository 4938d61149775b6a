//! # Game Server Library
//!
//! This library provides the authoritative server for the multiplayer grid
//! game. It owns the one true copy of the world, applies the moves and attacks
//! clients request, and streams every resulting change back to all connected
//! clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The map, the zombies and the players' combat stats only ever change on the
//! server. Clients send intents ("move north", "attack east") and render
//! whatever the server reports back.
//!
//! ### Change Broadcasting
//! Every state change is published as a happening on an event bus. Each
//! connection subscribes to the bus, frames the happenings it receives and
//! writes them to its socket, together with the fields of its own player
//! that changed since the last message.
//!
//! ### LAN Discovery
//! A small UDP responder answers multicast requests so clients on the same
//! network can find running games without typing an address.
//!
//! ## Architecture Design
//!
//! ### Single-Task World Loop
//! All world mutations run on one task, one event at a time. Connection
//! tasks only decode and encode; they forward intents to the world loop over
//! a channel and receive deliveries back over per-connection channels. No
//! handler ever observes a half-applied move, and no locking is needed.
//!
//! ### Deferred Effects
//! Zombie reactions, the end of an invincibility window and the redraw of a
//! kill site happen one window after their cause. They are queued in a
//! min-heap that the world loop drains when the earliest entry is due, and
//! each of them re-checks the identity of its target before acting, so an
//! effect whose target has moved on is dropped.
//!
//! ### TCP With Delimited JSON
//! Each client holds one TCP connection. Messages are JSON objects separated
//! by a reserved delimiter character, see [`shared::framing`].
//!
//! ## Module Organization
//!
//! ### Entity Module (`entity`)
//! Cell occupants (ground, walls, zombies, players) and the combat stats of
//! the living.
//!
//! ### World Module (`world`)
//! The grid itself: map generation, players joining and leaving, snapshots
//! and chat.
//!
//! ### Combat Module (`combat`)
//! Move and attack legality, damage, kills and the deferred effects they
//! schedule.
//!
//! ### Events, Schedule and Scoreboard (`events`, `schedule`, `scoreboard`)
//! The publish/subscribe bus, the deferred effect queue and the kill/death
//! tally.
//!
//! ### Connection Module (`connection`)
//! One task per client socket and the per-client diff baseline.
//!
//! ### Network Module (`network`)
//! The accept loop, the discovery responder task and the world loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind the game port and the discovery responder with default settings
//!     let server = Server::new(ServerConfig::default()).await?;
//!
//!     // Run until the process is stopped:
//!     // - accepts connections and joins a player for each of them
//!     // - applies intents in arrival order
//!     // - fires deferred effects when they come due
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod combat;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod events;
pub mod network;
pub mod schedule;
pub mod scoreboard;
pub mod world;

pub use config::{DiscoveryConfig, ServerConfig, WorldConfig};
pub use error::{ServerError, WorldError};
pub use network::Server;
pub use world::GridWorld;
