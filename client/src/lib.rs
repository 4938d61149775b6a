//! # Game Client Library
//!
//! This library provides a terminal client for the multiplayer grid game. It
//! finds servers on the local network, holds the TCP connection to one of
//! them, turns typed commands into intents and keeps a local mirror of
//! everything the server reports.
//!
//! ## Architecture Overview
//!
//! The server is authoritative. The client never simulates anything on its
//! own: it sends what the player wants to do and applies the changes that
//! come back, in order.
//!
//! ### Delta Player Updates
//! Every server message carries only the fields of the player's own stats
//! that changed since the previous message. The client merges them into its
//! copy, so the copy is complete once the first message has arrived.
//!
//! ### Map Mirroring
//! A full map arrives once after joining. From then on single-cell changes
//! are patched into it.
//!
//! ## Module Organization
//!
//! ### Discovery Module (`discovery`)
//! Multicasts a request and lists the servers that answered.
//!
//! ### Game Module (`game`)
//! The local mirror: map, player stats, scoreboard and chat log.
//!
//! ### Input Module (`input`)
//! Parses typed command lines into client messages.
//!
//! ### Network Module (`network`)
//! The framed TCP connection and the connection fault classification.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientView;
//! use client::input::parse_command;
//! use client::network::{GameConnection, CONNECT_TIMEOUT};
//! use shared::ClientMessage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut connection = GameConnection::connect("127.0.0.1:49152", CONNECT_TIMEOUT).await?;
//!     connection.send(&ClientMessage::Join {}).await?;
//!
//!     let mut view = ClientView::new();
//!     connection.send(&parse_command("attack e")?).await?;
//!
//!     loop {
//!         let message = connection.recv().await?;
//!         if let Some(line) = view.apply(&message) {
//!             println!("{}", line);
//!         }
//!     }
//! }
//! ```

pub mod discovery;
pub mod game;
pub mod input;
pub mod network;
