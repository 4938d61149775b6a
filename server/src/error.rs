use crate::entity::EntityId;
use shared::Position;
use thiserror::Error;

/// Failures of the server's sockets.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind game server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("discovery socket error: {0}")]
    Discovery(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Requests the world cannot satisfy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("no ground cell left to place a player on")]
    NoFreeCell,
    #[error("no player with id {0:?}")]
    UnknownPlayer(EntityId),
    #[error("cell ({}, {}) is not free ground", .0.x, .0.y)]
    CellNotFree(Position),
    #[error("invalid map layout: {0}")]
    InvalidLayout(String),
}
