//! TCP connection to the game server.
//!
//! Wraps a stream socket with the shared delimiter framing and maps socket
//! failures onto the few signals a front end cares about: the server reset
//! or closed the connection, refused it, could not be found, or did not
//! answer in time.

use log::{debug, info};
use shared::{encode, ClientMessage, FrameDecoder, FrameError, ServerMessage};
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};

/// How long to wait for the server to accept the connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionFault {
    #[error("the server reset the connection")]
    Reset,
    #[error("the server refused the connection")]
    Refused,
    #[error("the server could not be found")]
    NotFound,
    #[error("the server did not answer in time")]
    Timeout,
    #[error("the server closed the connection")]
    Closed,
}

impl ConnectionFault {
    /// Maps an I/O error onto a fault, `None` for errors that are not about
    /// the connection itself.
    pub fn classify(error: &io::Error) -> Option<Self> {
        match error.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Some(ConnectionFault::Reset),
            io::ErrorKind::ConnectionRefused => Some(ConnectionFault::Refused),
            io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable => {
                Some(ConnectionFault::NotFound)
            }
            io::ErrorKind::TimedOut => Some(ConnectionFault::Timeout),
            io::ErrorKind::UnexpectedEof => Some(ConnectionFault::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Fault(#[from] ConnectionFault),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Io(io::Error),
}

impl ClientError {
    pub fn fault(&self) -> Option<ConnectionFault> {
        match self {
            ClientError::Fault(fault) => Some(*fault),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        match ConnectionFault::classify(&error) {
            Some(fault) => ClientError::Fault(fault),
            None => ClientError::Io(error),
        }
    }
}

pub struct GameConnection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    decoder: FrameDecoder,
    // decoded but not yet handed out
    pending: VecDeque<ServerMessage>,
    peer: SocketAddr,
}

impl GameConnection {
    /// Connects to `address` (`host:port`), giving up after `timeout`.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, ClientError> {
        let addr = lookup_host(address)
            .await
            .map_err(|e| {
                debug!("Failed to resolve {}: {}", address, e);
                ConnectionFault::NotFound
            })?
            .next()
            .ok_or(ConnectionFault::NotFound)?;

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionFault::Timeout)??;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            writer,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            peer: addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let bytes = encode(message)?;
        self.writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Waits for the next server message.
    ///
    /// Cancel safe: dropping the future never loses a received message.
    pub async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        let mut buffer = [0u8; 4096];

        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            let len = self.reader.read(&mut buffer).await?;
            if len == 0 {
                return Err(ConnectionFault::Closed.into());
            }
            let messages: Vec<ServerMessage> = self.decoder.push(&buffer[..len])?;
            self.pending.extend(messages);
        }
    }
}
