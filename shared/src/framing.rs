//! Delimiter framing for JSON messages carried over a byte stream.
//!
//! Every message is serialized to JSON text and terminated by [`DELIMITER`].
//! Several frames may arrive in a single read, and a frame may be split
//! across reads, so the receiving side buffers bytes in a [`FrameDecoder`]
//! and only decodes slices that are followed by a delimiter.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const DELIMITER: char = 'µ';

const DELIMITER_BYTES: &[u8] = "µ".as_bytes();

/// Escaped form of the delimiter inside JSON strings.
const DELIMITER_ESCAPE: &str = "\\u00b5";

/// Upper bound on bytes buffered while waiting for a delimiter.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("pending frame of {len} bytes exceeds the {limit} byte limit")]
    Oversized { len: usize, limit: usize },
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Serializes `message` and appends the delimiter.
///
/// The delimiter can only appear inside JSON strings, where it is replaced by
/// the `\u00b5` escape, so the output contains exactly one delimiter.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, FrameError> {
    let text = serde_json::to_string(message).map_err(FrameError::Encode)?;
    let mut frame = text.replace(DELIMITER, DELIMITER_ESCAPE).into_bytes();
    frame.extend_from_slice(DELIMITER_BYTES);
    Ok(frame)
}

/// Encodes several messages into one buffer suitable for a single write.
pub fn encode_all<'a, T, I>(messages: I) -> Result<Vec<u8>, FrameError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut out = Vec::new();
    for message in messages {
        out.extend(encode(message)?);
    }
    Ok(out)
}

/// Accumulates inbound bytes and splits them into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and decodes every complete frame in arrival order.
    ///
    /// The bytes after the last delimiter stay buffered until a later call
    /// completes them. Empty frames are skipped. A frame that fails to decode
    /// poisons the stream: the caller is expected to drop the connection.
    pub fn push<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<Vec<T>, FrameError> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = find_delimiter(&self.buffer[start..]) {
            let end = start + offset;
            let slice = &self.buffer[start..end];
            if !slice.iter().all(u8::is_ascii_whitespace) {
                frames.push(serde_json::from_slice(slice).map_err(FrameError::Malformed)?);
            }
            start = end + DELIMITER_BYTES.len();
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_PENDING_BYTES {
            return Err(FrameError::Oversized {
                len: self.buffer.len(),
                limit: MAX_PENDING_BYTES,
            });
        }

        Ok(frames)
    }

    /// Number of bytes waiting for a delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(DELIMITER_BYTES.len())
        .position(|window| window == DELIMITER_BYTES)
}
