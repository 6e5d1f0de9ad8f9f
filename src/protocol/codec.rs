//! Length-Prefixed Frame Codec
//!
//! Every request and every reply travels as one frame:
//!
//! ```text
//! ┌────────────────────┬──────────────────────────────┐
//! │ Length (4, BE u32) │  Payload (Length bytes UTF-8)│
//! └────────────────────┴──────────────────────────────┘
//! ```
//!
//! The length field is authoritative; the payload is never escaped or
//! scanned for delimiters. The codec does not know about commands, it only
//! frames text.
//!
//! Two decoding styles are provided:
//!
//! - [`FrameParser`] works over an accumulating receive buffer and returns
//!   `Ok(None)` until a whole frame is present (used by the server).
//! - [`read_frame`] pulls exactly one frame from an async reader, failing on
//!   any short read (used by the client).

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix
pub const HEADER_SIZE: usize = 4;

/// Maximum payload size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur while framing or unframing messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a whole frame was read
    #[error("unexpected end of stream: needed {needed} more bytes")]
    UnexpectedEof { needed: usize },

    /// The declared payload length exceeds the limit
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload is not valid UTF-8
    #[error("invalid UTF-8 in frame payload")]
    InvalidUtf8,
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a message as a length-prefixed frame.
///
/// # Example
///
/// ```
/// use tidekv::protocol::encode;
///
/// let frame = encode("SET a 1");
/// assert_eq!(&frame[..4], &[0, 0, 0, 7]);
/// assert_eq!(&frame[4..], b"SET a 1");
/// ```
pub fn encode(message: &str) -> Bytes {
    let mut frame = BytesMut::with_capacity(HEADER_SIZE + message.len());
    frame.put_u32(message.len() as u32);
    frame.put_slice(message.as_bytes());
    frame.freeze()
}

/// A frame pulled out of a receive buffer.
///
/// Invalid UTF-8 is reported per frame rather than as a stream error so the
/// caller can reply and keep the connection in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A well-formed text payload
    Text(String),

    /// A complete frame whose payload is not UTF-8
    InvalidUtf8,
}

/// Incremental frame parser over a receive buffer.
#[derive(Debug, Default)]
pub struct FrameParser;

impl FrameParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one frame from the front of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((frame, consumed)))` - a whole frame was present
    /// - `Ok(None)` - incomplete data, need more bytes
    /// - `Err(e)` - the length prefix is unacceptable
    pub fn parse(&self, buf: &[u8]) -> CodecResult<Option<(Frame, usize)>> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        let total = HEADER_SIZE + len;
        if buf.len() < total {
            return Ok(None);
        }

        let frame = match std::str::from_utf8(&buf[HEADER_SIZE..total]) {
            Ok(s) => Frame::Text(s.to_string()),
            Err(_) => Frame::InvalidUtf8,
        };

        Ok(Some((frame, total)))
    }
}

/// Reads exactly one frame from `reader`.
///
/// Blocks until the full frame has arrived. A stream that closes part way
/// through the header or payload is an [`CodecError::UnexpectedEof`].
pub async fn read_frame<R>(reader: &mut R) -> CodecResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    read_full(reader, &mut header).await?;

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload).await?;

    String::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)
}

/// Encodes `message` and writes it to `writer`, flushing afterwards.
pub async fn write_frame<W>(writer: &mut W, message: &str) -> CodecResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(message)).await?;
    writer.flush().await?;
    Ok(())
}

/// Fills `buf` completely, reporting how many bytes were missing on EOF.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> CodecResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(CodecError::UnexpectedEof {
                needed: buf.len() - filled,
            });
        }
        filled += n;
    }
    Ok(())
}
