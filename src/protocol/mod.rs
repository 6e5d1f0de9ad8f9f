//! Wire Protocol
//!
//! This module implements the framing and the text grammar spoken between
//! clients and the TideKV server.
//!
//! ## Overview
//!
//! Every message, request or reply, is a frame: a 4-byte big-endian length
//! followed by that many bytes of UTF-8. Inside a request frame is a command
//! line such as `SET name naato`; inside a reply frame is a marker-prefixed
//! reply such as `+OK` or `$naato`.
//!
//! ## Modules
//!
//! - `codec`: Frame encoding and incremental / streaming decoding
//! - `command`: Request grammar (`SET`, `SETEX`, `GET`, `DEL`, `PING`)
//! - `reply`: Reply payloads
//!
//! ## Example
//!
//! ```
//! use tidekv::protocol::{encode, Command, FrameParser, Frame};
//!
//! let frame = encode("GET name");
//! let (payload, consumed) = FrameParser::new().parse(&frame).unwrap().unwrap();
//! assert_eq!(consumed, frame.len());
//!
//! if let Frame::Text(line) = payload {
//!     assert_eq!(Command::parse(&line).unwrap(), Command::Get { key: "name".into() });
//! }
//! ```

pub mod codec;
pub mod command;
pub mod reply;

// Re-export commonly used types for convenience
pub use codec::{
    encode, read_frame, write_frame, CodecError, CodecResult, Frame, FrameParser, HEADER_SIZE,
    MAX_FRAME_SIZE,
};
pub use command::{Command, CommandError};
pub use reply::Reply;
