//! Append-Only File (AOF) Module
//!
//! This module gives the storage engine its durability. Every mutation is
//! appended to a single file as one JSON object per line, and on startup the
//! file is read back in order to rebuild the in-memory map.
//!
//! ## File Format
//!
//! ```text
//! {"type":"set","key":"name","value":"naato"}
//! {"type":"set","key":"lang","value":"x"}
//! {"type":"del","key":"lang"}
//! ```
//!
//! Lines are newline-delimited with no length prefix. The file is never
//! rewritten or compacted while the engine runs.
//!
//! ## Failure Semantics
//!
//! - Opening the file is fallible and the engine refuses to start without it
//!   once a path is configured.
//! - A failed append is returned to the caller; the in-memory write that
//!   preceded it stays in place.
//! - A line that cannot be parsed during replay is skipped, so a partially
//!   corrupted file still yields every readable record.

pub mod log;
pub mod record;

pub use log::{AofError, AppendLog, LogWriter, ReplayReport};
pub use record::Record;
