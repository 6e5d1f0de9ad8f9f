//! Client Module
//!
//! An async client for embedding in other services. It speaks the same
//! length-prefixed frames as the server and hides connection management
//! behind `set` / `get` / `del`.

pub mod session;

pub use session::{ClientError, SessionClient};
