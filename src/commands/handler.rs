//! Command Handler Module
//!
//! This module executes TideKV commands against the storage engine.
//! It parses incoming command lines and dispatches them to the appropriate
//! handlers.
//!
//! ## Supported Commands
//!
//! - `SET key value` - Set a key
//! - `SETEX key seconds value` - Set a key with expiry
//! - `GET key` - Get a key's value
//! - `DEL key` - Delete a key
//! - `PING` - Test connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌──────────────────┐                    │
//! │  │   parse()   │───>│ execute_command()│                    │
//! │  └─────────────┘    └──────────────────┘                    │
//! │                              │                              │
//! │                              ▼                              │
//! │                       StorageEngine                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::aof::AofError;
use crate::protocol::{Command, Reply};
use crate::storage::StorageEngine;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// Executes commands against a shared storage engine.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Parses and executes one command line, returning the reply to send.
    ///
    /// Malformed input never fails the caller: it becomes an error reply.
    pub fn execute(&self, line: &str) -> Reply {
        match Command::parse(line) {
            Ok(command) => self.execute_command(command),
            Err(e) => Reply::error(e.to_string()),
        }
    }

    /// Executes an already parsed command.
    pub fn execute_command(&self, command: Command) -> Reply {
        trace!(command = command.name(), "Dispatching command");
        match command {
            Command::Set { key, value } => self.cmd_set(key, value, Duration::ZERO),
            Command::SetEx { key, ttl, value } => self.cmd_set(key, value, ttl),
            Command::Get { key } => self.cmd_get(&key),
            Command::Del { key } => self.cmd_del(&key),
            Command::Ping => Reply::Pong,
        }
    }

    /// SET key value / SETEX key seconds value
    ///
    /// Values arriving over the wire are stored as JSON strings.
    fn cmd_set(&self, key: String, value: String, ttl: Duration) -> Reply {
        match self.storage.set(key, Value::String(value), ttl) {
            Ok(()) => Reply::Ok,
            Err(e) => not_persisted(e),
        }
    }

    /// GET key
    fn cmd_get(&self, key: &str) -> Reply {
        match self.storage.get(key) {
            Some(value) => Reply::Value(render_value(value)),
            None => Reply::NotFound,
        }
    }

    /// DEL key
    ///
    /// Deleting a key that does not exist is still `+OK`.
    fn cmd_del(&self, key: &str) -> Reply {
        match self.storage.del(key) {
            Ok(_) => Reply::Ok,
            Err(e) => not_persisted(e),
        }
    }
}

/// Strings go out as their raw text; any other JSON value as compact JSON.
fn render_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn not_persisted(e: AofError) -> Reply {
    warn!(error = %e, "Replying with durability error");
    Reply::error(format!("applied in memory but not persisted: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();
        assert_eq!(handler.execute("PING"), Reply::Pong);
        assert_eq!(handler.execute("ping"), Reply::Pong);
    }

    #[test]
    fn test_set_get_del_sequence() {
        let handler = create_handler();

        assert_eq!(handler.execute("SET a 1"), Reply::Ok);
        assert_eq!(handler.execute("GET a"), Reply::Value("1".into()));
        assert_eq!(handler.execute("DEL a"), Reply::Ok);
        assert_eq!(handler.execute("GET a"), Reply::NotFound);
    }

    #[test]
    fn test_set_value_with_spaces() {
        let handler = create_handler();

        handler.execute("SET greeting hello there world");
        assert_eq!(
            handler.execute("GET greeting"),
            Reply::Value("hello there world".into())
        );
    }

    #[test]
    fn test_set_overwrites() {
        let handler = create_handler();

        handler.execute("SET k v1");
        handler.execute("SET k v2");
        assert_eq!(handler.execute("GET k"), Reply::Value("v2".into()));
    }

    #[test]
    fn test_del_missing_key() {
        let handler = create_handler();
        assert_eq!(handler.execute("DEL nothing"), Reply::Ok);
    }

    #[test]
    fn test_setex() {
        let handler = create_handler();

        assert_eq!(handler.execute("SETEX session 100 tok"), Reply::Ok);
        assert_eq!(handler.execute("GET session"), Reply::Value("tok".into()));
        assert!(handler.storage.ttl("session").unwrap().is_some());
    }

    #[test]
    fn test_get_renders_structured_values_as_json() {
        let handler = create_handler();

        handler
            .storage
            .set("doc", json!({"n": 1}), Duration::ZERO)
            .unwrap();
        assert_eq!(handler.execute("GET doc"), Reply::Value("{\"n\":1}".into()));
    }

    #[test]
    fn test_malformed_commands() {
        let handler = create_handler();

        assert_eq!(handler.execute(""), Reply::error("empty command"));
        assert_eq!(
            handler.execute("FLY me"),
            Reply::error("unknown command 'FLY'")
        );
        assert_eq!(
            handler.execute("GET"),
            Reply::error("wrong number of arguments for 'GET' command")
        );
        assert_eq!(
            handler.execute("SETEX k never v"),
            Reply::error("invalid expire time 'never'")
        );
    }

    #[test]
    fn test_write_failure_reports_not_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig::builder()
            .aof_path(temp_dir.path().join("tide.aof"))
            .build();
        let storage = Arc::new(StorageEngine::open(&config).unwrap());
        let handler = CommandHandler::new(Arc::clone(&storage));

        storage.close().unwrap();

        match handler.execute("SET k v") {
            Reply::Error(msg) => assert!(msg.starts_with("applied in memory but not persisted")),
            other => panic!("unexpected reply: {:?}", other),
        }
        // The write is still visible
        assert_eq!(handler.execute("GET k"), Reply::Value("v".into()));

        assert!(handler.execute("DEL k").is_error());
        assert_eq!(handler.execute("GET k"), Reply::NotFound);
    }
}
