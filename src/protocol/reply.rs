//! Reply Payloads
//!
//! Replies are single text frames whose first byte says what kind of reply
//! it is, in the spirit of RESP:
//!
//! | Payload          | Meaning                         |
//! |------------------|---------------------------------|
//! | `+OK`            | mutation accepted               |
//! | `+PONG`          | answer to `PING`                |
//! | `$<value>`       | `GET` hit, value follows as-is  |
//! | `-NOTFOUND`      | `GET` miss                      |
//! | `-ERR <message>` | malformed command or failure    |

use std::fmt;

/// A reply sent back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Success marker
    Ok,

    /// Answer to PING
    Pong,

    /// A stored value
    Value(String),

    /// The key does not exist (or has expired)
    NotFound,

    /// The command could not be executed
    Error(String),
}

impl Reply {
    /// Creates an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// Renders the reply payload.
    pub fn serialize(&self) -> String {
        match self {
            Reply::Ok => "+OK".to_string(),
            Reply::Pong => "+PONG".to_string(),
            Reply::Value(v) => format!("${}", v),
            Reply::NotFound => "-NOTFOUND".to_string(),
            Reply::Error(msg) => format!("-ERR {}", msg),
        }
    }

    /// Parses a reply payload. Returns `None` for payloads that are not a
    /// known reply shape.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "+OK" => return Some(Reply::Ok),
            "+PONG" => return Some(Reply::Pong),
            "-NOTFOUND" => return Some(Reply::NotFound),
            _ => {}
        }

        if let Some(value) = payload.strip_prefix('$') {
            return Some(Reply::Value(value.to_string()));
        }
        if let Some(msg) = payload.strip_prefix("-ERR") {
            return Some(Reply::Error(msg.trim_start().to_string()));
        }
        None
    }

    /// Returns true for `-NOTFOUND` and `-ERR` replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::NotFound | Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Pong => write!(f, "PONG"),
            Reply::Value(v) => write!(f, "{}", v),
            Reply::NotFound => write!(f, "(nil)"),
            Reply::Error(msg) => write!(f, "(error) {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        assert_eq!(Reply::Ok.serialize(), "+OK");
        assert_eq!(Reply::Pong.serialize(), "+PONG");
        assert_eq!(Reply::Value("1".into()).serialize(), "$1");
        assert_eq!(Reply::NotFound.serialize(), "-NOTFOUND");
        assert_eq!(
            Reply::error("unknown command 'FLY'").serialize(),
            "-ERR unknown command 'FLY'"
        );
    }

    #[test]
    fn test_parse_known_shapes() {
        for reply in [
            Reply::Ok,
            Reply::Pong,
            Reply::Value("hello world".into()),
            Reply::NotFound,
            Reply::error("bad"),
        ] {
            assert_eq!(Reply::parse(&reply.serialize()), Some(reply));
        }
    }

    #[test]
    fn test_values_that_look_like_markers() {
        // A stored value of "+OK" or "-NOTFOUND" is still a value.
        assert_eq!(
            Reply::parse(&Reply::Value("+OK".into()).serialize()),
            Some(Reply::Value("+OK".into()))
        );
        assert_eq!(
            Reply::parse(&Reply::Value("-NOTFOUND".into()).serialize()),
            Some(Reply::Value("-NOTFOUND".into()))
        );
        assert_eq!(Reply::parse("$"), Some(Reply::Value(String::new())));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Reply::parse(""), None);
        assert_eq!(Reply::parse("OK"), None);
        assert_eq!(Reply::parse("+MAYBE"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Reply::Ok.to_string(), "OK");
        assert_eq!(Reply::Pong.to_string(), "PONG");
        assert_eq!(Reply::Value("hello world".into()).to_string(), "hello world");
        assert_eq!(Reply::NotFound.to_string(), "(nil)");
        assert_eq!(Reply::error("boom").to_string(), "(error) boom");
        assert!(Reply::NotFound.is_error());
        assert!(!Reply::Ok.is_error());
    }
}
