//! Textual Commands
//!
//! A request payload is one whitespace-delimited command line:
//!
//! - `SET <key> <value>`
//! - `SETEX <key> <seconds> <value>`
//! - `GET <key>`
//! - `DEL <key>`
//! - `PING`
//!
//! Verbs are case-insensitive. Keys never contain whitespace. A value is the
//! rest of the payload after the single space that follows the key (or the
//! TTL), so it may itself contain spaces or structure.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while parsing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The payload contained no verb
    #[error("empty command")]
    Empty,

    /// The verb is not recognized
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Too few or too many arguments for the verb
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// The TTL argument of SETEX is not a positive integer
    #[error("invalid expire time '{0}'")]
    InvalidTtl(String),
}

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a value without expiry
    Set { key: String, value: String },

    /// Store a value that expires after `ttl`
    SetEx {
        key: String,
        ttl: Duration,
        value: String,
    },

    /// Look a key up
    Get { key: String },

    /// Remove a key
    Del { key: String },

    /// Health check
    Ping,
}

impl Command {
    /// Parses a request payload into a command.
    ///
    /// # Example
    ///
    /// ```
    /// use tidekv::protocol::Command;
    ///
    /// let cmd = Command::parse("SET greeting hello world").unwrap();
    /// assert_eq!(
    ///     cmd,
    ///     Command::Set { key: "greeting".into(), value: "hello world".into() }
    /// );
    /// ```
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let (verb, rest) = next_token(line).ok_or(CommandError::Empty)?;

        match verb.to_ascii_uppercase().as_str() {
            "SET" => {
                let (key, value) = key_and_value(rest).ok_or(CommandError::WrongArity("SET"))?;
                Ok(Command::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            "SETEX" => {
                let (key, rest) = next_token(rest).ok_or(CommandError::WrongArity("SETEX"))?;
                let (seconds, value) =
                    key_and_value(rest).ok_or(CommandError::WrongArity("SETEX"))?;
                let ttl = match seconds.parse::<u64>() {
                    Ok(secs) if secs > 0 => Duration::from_secs(secs),
                    _ => return Err(CommandError::InvalidTtl(seconds.to_string())),
                };
                Ok(Command::SetEx {
                    key: key.to_string(),
                    ttl,
                    value: value.to_string(),
                })
            }
            "GET" => Ok(Command::Get {
                key: single_key(rest, "GET")?,
            }),
            "DEL" => Ok(Command::Del {
                key: single_key(rest, "DEL")?,
            }),
            "PING" => {
                if next_token(rest).is_some() {
                    return Err(CommandError::WrongArity("PING"));
                }
                Ok(Command::Ping)
            }
            _ => Err(CommandError::UnknownCommand(verb.to_string())),
        }
    }

    /// Returns the command's verb as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::SetEx { .. } => "SETEX",
            Command::Get { .. } => "GET",
            Command::Del { .. } => "DEL",
            Command::Ping => "PING",
        }
    }
}

impl fmt::Display for Command {
    /// Renders the command in its wire form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set { key, value } => write!(f, "SET {} {}", key, value),
            Command::SetEx { key, ttl, value } => {
                write!(f, "SETEX {} {} {}", key, ttl.as_secs(), value)
            }
            Command::Get { key } => write!(f, "GET {}", key),
            Command::Del { key } => write!(f, "DEL {}", key),
            Command::Ping => write!(f, "PING"),
        }
    }
}

/// Splits off the first whitespace-delimited token.
///
/// Returns the token and everything after it, starting at the delimiter.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], &s[end..])),
        None => Some((s, "")),
    }
}

/// Splits `<token> <remainder>`; the remainder must be non-empty.
fn key_and_value(s: &str) -> Option<(&str, &str)> {
    let (key, rest) = next_token(s)?;
    let mut chars = rest.chars();
    chars.next()?;
    let value = chars.as_str();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parses exactly one key with nothing after it.
fn single_key(s: &str, verb: &'static str) -> Result<String, CommandError> {
    let (key, rest) = next_token(s).ok_or(CommandError::WrongArity(verb))?;
    if next_token(rest).is_some() {
        return Err(CommandError::WrongArity(verb));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Command::parse("SET a 1").unwrap(),
            Command::Set {
                key: "a".into(),
                value: "1".into()
            }
        );
    }

    #[test]
    fn test_parse_set_value_keeps_inner_whitespace() {
        assert_eq!(
            Command::parse("SET doc {\"a\": [1, 2]}  trailing ").unwrap(),
            Command::Set {
                key: "doc".into(),
                value: "{\"a\": [1, 2]}  trailing ".into()
            }
        );
    }

    #[test]
    fn test_parse_set_value_only_strips_one_separator() {
        assert_eq!(
            Command::parse("SET k   padded").unwrap(),
            Command::Set {
                key: "k".into(),
                value: "  padded".into()
            }
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            Command::parse("get name").unwrap(),
            Command::Get { key: "name".into() }
        );
        assert_eq!(Command::parse("Ping").unwrap(), Command::Ping);
    }

    #[test]
    fn test_parse_setex() {
        assert_eq!(
            Command::parse("SETEX session 30 token abc").unwrap(),
            Command::SetEx {
                key: "session".into(),
                ttl: Duration::from_secs(30),
                value: "token abc".into()
            }
        );
    }

    #[test]
    fn test_parse_setex_invalid_ttl() {
        assert_eq!(
            Command::parse("SETEX k soon v"),
            Err(CommandError::InvalidTtl("soon".into()))
        );
        assert_eq!(
            Command::parse("SETEX k 0 v"),
            Err(CommandError::InvalidTtl("0".into()))
        );
    }

    #[test]
    fn test_parse_get_del() {
        assert_eq!(
            Command::parse("DEL a").unwrap(),
            Command::Del { key: "a".into() }
        );
        assert_eq!(
            Command::parse("  GET   a  ").unwrap(),
            Command::Get { key: "a".into() }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(Command::parse("SET a"), Err(CommandError::WrongArity("SET")));
        assert_eq!(Command::parse("SET a "), Err(CommandError::WrongArity("SET")));
        assert_eq!(Command::parse("SET"), Err(CommandError::WrongArity("SET")));
        assert_eq!(Command::parse("GET"), Err(CommandError::WrongArity("GET")));
        assert_eq!(Command::parse("GET a b"), Err(CommandError::WrongArity("GET")));
        assert_eq!(Command::parse("DEL"), Err(CommandError::WrongArity("DEL")));
        assert_eq!(Command::parse("PING x"), Err(CommandError::WrongArity("PING")));
        assert_eq!(
            Command::parse("FLY away"),
            Err(CommandError::UnknownCommand("FLY".into()))
        );
    }

    #[test]
    fn test_display_is_parseable() {
        let commands = vec![
            Command::Set {
                key: "a".into(),
                value: "hello world".into(),
            },
            Command::SetEx {
                key: "s".into(),
                ttl: Duration::from_secs(5),
                value: "v".into(),
            },
            Command::Get { key: "a".into() },
            Command::Del { key: "a".into() },
            Command::Ping,
        ];

        for command in commands {
            let line = command.to_string();
            assert!(line.starts_with(command.name()));
            assert_eq!(Command::parse(&line).unwrap(), command);
        }
    }
}
