//! Log Records
//!
//! One [`Record`] is written per mutation. The serde representation is an
//! internally tagged object so each line reads `{"type":"set",...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single mutation in the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    /// Store `value` under `key`, replacing any previous entry
    Set { key: String, value: Value },

    /// Remove `key`. Older writers emit `"value": null` here; it is ignored.
    Del { key: String },
}

impl Record {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Record::Set {
            key: key.into(),
            value,
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        Record::Del { key: key.into() }
    }

    /// The key this record mutates.
    pub fn key(&self) -> &str {
        match self {
            Record::Set { key, .. } | Record::Del { key } => key,
        }
    }

    /// Serializes the record as a single newline-terminated line.
    pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
