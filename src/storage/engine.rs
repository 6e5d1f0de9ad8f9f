//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the core storage engine for TideKV: one map from
//! key to [`Entry`] behind a single reader/writer lock, per-key TTLs, and an
//! optional append-only log that records every mutation.
//!
//! ## Design Decisions
//!
//! 1. **One RwLock**: Readers share the lock on the common path. Writers, replay
//!    and verified expiry deletions take it exclusively.
//! 2. **Lazy Expiry**: An expired key is logically absent the moment its
//!    deadline passes; `get` removes it physically when it sees it.
//! 3. **Active Expiry**: A background sweeper removes expired keys nobody reads.
//! 4. **Double-Check**: Both expiry paths find candidates under the read lock,
//!    then re-verify under the write lock before deleting, because the key may
//!    have been deleted or rewritten in between.
//! 5. **Memory First**: The map is updated before the log append is issued.
//!    A failed append is reported but the in-memory write stays.
//! 6. **Log Lock First**: Writers take the log lock before the map lock, so a
//!    writer waiting on the disk never holds readers out of the map.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │                                                             │
//! │   RwLock<HashMap<String, Entry>>      Option<AppendLog>     │
//! │     get:   read ─┐                      (own Mutex)         │
//! │                  └─> write (expired)                        │
//! │     set/del: lock log ──> write map ──> release map ──> append │
//! │     sweep: read scan ──> write verify+delete                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::aof::{AofError, AppendLog, LogWriter, Record};
use crate::config::EngineConfig;
use crate::storage::expiry::{ExpiryConfig, ExpirySweeper};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Returns the current wall-clock time in Unix nanoseconds.
#[inline]
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The actual value stored
    pub value: Value,
    /// Absolute expiry in Unix nanoseconds (0 = never expires)
    pub expire_at_nanos: i64,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expire_at_nanos: 0,
        }
    }

    /// Creates a new entry with TTL. A zero TTL means no expiry.
    pub fn with_ttl(value: Value, ttl: Duration) -> Self {
        if ttl.is_zero() {
            return Self::new(value);
        }

        let ttl_nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        Self {
            value,
            expire_at_nanos: now_nanos().saturating_add(ttl_nanos),
        }
    }

    /// Checks if this entry has expired at the given instant.
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expire_at_nanos > 0 && self.expire_at_nanos <= now
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_nanos())
    }

    /// Returns the remaining time to live, or None if no expiry.
    pub fn ttl(&self) -> Option<Duration> {
        if self.expire_at_nanos == 0 {
            return None;
        }
        let remaining = self.expire_at_nanos.saturating_sub(now_nanos()).max(0);
        Some(Duration::from_nanos(remaining as u64))
    }
}

/// The main storage engine for TideKV.
///
/// This struct is designed to be wrapped in an `Arc` and shared across all
/// client handler tasks and the expiry sweeper. All operations are
/// thread-safe and none of them hold a lock across an `.await`.
///
/// # Example
///
/// ```
/// use tidekv::storage::StorageEngine;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", json!("naato"), Duration::ZERO).unwrap();
/// assert_eq!(engine.get("name"), Some(json!("naato")));
///
/// engine.del("name").unwrap();
/// assert_eq!(engine.get("name"), None);
/// ```
pub struct StorageEngine {
    /// Key space
    data: RwLock<HashMap<String, Entry>>,

    /// Append-only log (None = pure in-memory mode)
    aof: Option<AppendLog>,

    /// Handle of the running background sweeper, if any
    sweeper: Mutex<Option<ExpirySweeper>>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: number of expired keys cleaned up
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("aof", &self.aof.as_ref().map(|aof| aof.path().to_path_buf()))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a pure in-memory engine.
    pub fn new() -> Self {
        Self::with_aof(None)
    }

    fn with_aof(aof: Option<AppendLog>) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            aof,
            sweeper: Mutex::new(None),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Opens an engine according to `config`.
    ///
    /// With an AOF path configured, the log is opened (or created) and
    /// replayed before the engine is returned. Failing to open or read the
    /// log is an error: the engine does not fall back to memory-only mode.
    pub fn open(config: &EngineConfig) -> Result<Self, AofError> {
        let Some(path) = &config.aof_path else {
            info!("Storage engine running in memory-only mode");
            return Ok(Self::new());
        };

        let engine = Self::with_aof(Some(AppendLog::open(path, config.sync_policy)?));
        engine.load_from_aof()?;
        Ok(engine)
    }

    /// Rebuilds the key space from the log, in file order, under one write lock.
    ///
    /// Replayed entries never expire: TTLs are not recorded in the log.
    fn load_from_aof(&self) -> Result<(), AofError> {
        let Some(aof) = &self.aof else {
            return Ok(());
        };

        let report = aof.read_all_with_report()?;
        let replayed = report.records.len();

        let mut data = self.data.write();
        for record in report.records {
            match record {
                Record::Set { key, value } => {
                    data.insert(key, Entry::new(value));
                }
                Record::Del { key } => {
                    data.remove(&key);
                }
            }
        }

        info!(
            path = %aof.path().display(),
            replayed,
            skipped = report.skipped,
            keys = data.len(),
            "Recovered state from append-only log"
        );

        Ok(())
    }

    /// Sets a key-value pair. A zero `ttl` means the key never expires.
    ///
    /// Any existing entry is replaced. The in-memory write always happens; if
    /// the log append then fails, the error is returned and the write remains
    /// in memory without being durable.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) -> Result<(), AofError> {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let key = key.into();
        let record = self
            .aof
            .as_ref()
            .map(|_| Record::set(key.clone(), value.clone()));

        let writer = self.aof.as_ref().map(AppendLog::writer);

        let mut data = self.data.write();
        data.insert(key, Entry::with_ttl(value, ttl));
        drop(data);

        persist(writer, record)
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. This implements
    /// "lazy expiry": an expired key found here is removed, after the write
    /// lock has been taken and the expiry re-checked.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        // Fast path: read lock only
        {
            let data = self.data.read();
            let entry = data.get(key)?;
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }

        self.evict_if_expired(key)
    }

    /// Slow path of [`get`](Self::get): re-check under the write lock.
    ///
    /// - key now absent (someone else removed it) -> `None`
    /// - key still expired -> remove it, `None`
    /// - key live again (rewritten in the gap) -> its current value
    fn evict_if_expired(&self, key: &str) -> Option<Value> {
        let mut data = self.data.write();
        let entry = data.get(key)?;

        if entry.is_expired() {
            data.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        Some(entry.value.clone())
    }

    /// Deletes a key.
    ///
    /// Deleting an absent key is a successful no-op. A DEL record is appended
    /// to the log either way.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if a key was removed, `Ok(false)` if it didn't exist.
    pub fn del(&self, key: &str) -> Result<bool, AofError> {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let record = self.aof.as_ref().map(|_| Record::del(key));

        let writer = self.aof.as_ref().map(AppendLog::writer);

        let mut data = self.data.write();
        let removed = data.remove(key).is_some();
        drop(data);

        persist(writer, record)?;
        Ok(removed)
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &str) -> bool {
        let data = self.data.read();
        data.get(key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    /// Gets the remaining TTL for a key.
    ///
    /// # Returns
    ///
    /// - `Some(Some(remaining))` if the key exists and has an expiry
    /// - `Some(None)` if the key exists but never expires
    /// - `None` if the key doesn't exist
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let data = self.data.read();
        data.get(key)
            .filter(|entry| !entry.is_expired())
            .map(Entry::ttl)
    }

    /// Cleans up expired keys.
    ///
    /// Candidates are collected under the read lock; each one is re-verified
    /// under the write lock before it is removed, so a key renewed since the
    /// scan survives. This is called by the background expiry sweeper.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were cleaned up.
    pub fn cleanup_expired(&self) -> u64 {
        let now = now_nanos();
        let candidates: Vec<String> = {
            let data = self.data.read();
            data.iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect()
        };

        if candidates.is_empty() {
            return 0;
        }

        let mut data = self.data.write();
        let now = now_nanos();
        let mut cleaned = 0u64;

        for key in &candidates {
            if data.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
                data.remove(key);
                cleaned += 1;
            }
        }
        drop(data);

        if cleaned > 0 {
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }
        debug!(
            candidates = candidates.len(),
            cleaned, "Active expiry pass finished"
        );

        cleaned
    }

    /// Starts the background expiry sweeper for this engine.
    ///
    /// Must be called from within a Tokio runtime. The sweeper only holds a
    /// weak reference to the engine. Calling this again replaces the running
    /// sweeper; [`close`](Self::close) stops it.
    pub fn start_background_expiration(self: &Arc<Self>, interval: Duration) {
        let sweeper = ExpirySweeper::start(Arc::downgrade(self), ExpiryConfig { interval });

        if let Some(previous) = self.sweeper.lock().replace(sweeper) {
            previous.stop();
        }
    }

    /// Returns true while a background sweeper is attached.
    pub fn has_background_expiration(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    /// Stops the sweeper and closes the log.
    ///
    /// The sweeper is signalled and aborted before the log file is released.
    /// Calling `close` more than once is harmless. Mutations after close still
    /// reach memory but their log append fails with [`AofError::Closed`].
    pub fn close(&self) -> Result<(), AofError> {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }

        match &self.aof {
            Some(aof) => aof.close(),
            None => Ok(()),
        }
    }

    /// Like [`close`](Self::close), but waits for the sweeper task to finish.
    pub async fn shutdown(&self) -> Result<(), AofError> {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.join().await;
        }

        self.close()
    }

    /// Returns the number of physically stored keys, including expired keys
    /// not yet removed.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if mutations are written to an append-only log.
    pub fn is_persistent(&self) -> bool {
        self.aof.is_some()
    }

    /// Path of the append-only log, if any.
    pub fn aof_path(&self) -> Option<&Path> {
        self.aof.as_ref().map(AppendLog::path)
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Appends `record` through a log lock taken before the mutation.
///
/// Writers queue on the log lock without holding the map lock, so reads are
/// never stuck behind a file write. Because each writer held the log lock
/// across its map update, records reach the file in memory order.
fn persist(writer: Option<LogWriter<'_>>, record: Option<Record>) -> Result<(), AofError> {
    let (Some(mut writer), Some(record)) = (writer, record) else {
        return Ok(());
    };

    writer.append(&record).map_err(|e| {
        warn!(key = record.key(), error = %e, "Mutation applied in memory but not persisted");
        e
    })
}

/// Database statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Total expired keys cleaned up
    pub expired: u64,
}
