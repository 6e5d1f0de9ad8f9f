//! Storage Engine Module
//!
//! This module provides the core storage functionality for TideKV: a
//! thread-safe key-value map with per-key TTLs, optional append-only
//! durability and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │   RwLock<HashMap<String, Entry>>  ──mutations──>  AppendLog │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ Weak
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **TTL Support**: Keys can have time-to-live expiry
//! - **Lazy Expiry**: Expired keys are cleaned on access
//! - **Active Expiry**: Background sweeper cleans orphaned expired keys
//! - **Durability**: Every SET and DEL is appended to a log and replayed on open
//!
//! ## Example
//!
//! ```
//! use tidekv::storage::StorageEngine;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set("name", json!("naato"), Duration::ZERO).unwrap();
//! assert_eq!(engine.get("name"), Some(json!("naato")));
//!
//! // Set with TTL
//! engine.set("session", json!({"user": 7}), Duration::from_secs(3600)).unwrap();
//! assert!(engine.exists("session"));
//! ```

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::{now_nanos, Entry, StorageEngine, StorageStats};
pub use expiry::{ExpiryConfig, ExpirySweeper};
