//! # TideKV - A Networked Key-Value Store with TTL and an Append-Only Log
//!
//! TideKV keeps its data in memory, expires keys on a per-key TTL, and can
//! record every mutation to an append-only log that is replayed on startup.
//! Clients talk to it over TCP using length-prefixed text frames.
//!
//! ## Features
//!
//! - **TTL Support**: Keys can have expiry times, enforced on read and by a
//!   background sweeper
//! - **Durability**: Optional JSON-lines append-only log, replayed on open
//! - **Simple Framing**: `[u32 big-endian length][UTF-8 payload]` in both directions
//! - **Async I/O**: Built on Tokio, one task per connection
//! - **Embedded Client**: [`client::SessionClient`] with automatic reconnect
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TideKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Frame     │    │              StorageEngine                   │   │
//! │  │   Codec     │    │   RwLock<HashMap>  ──────────>  AppendLog    │   │
//! │  └─────────────┘    └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use tidekv::config::{EngineConfig, ServerConfig};
//! use tidekv::server::Server;
//! use tidekv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::builder().aof_path("tidekv.aof").build();
//!     let storage = Arc::new(StorageEngine::open(&config)?);
//!     storage.start_background_expiration(config.sweep_interval);
//!
//!     let server = Server::bind(&ServerConfig::default(), Arc::clone(&storage)).await?;
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//!
//!     storage.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value`
//! - `SETEX key seconds value`
//! - `GET key`
//! - `DEL key`
//! - `PING`
//!
//! ## Module Overview
//!
//! - [`config`]: Engine, server and client configuration
//! - [`aof`]: Append-only log records, writer and replay
//! - [`storage`]: Thread-safe storage engine with TTL support
//! - [`protocol`]: Frame codec, command grammar and replies
//! - [`commands`]: Command execution against the engine
//! - [`connection`]: Client connection management
//! - [`server`]: Listener and accept loop
//! - [`client`]: Async session client
//!
//! ## Design Highlights
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A background task periodically scans for expired keys
//!
//! Both paths re-check expiry under the write lock before deleting, so a key
//! rewritten in the meantime is never lost.
//!
//! ### Write Ordering
//!
//! Mutations reach the log in the same order they were applied in memory.
//! Replaying the log therefore reproduces the final in-memory state, minus
//! TTLs, which are not persisted.

pub mod aof;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use aof::{AofError, AppendLog};
pub use client::{ClientError, SessionClient};
pub use commands::CommandHandler;
pub use config::{ClientConfig, EngineConfig, ServerConfig, SyncPolicy, DEFAULT_ADDR};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, Reply};
pub use server::Server;
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// Version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
