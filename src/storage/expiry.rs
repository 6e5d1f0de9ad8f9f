//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically scans the database
//! for expired keys and removes them. This is called "active expiry" as opposed
//! to "lazy expiry" (which happens on access).
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry only removes a key when somebody reads it. A key that expires
//! and is never read again would otherwise stay in memory forever.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Waits for the next tick of a fixed interval (default: 1s)
//! 2. Calls [`StorageEngine::cleanup_expired`], which re-verifies every
//!    candidate under the write lock
//! 3. Logs how many keys it removed
//!
//! The task holds only a weak reference to the engine and exits on its own
//! once the engine is dropped.

use crate::storage::StorageEngine;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 1s)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// The sweeper task
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime. Most callers want
    /// [`StorageEngine::start_background_expiration`], which keeps the
    /// handle inside the engine.
    ///
    /// # Example
    ///
    /// ```
    /// use tidekv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(Arc::downgrade(&engine), ExpiryConfig::default());
    ///
    /// // Sweeper runs in the background...
    ///
    /// sweeper.join().await;
    /// # }
    /// ```
    pub fn start(engine: Weak<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let interval_ms = config.interval.as_millis() as u64;
        let handle = tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        info!(interval_ms, "Background expiry sweeper started");

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Stops the expiry sweeper.
    ///
    /// The task is signalled and aborted; it will not begin another pass.
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        if let Some(handle) = &self.handle {
            handle.abort();
        }
        info!("Background expiry sweeper stopped");
    }

    /// Signals shutdown and waits until the task has exited.
    pub async fn join(mut self) {
        let _ = self.shutdown_tx.send_replace(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Background expiry sweeper stopped");
    }

    /// Returns true once the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    engine: Weak<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // tokio::time::interval panics on a zero period
    let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let Some(engine) = engine.upgrade() else {
            debug!("Storage engine dropped, expiry sweeper exiting");
            return;
        };

        let expired = engine.cleanup_expired();
        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn fast() -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new());

        // Add some keys with short TTL
        for i in 0..10 {
            engine
                .set(format!("key{}", i), json!("value"), Duration::from_millis(50))
                .unwrap();
        }

        // Add a persistent key
        engine.set("persistent", json!("value"), Duration::ZERO).unwrap();

        assert_eq!(engine.len(), 11);

        let _sweeper = ExpirySweeper::start(Arc::downgrade(&engine), fast());

        // Wait for keys to expire and be cleaned up
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Only the persistent key should remain
        assert_eq!(engine.len(), 1);
        assert!(engine.exists("persistent"));
        assert_eq!(engine.stats().expired, 10);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        {
            let _sweeper = ExpirySweeper::start(Arc::downgrade(&engine), fast());
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Sweeper is dropped here
        }

        engine.set("key", json!("value"), Duration::from_millis(10)).unwrap();

        // Keys should NOT be cleaned up since the sweeper is stopped
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.len(), 1);

        // get() still triggers lazy expiry
        assert!(engine.get("key").is_none());
    }

    #[tokio::test]
    async fn test_join_waits_for_exit() {
        let engine = Arc::new(StorageEngine::new());
        let sweeper = ExpirySweeper::start(Arc::downgrade(&engine), fast());
        assert!(!sweeper.is_finished());

        tokio::time::timeout(Duration::from_secs(1), sweeper.join())
            .await
            .expect("sweeper did not stop");
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_engine_dropped() {
        let engine = Arc::new(StorageEngine::new());
        let sweeper = ExpirySweeper::start(Arc::downgrade(&engine), fast());

        drop(engine);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(sweeper.is_finished());
    }
}
