//! Configuration for TideKV
//!
//! Every component takes its configuration as an explicit value at
//! construction time. Nothing here is global: the binaries build these
//! structs from command-line flags and hand them down.

use std::path::PathBuf;
use std::time::Duration;

/// The default address the server binds to and the client dials.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6380";

/// How often the append-only log is forced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// `fsync` after every appended record (safest, slowest)
    ///
    /// Appends run synchronously inside `set`/`del`. In the server that is a
    /// Tokio worker thread, which stays parked for the length of each fsync
    /// and cannot poll other connections meanwhile. Size the runtime's worker
    /// pool with that in mind.
    Always,

    /// Leave flushing to the operating system
    #[default]
    OsDefault,
}

/// Configuration for the storage engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the append-only log. `None` runs the engine purely in memory.
    pub aof_path: Option<PathBuf>,

    /// Sync strategy for the append-only log
    pub sync_policy: SyncPolicy,

    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aof_path: None,
            sync_policy: SyncPolicy::OsDefault,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Create a new config builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`]
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Enable the append-only log at the given path
    pub fn aof_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.aof_path = Some(path.into());
        self
    }

    /// Set the log sync strategy
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.sync_policy = policy;
        self
    }

    /// Set the background sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Configuration for the TCP command server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (host:port)
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
        }
    }
}

/// Configuration for the session client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub addr: String,

    /// Upper bound on how long a dial may take
    pub dial_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            dial_timeout: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set the dial timeout
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_are_in_memory() {
        let config = EngineConfig::default();
        assert!(config.aof_path.is_none());
        assert_eq!(config.sync_policy, SyncPolicy::OsDefault);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_engine_builder() {
        let config = EngineConfig::builder()
            .aof_path("/tmp/tide.aof")
            .sync_policy(SyncPolicy::Always)
            .sweep_interval(Duration::from_millis(250))
            .build();

        assert_eq!(config.aof_path, Some(PathBuf::from("/tmp/tide.aof")));
        assert_eq!(config.sync_policy, SyncPolicy::Always);
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("10.0.0.1:7000").dial_timeout(Duration::from_millis(500));
        assert_eq!(config.addr, "10.0.0.1:7000");
        assert_eq!(config.dial_timeout, Duration::from_millis(500));
    }
}
