//! # Platform Configuration
//!
//! Defaults tuned for a single-node deployment, every knob overridable
//! through `PAWHAVEN_*` environment variables. Malformed overrides are
//! ignored in favor of the default rather than failing startup; a config
//! that fails [`PlatformConfig::validate`] does fail startup.

use shared_bus::{ReconnectPolicy, DEFAULT_QUEUE_CAPACITY};
use std::time::Duration;
use tracing::warn;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    pub bus: BusConfig,
    pub rpc: RpcConfig,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
}

impl PlatformConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.bus.connect_attempts == 0 {
            return Err(ConfigError::ZeroConnectAttempts);
        }
        if self.payment.window_secs == 0 {
            return Err(ConfigError::ZeroPaymentWindow);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Queue capacity of zero would make every publish block forever.
    ZeroQueueCapacity,
    /// At least one broker dial attempt is required.
    ZeroConnectAttempts,
    /// A zero payment window would expire every approval immediately.
    ZeroPaymentWindow,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ZeroQueueCapacity => {
                write!(f, "PAWHAVEN_QUEUE_CAPACITY must be at least 1")
            }
            ConfigError::ZeroConnectAttempts => {
                write!(f, "PAWHAVEN_CONNECT_ATTEMPTS must be at least 1")
            }
            ConfigError::ZeroPaymentWindow => {
                write!(f, "PAWHAVEN_PAYMENT_WINDOW_SECS must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Broker connection and queue sizing.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Dial attempts before startup fails.
    pub connect_attempts: u32,
    /// Fixed delay between dial attempts, in milliseconds.
    pub connect_backoff_ms: u64,
    /// Messages buffered per queue before publishers feel backpressure.
    pub queue_capacity: usize,
}

impl BusConfig {
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.connect_attempts,
            Duration::from_millis(self.connect_backoff_ms),
        )
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            connect_backoff_ms: 500,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Correlation RPC deadlines.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Per-call response deadline in seconds.
    pub request_timeout_secs: u64,
    /// How often the pending-request sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
}

impl RpcConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            sweep_interval_secs: 5,
        }
    }
}

/// Payment window and reaper cadence.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// How long an approved application may sit unpaid, in seconds.
    pub window_secs: u64,
    /// How often the reaper sweeps, in seconds.
    pub reaper_interval_secs: u64,
}

impl PaymentConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            window_secs: 24 * 60 * 60,
            reaper_interval_secs: 60,
        }
    }
}

/// Which document store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    RocksDb,
}

/// Document store selection.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for the durable backend.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: "./data/pawhaven".to_string(),
        }
    }
}

/// Load configuration from defaults plus `PAWHAVEN_*` environment overrides.
pub fn load_config() -> PlatformConfig {
    let mut config = PlatformConfig::default();

    if let Ok(attempts) = std::env::var("PAWHAVEN_CONNECT_ATTEMPTS") {
        if let Ok(n) = attempts.parse() {
            config.bus.connect_attempts = n;
        }
    }
    if let Ok(backoff) = std::env::var("PAWHAVEN_CONNECT_BACKOFF_MS") {
        if let Ok(ms) = backoff.parse() {
            config.bus.connect_backoff_ms = ms;
        }
    }
    if let Ok(capacity) = std::env::var("PAWHAVEN_QUEUE_CAPACITY") {
        if let Ok(n) = capacity.parse() {
            config.bus.queue_capacity = n;
        }
    }
    if let Ok(timeout) = std::env::var("PAWHAVEN_REQUEST_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse() {
            config.rpc.request_timeout_secs = secs;
        }
    }
    if let Ok(interval) = std::env::var("PAWHAVEN_SWEEP_INTERVAL_SECS") {
        if let Ok(secs) = interval.parse() {
            config.rpc.sweep_interval_secs = secs;
        }
    }
    if let Ok(window) = std::env::var("PAWHAVEN_PAYMENT_WINDOW_SECS") {
        if let Ok(secs) = window.parse() {
            config.payment.window_secs = secs;
        }
    }
    if let Ok(interval) = std::env::var("PAWHAVEN_REAPER_INTERVAL_SECS") {
        if let Ok(secs) = interval.parse() {
            config.payment.reaper_interval_secs = secs;
        }
    }
    if let Ok(backend) = std::env::var("PAWHAVEN_STORAGE_BACKEND") {
        match backend.as_str() {
            "memory" => config.storage.backend = StorageBackend::Memory,
            "rocksdb" => config.storage.backend = StorageBackend::RocksDb,
            other => warn!(backend = other, "unknown storage backend, keeping default"),
        }
    }
    if let Ok(dir) = std::env::var("PAWHAVEN_DATA_DIR") {
        config.storage.data_dir = dir;
    }

    config
}
