//! Bridge configuration.

use std::time::Duration;

use crate::BridgeError;

/// Address the bridge listens on when none is configured.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Broadcast server the bridge connects to when none is configured.
pub const DEFAULT_UPSTREAM_ADDRESS: &str = "127.0.0.1:50051";

/// Runtime settings for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// HTTP listen address
    pub bind_address: String,
    /// Broadcast server address
    pub upstream_address: String,
    /// Outbound messages buffered per client before it is evicted
    pub queue_capacity: usize,
    /// Interval between heartbeat probes once a client has joined
    pub heartbeat_interval: Duration,
    /// How long a joined client may go without acknowledging a probe
    pub pong_wait: Duration,
    /// Bound on each outbound socket write
    pub write_timeout: Duration,
    /// Largest inbound wire message in bytes
    pub max_message_size: usize,
    /// Answer direct messages to offline users locally instead of forwarding
    pub strict_direct_targets: bool,
}

impl BridgeConfig {
    /// Reject settings the client driver cannot run with.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Config` for a zero queue capacity or message size, or
    ///   a heartbeat interval that is not shorter than the pong wait
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.queue_capacity == 0 {
            return Err(BridgeError::Config("queue capacity must be positive".into()));
        }
        if self.max_message_size == 0 {
            return Err(BridgeError::Config("max message size must be positive".into()));
        }
        if self.heartbeat_interval.is_zero() || self.heartbeat_interval >= self.pong_wait {
            return Err(BridgeError::Config(format!(
                "heartbeat interval {:?} must be non-zero and shorter than pong wait {:?}",
                self.heartbeat_interval, self.pong_wait
            )));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            upstream_address: DEFAULT_UPSTREAM_ADDRESS.to_string(),
            queue_capacity: 256,
            heartbeat_interval: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_size: 512,
            strict_direct_targets: false,
        }
    }
}
