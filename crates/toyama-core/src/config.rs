// ── Runtime gateway configuration ──
//
// Describes *how* to talk to one gateway. Core never reads config files;
// the binary (or an embedding integration) builds a `GatewayConfig` and
// hands it in.

use std::time::Duration;

use toyama_api::client::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_STATUS_TIMEOUT};
use toyama_api::{ListenerConfig, TransportConfig};

/// Configuration for a single gateway handler.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway host, e.g. `192.168.1.20`. `None` makes every command fail
    /// with [`CoreError::NotConfigured`](crate::CoreError::NotConfigured).
    pub address: Option<String>,
    /// Deadline for device commands.
    pub command_timeout: Duration,
    /// Deadline for broadcast status polls (priming and liveness).
    pub status_timeout: Duration,
    /// How often the liveness monitor polls. `Duration::ZERO` = never.
    pub liveness_interval: Duration,
    /// Consecutive failed polls before the gateway is reported offline.
    pub liveness_failure_threshold: u32,
    /// UDP update listener settings.
    pub listener: ListenerConfig,
    /// HTTP client settings.
    pub transport: TransportConfig,
}

impl GatewayConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            liveness_interval: Duration::from_secs(10),
            liveness_failure_threshold: 1,
            listener: ListenerConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_protocol() {
        let config = GatewayConfig::new("192.168.1.20");
        assert_eq!(config.address.as_deref(), Some("192.168.1.20"));
        assert_eq!(config.status_timeout, Duration::from_secs(3));
        assert_eq!(config.liveness_interval, Duration::from_secs(10));
        assert_eq!(config.liveness_failure_threshold, 1);
        assert_eq!(config.listener.bind_addr.port(), 56000);
        assert_eq!(config.listener.recv_timeout, Duration::from_secs(5));
    }
}
