// ── Core error types ──
//
// Device-level errors from toyama-core. Transport details stay wrapped:
// command failures carry the device's display name plus the underlying
// `toyama_api::Error` as their source.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Gateway address not configured")]
    NotConfigured,

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Caller errors (rejected before any network call) ─────────────
    #[error("Invalid fan speed level {level} (expected one of 0, 25, 50, 75, 100)")]
    InvalidSpeedLevel { level: i32 },

    #[error("Invalid state {state} for fan {device} (expected one of 0, 35, 50, 55, 100)")]
    InvalidFanState { device: String, state: i32 },

    #[error("{device} is not a fan")]
    NotAFan { device: String },

    // ── Gateway errors ───────────────────────────────────────────────
    #[error("Failed to update the state for {device}: {source}")]
    RequestFailed {
        device: String,
        #[source]
        source: toyama_api::Error,
    },

    #[error("Gateway request failed: {0}")]
    Api(#[source] toyama_api::Error),
}

impl CoreError {
    /// Wrap a command failure with the name of the device it targeted.
    pub(crate) fn for_device(device: String, err: toyama_api::Error) -> Self {
        match err {
            toyama_api::Error::NotConfigured => Self::NotConfigured,
            source => Self::RequestFailed { device, source },
        }
    }

    /// Returns `true` if the caller passed something the gateway was never
    /// asked about.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpeedLevel { .. } | Self::InvalidFanState { .. } | Self::NotAFan { .. }
        )
    }

    /// Returns `true` if the failure was a request timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::RequestFailed { source, .. } | Self::Api(source) => source.is_timeout(),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<toyama_api::Error> for CoreError {
    fn from(err: toyama_api::Error) -> Self {
        match err {
            toyama_api::Error::NotConfigured => CoreError::NotConfigured,
            toyama_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid gateway address: {e}"),
            },
            toyama_api::Error::ClientBuild(message) => CoreError::Config { message },
            other => CoreError::Api(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use toyama_api::RequestFailure;

    use super::*;

    #[test]
    fn device_wrapping_keeps_not_configured_bare() {
        let err = CoreError::for_device("Hall Fan".into(), toyama_api::Error::NotConfigured);
        assert!(matches!(err, CoreError::NotConfigured));
    }

    #[test]
    fn device_wrapping_names_the_device() {
        let err = CoreError::for_device(
            "Hall Fan".into(),
            toyama_api::Error::RequestFailed(RequestFailure::Timeout(Duration::from_secs(5))),
        );
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Failed to update the state for Hall Fan: Request failed: timed out after 5000ms"
        );
    }

    #[test]
    fn caller_errors() {
        assert!(CoreError::InvalidSpeedLevel { level: 30 }.is_caller_error());
        assert!(CoreError::NotAFan { device: "x".into() }.is_caller_error());
        assert!(!CoreError::NotConfigured.is_caller_error());
    }

    #[test]
    fn client_build_maps_to_config() {
        let err: CoreError = toyama_api::Error::ClientBuild("no TLS backend".into()).into();
        assert!(matches!(err, CoreError::Config { ref message } if message == "no TLS backend"));
    }
}
