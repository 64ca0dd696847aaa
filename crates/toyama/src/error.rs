//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use toyama_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No gateway address configured")]
    #[diagnostic(
        code(toyama::no_gateway),
        help("Pass --gateway <HOST> or set the TOYAMA_GATEWAY environment variable.")
    )]
    NoGateway,

    #[error("Invalid gateway address: {reason}")]
    #[diagnostic(
        code(toyama::bad_gateway_address),
        help("Use a host or host:port, e.g. 192.168.1.20 or gw.local:8900")
    )]
    BadGatewayAddress { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(
        code(toyama::invalid_input),
        help("Fan levels are 0, 25, 50, 75 and 100; speed only applies to fans.")
    )]
    InvalidInput(String),

    // ── Gateway ──────────────────────────────────────────────────────
    #[error("Gateway did not acknowledge {target}")]
    #[diagnostic(
        code(toyama::rejected),
        help("The gateway answered [{status}] '{body}' instead of 'ok'.")
    )]
    Rejected {
        target: String,
        status: u16,
        body: String,
    },

    #[error("Timed out waiting for the gateway ({target})")]
    #[diagnostic(
        code(toyama::timeout),
        help("Increase the deadline with --timeout, or check that the gateway is powered.")
    )]
    Timeout { target: String },

    #[error("Could not reach the gateway ({target})")]
    #[diagnostic(
        code(toyama::connection_failed),
        help("Check the gateway address and that this host is on the same network.")
    )]
    ConnectionFailed {
        target: String,
        #[source]
        source: CoreError,
    },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode update: {0}")]
    #[diagnostic(code(toyama::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) | Self::BadGatewayAddress { .. } => exit_code::USAGE,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoGateway | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_caller_error() {
            return CliError::InvalidInput(err.to_string());
        }

        let target = match &err {
            CoreError::RequestFailed { device, .. } => device.clone(),
            _ => "status request".into(),
        };

        match err {
            CoreError::NotConfigured => CliError::NoGateway,
            CoreError::Config { message } => CliError::BadGatewayAddress { reason: message },
            ref e if e.is_timeout() => CliError::Timeout { target },
            CoreError::RequestFailed { ref source, .. } | CoreError::Api(ref source)
                if source.rejection().is_some() =>
            {
                let (status, body) = source.rejection().unwrap_or_default();
                CliError::Rejected {
                    target,
                    status,
                    body: body.to_owned(),
                }
            }
            other => CliError::ConnectionFailed {
                target,
                source: other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use toyama_api::RequestFailure;

    use super::*;

    fn failed(failure: RequestFailure) -> CoreError {
        CoreError::RequestFailed {
            device: "Hall Fan".into(),
            source: toyama_api::Error::RequestFailed(failure),
        }
    }

    #[test]
    fn caller_errors_are_usage_errors() {
        let err = CliError::from(CoreError::InvalidSpeedLevel { level: 30 });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().starts_with("Invalid fan speed level 30"));
    }

    #[test]
    fn gateway_failures_keep_the_device_name() {
        let err = CliError::from(failed(RequestFailure::Timeout(Duration::from_secs(5))));
        assert!(matches!(err, CliError::Timeout { ref target } if target == "Hall Fan"));
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);

        let err = CliError::from(failed(RequestFailure::Rejected {
            status: 200,
            body: "error".into(),
        }));
        assert!(matches!(
            err,
            CliError::Rejected { status: 200, ref body, .. } if body == "error"
        ));
    }

    #[test]
    fn missing_gateway() {
        let err = CliError::from(CoreError::NotConfigured);
        assert!(matches!(err, CliError::NoGateway));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
