use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `toyama-api` crate.
///
/// Covers every failure mode on both gateway surfaces: the HTTP operate
/// endpoint and the UDP update stream. `toyama-core` maps these into
/// device-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// No gateway address was configured. Raised before any I/O.
    #[error("Gateway address not configured")]
    NotConfigured,

    /// The gateway address could not be turned into an endpoint URL.
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Commands ────────────────────────────────────────────────────
    /// An operate request did not come back with the `ok` acknowledgement.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] RequestFailure),

    // ── Updates ─────────────────────────────────────────────────────
    /// An inbound datagram matched neither update shape.
    #[error("Malformed update payload: {reason}")]
    MalformedPayload { reason: String, body: String },

    /// The UDP socket became unusable (interface change, reset, ...).
    #[error("UDP transport broken: {0}")]
    TransportBroken(#[source] std::io::Error),
}

/// Why a single HTTP command submission failed.
///
/// Timeouts are a variant here rather than a separate error so callers can
/// match on them without inspecting the transport error.
#[derive(Debug, Error)]
pub enum RequestFailure {
    /// No complete response within the request deadline.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection refused, reset, DNS failure, etc.
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The gateway answered, but not with the literal `ok`.
    #[error("gateway rejected request [{status}] - {body:?}")]
    Rejected { status: u16, body: String },
}

impl Error {
    /// Returns `true` if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestFailed(RequestFailure::Timeout(_)))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(RequestFailure::Timeout(_)) | Self::TransportBroken(_) => true,
            Self::RequestFailed(RequestFailure::Transport(e)) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status and body of a rejected request, if this is one.
    pub fn rejection(&self) -> Option<(u16, &str)> {
        match self {
            Self::RequestFailed(RequestFailure::Rejected { status, body }) => {
                Some((*status, body.as_str()))
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RequestFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}
