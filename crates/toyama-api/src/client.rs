// Gateway command dispatcher
//
// Every outbound request funnels through one async gate so the gateway never
// sees two overlapping writes. Deadlines start once the gate is held; time
// spent queued behind another request is not counted against a request.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::codec::{self, OperateRequest};
use crate::error::{Error, RequestFailure};
use crate::transport::{self, HttpTransport, RawResponse, Transport, TransportConfig};

/// The literal acknowledgement body. Anything else, including `"OK"`, is a
/// failure.
pub const ACK_BODY: &str = "ok";

/// Default deadline for device commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for broadcast status polls.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Serialized HTTP client for the gateway's `/operate` endpoint.
///
/// At most one request is in flight per client. Share a single instance
/// (behind an `Arc`) between everything that talks to the same gateway.
pub struct GatewayClient<T: Transport = HttpTransport> {
    transport: T,
    operate_url: Option<Url>,
    gate: Mutex<()>,
    command_timeout: Duration,
    status_timeout: Duration,
}

impl GatewayClient<HttpTransport> {
    /// Create a client backed by reqwest.
    ///
    /// `gateway` is the gateway host (`192.168.1.20`, `gw.local:8900`). A
    /// `None` address is accepted here; every send then fails with
    /// [`Error::NotConfigured`].
    pub fn new(gateway: Option<&str>, config: &TransportConfig) -> Result<Self, Error> {
        Self::with_transport(gateway, HttpTransport::new(config)?)
    }
}

impl<T: Transport> GatewayClient<T> {
    pub fn with_transport(gateway: Option<&str>, transport: T) -> Result<Self, Error> {
        let operate_url = gateway
            .filter(|g| !g.trim().is_empty())
            .map(transport::operate_url)
            .transpose()?;

        Ok(Self {
            transport,
            operate_url,
            gate: Mutex::new(()),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        })
    }

    /// Override the command and status-poll deadlines.
    pub fn with_timeouts(mut self, command: Duration, status: Duration) -> Self {
        self.command_timeout = command;
        self.status_timeout = status;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.operate_url.is_some()
    }

    /// The resolved `/operate` URL, if a gateway is configured.
    pub fn operate_url(&self) -> Option<&Url> {
        self.operate_url.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit a command payload and wait for the `ok` acknowledgement.
    pub async fn send(&self, payload: &OperateRequest) -> Result<(), Error> {
        self.submit(payload, self.command_timeout).await
    }

    /// Ask every board to report its state over UDP.
    ///
    /// Uses the (shorter) status deadline.
    pub async fn request_status(&self) -> Result<(), Error> {
        self.submit(&codec::encode_status_request(), self.status_timeout)
            .await
    }

    async fn submit(&self, payload: &OperateRequest, timeout: Duration) -> Result<(), Error> {
        let url = self.operate_url.as_ref().ok_or(Error::NotConfigured)?;

        trace!("waiting for request gate");
        let _gate = self.gate.lock().await;

        debug!(
            cmdtype = ?payload.command_type(),
            subid = ?payload.subid(),
            cmd = ?payload.command(),
            "sending gateway request"
        );

        let response = tokio::time::timeout(
            timeout,
            self.transport.post_operate(url, payload, timeout),
        )
        .await
        .map_err(|_| RequestFailure::Timeout(timeout))??;

        interpret_ack(response)?;
        Ok(())
    }
}

/// Decide whether a raw gateway response is a successful acknowledgement.
///
/// The body must be exactly [`ACK_BODY`] and the status must be 2xx.
pub fn interpret_ack(response: RawResponse) -> Result<(), RequestFailure> {
    if (200..300).contains(&response.status) && response.body == ACK_BODY {
        Ok(())
    } else {
        Err(RequestFailure::Rejected {
            status: response.status,
            body: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.into(),
        }
    }

    #[test]
    fn ack_accepts_only_literal_ok() {
        assert!(interpret_ack(raw(200, "ok")).is_ok());
        assert!(interpret_ack(raw(200, "OK")).is_err());
        assert!(interpret_ack(raw(200, "")).is_err());
        assert!(interpret_ack(raw(200, "ok\n")).is_err());
        assert!(interpret_ack(raw(200, "error")).is_err());
    }

    #[test]
    fn ack_requires_success_status() {
        match interpret_ack(raw(500, "ok")) {
            Err(RequestFailure::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "ok");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn blank_gateway_is_not_configured() {
        let client = GatewayClient::new(Some("  "), &TransportConfig::default());
        assert!(matches!(client, Ok(ref c) if !c.is_configured()));
    }
}
