// Shared transport configuration and the HTTP seam used by the dispatcher.
//
// The gateway's embedded HTTP server handles one request at a time and does
// not pipeline reliably, so the client built here keeps no idle connections:
// every operate request opens a fresh one.

use std::future::Future;
use std::net::Ipv6Addr;
use std::time::Duration;

use tracing::trace;
use url::Url;

use crate::codec::OperateRequest;
use crate::error::{Error, RequestFailure};

/// Port of the gateway's HTTP command server.
pub const GATEWAY_HTTP_PORT: u16 = 8900;

/// Path of the single command endpoint.
pub const OPERATE_PATH: &str = "/operate";

/// Status line and body of a gateway response, before acknowledgement
/// interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Something that can deliver an operate payload to the gateway.
///
/// [`HttpTransport`] is the production implementation. The dispatcher owns
/// gating, deadlines and acknowledgement parsing, so implementations only
/// move bytes.
pub trait Transport: Send + Sync + 'static {
    fn post_operate(
        &self,
        url: &Url,
        payload: &OperateRequest,
        timeout: Duration,
    ) -> impl Future<Output = Result<RawResponse, RequestFailure>> + Send;
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound applied by reqwest itself, on top of per-request deadlines.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("toyama/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
        })
    }
}

impl Transport for HttpTransport {
    async fn post_operate(
        &self,
        url: &Url,
        payload: &OperateRequest,
        timeout: Duration,
    ) -> Result<RawResponse, RequestFailure> {
        trace!(%url, "POST");

        let resp = self
            .http
            .post(url.clone())
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| classify(e, timeout))?;

        Ok(RawResponse { status, body })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> RequestFailure {
    if err.is_timeout() {
        RequestFailure::Timeout(timeout)
    } else {
        RequestFailure::Transport(err)
    }
}

/// Build the operate endpoint URL for a gateway host (IP or hostname,
/// optionally with an explicit port).
///
/// IPv6 literals may be bare (`fe80::1`) or bracketed (`[fe80::1]`,
/// `[fe80::1]:8900`).
pub fn operate_url(gateway: &str) -> Result<Url, Error> {
    let base = if gateway.contains("://") {
        Url::parse(gateway)?
    } else if let Ok(ip) = gateway.parse::<Ipv6Addr>() {
        Url::parse(&format!("http://[{ip}]:{GATEWAY_HTTP_PORT}"))?
    } else if gateway.ends_with(']') || !gateway.contains(':') {
        Url::parse(&format!("http://{gateway}:{GATEWAY_HTTP_PORT}"))?
    } else {
        Url::parse(&format!("http://{gateway}"))?
    };
    Ok(base.join(OPERATE_PATH)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn operate_url_uses_default_port() {
        let url = operate_url("192.168.1.20").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.20:8900/operate");
    }

    #[test]
    fn operate_url_keeps_explicit_port() {
        let url = operate_url("127.0.0.1:41234").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:41234/operate");
    }

    #[test]
    fn operate_url_accepts_full_base_url() {
        let url = operate_url("http://gateway.local:8900").unwrap();
        assert_eq!(url.as_str(), "http://gateway.local:8900/operate");
    }

    #[test]
    fn operate_url_brackets_ipv6_hosts() {
        let url = operate_url("fe80::1").unwrap();
        assert_eq!(url.as_str(), "http://[fe80::1]:8900/operate");

        let url = operate_url("[fe80::1]").unwrap();
        assert_eq!(url.as_str(), "http://[fe80::1]:8900/operate");

        let url = operate_url("[fe80::1]:9000").unwrap();
        assert_eq!(url.as_str(), "http://[fe80::1]:9000/operate");
    }

    #[test]
    fn default_transport_config_builds() {
        let config = TransportConfig::default();
        assert!(config.user_agent.starts_with("toyama/"));
        assert!(HttpTransport::new(&config).is_ok());
    }
}
