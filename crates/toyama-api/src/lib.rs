// toyama-api: Async Rust client for the Toyama gateway (HTTP operate + UDP updates)

pub mod client;
pub mod codec;
pub mod error;
pub mod listener;
pub mod transport;

pub use client::GatewayClient;
pub use codec::{BoardAddress, CommandType, OperateRequest, StateUpdate};
pub use error::{Error, RequestFailure};
pub use listener::{ListenerConfig, UdpBinder, UpdateListener};
pub use transport::{HttpTransport, RawResponse, Transport, TransportConfig};

// Re-exported so `Transport` implementations don't need a direct `url` dependency.
pub use url::Url;
