// toyama-core: Device model and gateway orchestration on top of toyama-api.

pub mod callback;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
mod monitor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use callback::{CallbackResult, UpdateCallback};
pub use config::GatewayConfig;
pub use error::CoreError;
pub use handler::GatewayHandler;
pub use model::{Device, DeviceType, FanSpeed};

// Wire types callers see in callbacks and configuration.
pub use toyama_api::{ListenerConfig, StateUpdate, TransportConfig};
