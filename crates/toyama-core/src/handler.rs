// ── Gateway handler ──
//
// Lifecycle and device operations for one Toyama gateway. Owns the
// serialized command client, the UDP update listener, the liveness
// monitor, and the callback registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toyama_api::codec::{BoardAddress, encode_operate};
use toyama_api::{GatewayClient, HttpTransport, StateUpdate, Transport, UpdateListener};

use crate::callback::{CallbackRegistry, CallbackResult};
use crate::config::GatewayConfig;
use crate::error::CoreError;
use crate::model::{Device, FanSpeed};
use crate::monitor::{self, Liveness};

/// State a fan is driven to by [`GatewayHandler::turn_on`].
const FAN_ON_STATE: i32 = 100;
const SWITCH_ON_STATE: i32 = 1;
const OFF_STATE: i32 = 0;

// ── GatewayHandler ───────────────────────────────────────────────────

/// Entry point for controlling one gateway.
///
/// Cheaply cloneable; clones share the same command gate, listener and
/// connectivity flag. Dropping the last clone cancels background tasks;
/// call [`shutdown()`](Self::shutdown) to also wait for them.
pub struct GatewayHandler<T: Transport = HttpTransport> {
    inner: Arc<HandlerInner<T>>,
}

impl<T: Transport> Clone for GatewayHandler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct HandlerInner<T: Transport> {
    config: GatewayConfig,
    client: Arc<GatewayClient<T>>,
    liveness: Arc<Liveness>,
    callbacks: Arc<CallbackRegistry>,
    cancel: CancellationToken,
    started: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport> Drop for HandlerInner<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl GatewayHandler<HttpTransport> {
    /// Create a handler talking HTTP to `config.address`. Does not start
    /// anything; call [`start()`](Self::start) for updates and liveness.
    pub fn new(config: GatewayConfig) -> Result<Self, CoreError> {
        let transport = HttpTransport::new(&config.transport)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> GatewayHandler<T> {
    /// Create a handler over a custom [`Transport`].
    pub fn with_transport(config: GatewayConfig, transport: T) -> Result<Self, CoreError> {
        let client = GatewayClient::with_transport(config.address.as_deref(), transport)?
            .with_timeouts(config.command_timeout, config.status_timeout);

        if !client.is_configured() {
            warn!("no gateway address configured, commands will fail");
        }

        Ok(Self {
            inner: Arc::new(HandlerInner {
                liveness: Arc::new(Liveness::new(config.liveness_failure_threshold)),
                config,
                client: Arc::new(client),
                callbacks: Arc::new(CallbackRegistry::default()),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn is_configured(&self) -> bool {
        self.inner.client.is_configured()
    }

    /// The underlying serialized client.
    pub fn client(&self) -> &Arc<GatewayClient<T>> {
        &self.inner.client
    }

    // ── Update callbacks ─────────────────────────────────────────────

    /// Register a callback for inbound state updates.
    ///
    /// Callbacks run one after another on the listener task. A callback
    /// that blocks stalls delivery of every later update; hand slow work
    /// off to another task. Errors and panics are logged per invocation.
    ///
    /// The listener is only started if at least one callback is registered
    /// before [`start()`](Self::start).
    pub fn register_update_callback<F>(&self, callback: F)
    where
        F: Fn(&StateUpdate) -> CallbackResult + Send + Sync + 'static,
    {
        self.inner.callbacks.register(callback);
        debug!(count = self.inner.callbacks.len(), "update callback registered");
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start background work.
    ///
    /// Spawns the liveness monitor (unless disabled). With callbacks
    /// registered it also spawns the update listener and sends one status
    /// request so every board reports in. Without a gateway address only
    /// the listener runs. A failed priming request is logged and reflected in the
    /// connectivity flag. Calling this again is a no-op.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("gateway handler already started");
            return;
        }

        let inner = &self.inner;
        let mut handles = inner.task_handles.lock().await;

        let primed = if inner.callbacks.is_empty() {
            debug!("no update callbacks registered, not listening for updates");
            false
        } else {
            let listener = UpdateListener::udp(inner.config.listener.clone());
            let callbacks = Arc::clone(&inner.callbacks);
            handles.push(tokio::spawn(listener.run(
                inner.cancel.clone(),
                move |update| {
                    callbacks.dispatch(&update);
                },
            )));

            if inner.client.is_configured() {
                let result = inner.client.request_status().await;
                if let Err(ref e) = result {
                    warn!(error = %e, "initial status request failed");
                }
                inner.liveness.record(&result);
                true
            } else {
                debug!("no gateway address, listening passively");
                false
            }
        };

        let period = inner.config.liveness_interval;
        if period.is_zero() || !inner.client.is_configured() {
            debug!("liveness monitor disabled");
        } else {
            handles.push(tokio::spawn(monitor::run(
                Arc::clone(&inner.client),
                Arc::clone(&inner.liveness),
                period,
                primed,
                inner.cancel.clone(),
            )));
        }

        info!(
            listening = !inner.callbacks.is_empty(),
            primed,
            tasks = handles.len(),
            "gateway handler started"
        );
    }

    /// Cancel background tasks and wait for them to finish.
    ///
    /// The update socket is closed by the time this returns.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("gateway handler stopped");
    }

    // ── Connectivity ─────────────────────────────────────────────────

    /// Last known reachability of the gateway. Advisory only; commands
    /// are sent regardless.
    pub fn is_connected(&self) -> bool {
        self.inner.liveness.is_connected()
    }

    /// Watch channel that changes whenever reachability flips.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.inner.liveness.subscribe()
    }

    // ── Device operations ────────────────────────────────────────────

    /// Switch a device on. Fans go to full speed.
    pub async fn turn_on(&self, device: &mut Device) -> Result<(), CoreError> {
        let state = if device.is_fan() {
            FAN_ON_STATE
        } else {
            SWITCH_ON_STATE
        };
        self.set_state(device, state).await
    }

    pub async fn turn_off(&self, device: &mut Device) -> Result<(), CoreError> {
        self.set_state(device, OFF_STATE).await
    }

    /// Set a fan to one of the levels 0, 25, 50, 75 or 100.
    ///
    /// Rejected without any network traffic if `device` is not a fan or
    /// `level` is not one of those values.
    pub async fn set_speed(&self, device: &mut Device, level: i32) -> Result<(), CoreError> {
        if !device.is_fan() {
            return Err(CoreError::NotAFan {
                device: device.nice_name(),
            });
        }
        let speed = FanSpeed::from_level(level)?;
        debug!(device = %device.nice_name(), %speed, "setting fan speed");
        self.set_state(device, speed.raw_state()).await
    }

    /// Drive a device to a raw state value.
    ///
    /// Fans only accept their five command values.
    pub async fn set_state(&self, device: &mut Device, state: i32) -> Result<(), CoreError> {
        if device.state == state {
            debug!(device = %device.nice_name(), state, "state unchanged, skipping");
            return Ok(());
        }
        self.update_device_state(device, state).await
    }

    /// Send `new_state` for `device` and record it on success.
    ///
    /// No request is made if the device is already in that state. A fan
    /// given anything but its five command values is rejected before any
    /// request. The stored state is updated once the gateway acknowledges,
    /// without waiting for the board's own UDP report.
    pub async fn update_device_state(
        &self,
        device: &mut Device,
        new_state: i32,
    ) -> Result<(), CoreError> {
        if device.state == new_state {
            return Ok(());
        }
        if device.is_fan() && !FanSpeed::is_valid_raw_state(new_state) {
            return Err(CoreError::InvalidFanState {
                device: device.nice_name(),
                state: new_state,
            });
        }

        let payload = encode_operate(
            vec![BoardAddress::Board(device.board_id)],
            Some(device.wire_button_id()),
            new_state,
        );

        self.inner
            .client
            .send(&payload)
            .await
            .map_err(|e| CoreError::for_device(device.nice_name(), e))?;

        debug!(
            device = %device.nice_name(),
            from = device.state,
            to = new_state,
            "device state updated"
        );
        device.state = new_state;
        Ok(())
    }

    /// Ask every board to report its state over UDP.
    ///
    /// The outcome also feeds the connectivity flag.
    pub async fn request_status(&self) -> Result<(), CoreError> {
        let result = self.inner.client.request_status().await;
        self.inner.liveness.record(&result);
        result.map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_is_cheap_to_share() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<GatewayHandler>();
    }

    #[tokio::test]
    async fn unconfigured_handler_starts_quietly() {
        let handler =
            GatewayHandler::new(GatewayConfig::default()).unwrap_or_else(|e| panic!("{e}"));
        assert!(!handler.is_configured());

        handler.start().await;
        handler.start().await;
        assert!(!handler.is_connected());
        assert!(handler.inner.task_handles.lock().await.is_empty());

        handler.shutdown().await;
    }
}
