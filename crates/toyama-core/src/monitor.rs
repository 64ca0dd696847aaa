// ── Liveness monitor ──
//
// Periodic broadcast status poll. The outcome drives an advisory
// connectivity flag; nothing is ever blocked on it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toyama_api::{GatewayClient, Transport};

/// Connectivity flag with failure hysteresis.
///
/// Any success sets the flag; it only clears after `threshold`
/// consecutive failures.
pub(crate) struct Liveness {
    connected: watch::Sender<bool>,
    consecutive_failures: AtomicU32,
    threshold: u32,
}

impl Liveness {
    pub(crate) fn new(threshold: u32) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            connected,
            consecutive_failures: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Fold one poll result into the flag.
    pub(crate) fn record(&self, result: &Result<(), toyama_api::Error>) {
        match result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                if self.connected.send_if_modified(|c| !std::mem::replace(c, true)) {
                    info!("gateway reachable");
                }
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(error = %e, failures, "status poll failed");
                if failures >= self.threshold
                    && self.connected.send_if_modified(|c| std::mem::replace(c, false))
                {
                    warn!(error = %e, failures, "gateway unreachable");
                }
            }
        }
    }
}

/// Poll the gateway every `period` until cancelled.
///
/// With `delay_first` the first poll waits one full period (used when
/// `start` has just primed the gateway itself).
pub(crate) async fn run<T: Transport>(
    client: Arc<GatewayClient<T>>,
    liveness: Arc<Liveness>,
    period: Duration,
    delay_first: bool,
    cancel: CancellationToken,
) {
    let first = if delay_first {
        Instant::now() + period
    } else {
        Instant::now()
    };
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            r = client.request_status() => r,
        };
        liveness.record(&result);
    }

    debug!("liveness monitor stopped");
}
