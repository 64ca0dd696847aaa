//! UDP update listener with automatic rebind.
//!
//! Boards push state changes to port 56000 as JSON datagrams. The listener
//! owns the socket, decodes every datagram with [`decode_update`], and hands
//! each resulting [`StateUpdate`] to a delivery closure.
//!
//! The loop only ends on cancellation. Receive timeouts are the idle path;
//! a socket error (typically a network interface going away) drops the
//! socket and binds a fresh one at the same address; bad datagrams are
//! logged and skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use toyama_api::listener::{ListenerConfig, UpdateListener};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let listener = UpdateListener::udp(ListenerConfig::default());
//!
//! tokio::spawn(listener.run(cancel.clone(), |update| {
//!     println!("{} #{} -> {}", update.board, update.button_id, update.state);
//! }));
//! ```

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::{StateUpdate, decode_update};
use crate::error::Error;

/// Well-known port boards send updates to.
pub const UPDATE_PORT: u16 = 56000;

const DATAGRAM_BUFFER_SIZE: usize = 1024;

// ── Socket seam ──────────────────────────────────────────────────────

/// A bound datagram socket the listener can read from.
pub trait DatagramSocket: Send + 'static {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a;
}

impl DatagramSocket for UdpSocket {
    async fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> io::Result<usize> {
        let (len, peer) = self.recv_from(buf).await?;
        trace!(%peer, len, "datagram received");
        Ok(len)
    }
}

/// Opens (and re-opens) the listener's socket.
pub trait SocketBinder: Send + Sync + 'static {
    type Socket: DatagramSocket;

    fn bind(&self) -> impl Future<Output = io::Result<Self::Socket>> + Send;
}

/// Binds a real tokio [`UdpSocket`] at a fixed address.
#[derive(Debug, Clone)]
pub struct UdpBinder {
    addr: SocketAddr,
}

impl UdpBinder {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl SocketBinder for UdpBinder {
    type Socket = UdpSocket;

    async fn bind(&self) -> io::Result<UdpSocket> {
        UdpSocket::bind(self.addr).await
    }
}

/// `0.0.0.0:56000`
pub fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, UPDATE_PORT))
}

// ── ListenerConfig ───────────────────────────────────────────────────

/// Timing knobs for the receive loop.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind. Default: `0.0.0.0:56000`.
    pub bind_addr: SocketAddr,

    /// Longest single wait for a datagram before looping. Default: 5s.
    pub recv_timeout: Duration,

    /// Pause between iterations, bounding busy-looping under bursts.
    /// Default: 100ms.
    pub loop_pause: Duration,

    /// Wait before retrying a failed bind. Default: 1s.
    pub rebind_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_listen_addr(),
            recv_timeout: Duration::from_secs(5),
            loop_pause: Duration::from_millis(100),
            rebind_delay: Duration::from_secs(1),
        }
    }
}

// ── UpdateListener ───────────────────────────────────────────────────

/// Long-running receive loop for gateway notifications.
pub struct UpdateListener<B: SocketBinder = UdpBinder> {
    binder: B,
    config: ListenerConfig,
}

impl UpdateListener<UdpBinder> {
    /// Listener on a real UDP socket at `config.bind_addr`.
    pub fn udp(config: ListenerConfig) -> Self {
        Self {
            binder: UdpBinder::new(config.bind_addr),
            config,
        }
    }
}

impl<B: SocketBinder> UpdateListener<B> {
    /// Listener with a custom socket source. `config.bind_addr` is ignored.
    pub fn with_binder(binder: B, config: ListenerConfig) -> Self {
        Self { binder, config }
    }

    /// Run until `cancel` fires, calling `deliver` once per decoded update.
    ///
    /// `deliver` runs on the listener task; a slow closure delays every
    /// later datagram.
    pub async fn run<F>(self, cancel: CancellationToken, mut deliver: F)
    where
        F: FnMut(StateUpdate) + Send,
    {
        let mut socket: Option<B::Socket> = None;
        let mut buf = vec![0u8; DATAGRAM_BUFFER_SIZE];

        loop {
            if socket.is_none() {
                let bound = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    bound = self.binder.bind() => bound,
                };
                match bound {
                    Ok(s) => {
                        info!(addr = %self.config.bind_addr, "listening for device updates");
                        socket = Some(s);
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to bind update socket, retrying");
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(self.config.rebind_delay) => {}
                        }
                        continue;
                    }
                }
            }

            let Some(sock) = socket.as_mut() else {
                continue;
            };

            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                r = tokio::time::timeout(self.config.recv_timeout, sock.recv(&mut buf)) => r,
            };

            match received {
                // Idle: nothing arrived within the window.
                Err(_elapsed) => {}
                Ok(Ok(len)) => {
                    let datagram = buf.get(..len).unwrap_or_default();
                    match decode_update(datagram) {
                        Ok(updates) => {
                            debug!(count = updates.len(), "device update");
                            for update in updates {
                                deliver(update);
                            }
                        }
                        Err(e) => log_dropped(&e),
                    }
                }
                Ok(Err(e)) => {
                    let err = Error::TransportBroken(e);
                    warn!(error = %err, "socket error detected, rebinding");
                    // Dropping the socket closes it before the new bind.
                    socket = None;
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.loop_pause) => {}
            }
        }

        drop(socket);
        info!("update listener stopped, socket closed");
    }
}

fn log_dropped(err: &Error) {
    if let Error::MalformedPayload { reason, body } = err {
        debug!(reason = %reason, body = %body, "dropping malformed update");
    } else {
        warn!(error = %err, "failed to process update");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Socket that replays a script, then goes idle forever.
    struct ScriptedSocket {
        script: VecDeque<io::Result<Vec<u8>>>,
    }

    impl DatagramSocket for ScriptedSocket {
        async fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> io::Result<usize> {
            match self.script.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }

    /// Hands out one scripted socket per bind and counts binds.
    struct ScriptedBinder {
        sockets: Mutex<VecDeque<ScriptedSocket>>,
        binds: Arc<AtomicUsize>,
    }

    impl SocketBinder for ScriptedBinder {
        type Socket = ScriptedSocket;

        async fn bind(&self) -> io::Result<ScriptedSocket> {
            self.binds.fetch_add(1, Ordering::SeqCst);
            self.sockets
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no more sockets"))
        }
    }

    fn socket(script: Vec<io::Result<&[u8]>>) -> ScriptedSocket {
        ScriptedSocket {
            script: script.into_iter().map(|r| r.map(<[u8]>::to_vec)).collect(),
        }
    }

    fn fast_config() -> ListenerConfig {
        ListenerConfig {
            recv_timeout: Duration::from_millis(50),
            loop_pause: Duration::from_millis(1),
            rebind_delay: Duration::from_millis(5),
            ..ListenerConfig::default()
        }
    }

    fn collecting(
        sockets: Vec<ScriptedSocket>,
    ) -> (
        UpdateListener<ScriptedBinder>,
        Arc<AtomicUsize>,
        Arc<Mutex<Vec<StateUpdate>>>,
    ) {
        let binds = Arc::new(AtomicUsize::new(0));
        let binder = ScriptedBinder {
            sockets: Mutex::new(sockets.into()),
            binds: Arc::clone(&binds),
        };
        (
            UpdateListener::with_binder(binder, fast_config()),
            binds,
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    async fn wait_for(seen: &Arc<Mutex<Vec<StateUpdate>>>, count: usize) {
        for _ in 0..200 {
            if seen.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} updates");
    }

    const SINGLE: &[u8] = br#"{"addr":"A1","data":{"stype":"single","subid":20,"status":1}}"#;
    const ALL: &[u8] = br#"{"addr":"B2","data":{"stype":"all","status":[1,0]}}"#;

    #[tokio::test]
    async fn socket_error_triggers_rebind_and_delivery_resumes() {
        let broken = socket(vec![Err(io::Error::new(
            io::ErrorKind::NetworkDown,
            "interface went away",
        ))]);
        let healthy = socket(vec![Ok(SINGLE)]);
        let (listener, binds, seen) = collecting(vec![broken, healthy]);

        let cancel = CancellationToken::new();
        let sink = Arc::clone(&seen);
        let task = tokio::spawn(listener.run(cancel.clone(), move |u| {
            sink.lock().unwrap().push(u);
        }));

        wait_for(&seen, 1).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(binds.load(Ordering::SeqCst), 2);
        assert_eq!(seen.lock().unwrap()[0].board, "A1");
    }

    #[tokio::test]
    async fn failed_bind_is_retried() {
        // The only socket breaks on first receive; every later bind fails.
        let broken = socket(vec![Err(io::Error::other("reset"))]);
        let (listener, binds, seen) = collecting(vec![broken]);

        let cancel = CancellationToken::new();
        let sink = Arc::clone(&seen);
        let task = tokio::spawn(listener.run(cancel.clone(), move |u| {
            sink.lock().unwrap().push(u);
        }));

        for _ in 0..200 {
            if binds.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert!(binds.load(Ordering::SeqCst) >= 3, "listener gave up rebinding");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_datagram_does_not_stop_the_loop() {
        let sock = socket(vec![
            Ok(br#"{"addr":"A1","data":{"subid":20,"status":1}}"#),
            Ok(b"garbage"),
            Ok(ALL),
        ]);
        let (listener, binds, seen) = collecting(vec![sock]);

        let cancel = CancellationToken::new();
        let sink = Arc::clone(&seen);
        let task = tokio::spawn(listener.run(cancel.clone(), move |u| {
            sink.lock().unwrap().push(u);
        }));

        wait_for(&seen, 2).await;
        cancel.cancel();
        task.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(binds.load(Ordering::SeqCst), 1);
        assert_eq!(
            seen.iter().map(|u| u.button_id).collect::<Vec<_>>(),
            vec![17, 18]
        );
    }

    #[tokio::test]
    async fn cancellation_while_idle_ends_promptly() {
        let (listener, _binds, _seen) = collecting(vec![socket(vec![])]);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone(), |_| {}));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listener did not stop")
            .unwrap();
    }
}
