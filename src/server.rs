//! # UDP Server
//!
//! Owns the listening socket and drives the receive loop: every datagram is
//! handed to the [`Dispatcher`] in arrival order, and any reply it produces
//! (ping echo, discovery answer) is sent back to the source address.
//!
//! A background task evicts idle clients from the registry. On shutdown, or
//! when the socket fails, the backend is closed and the final statistics are
//! logged and returned.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{PadBridgeError, Result};
use crate::registry::ClientRegistry;
use crate::stats::StatsSnapshot;

/// Create a non-blocking UDP socket with `SO_REUSEADDR` (and `SO_BROADCAST`
/// for IPv4) bound to `addr`.
///
/// # Errors
///
/// Returns [`PadBridgeError::Bind`] if any socket option or the bind fails.
pub fn bind_socket(addr: SocketAddr) -> Result<std::net::UdpSocket> {
    let bind_error = |source: io::Error| PadBridgeError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_error)?;
    socket.set_reuse_address(true).map_err(bind_error)?;
    if addr.is_ipv4() {
        socket.set_broadcast(true).map_err(bind_error)?;
    }
    socket.set_nonblocking(true).map_err(bind_error)?;
    socket.bind(&addr.into()).map_err(bind_error)?;

    Ok(socket.into())
}

/// Errors after which the socket is still usable.
///
/// Linux reports an ICMP port-unreachable for an earlier reply as
/// `ConnectionRefused` on the next receive.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Remove idle clients and log each one
///
/// Time is read from the Tokio clock, so a paused runtime controls eviction.
///
/// # Returns
///
/// Number of clients removed
pub fn reap_idle_clients(registry: &ClientRegistry, idle_timeout: Duration) -> usize {
    let now = tokio::time::Instant::now().into_std();
    let evicted = registry.reap_at(now, idle_timeout);
    for (ip, state) in &evicted {
        info!(
            "Client {} timed out (idle {}s)",
            ip,
            now.saturating_duration_since(state.last_seen).as_secs()
        );
    }
    evicted.len()
}

/// Periodically evict idle clients. Runs until aborted.
async fn reaper_loop(registry: Arc<ClientRegistry>, idle_timeout: Duration, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = reap_idle_clients(&registry, idle_timeout);
        if removed > 0 {
            debug!("{} client(s) remain", registry.len());
        }
    }
}

/// UDP receive loop bound to one socket.
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
    recv_buffer_size: usize,
    idle_timeout: Duration,
    reap_interval: Duration,
}

impl UdpServer {
    /// Bind the socket described by `config.server`
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PadBridgeError::Bind`] if the socket cannot be bound.
    pub async fn bind(config: &Config, dispatcher: Dispatcher) -> Result<Self> {
        let addr = config.server.bind_addr();
        let socket = UdpSocket::from_std(bind_socket(addr)?)
            .map_err(|source| PadBridgeError::Bind { addr, source })?;

        Ok(Self {
            socket,
            dispatcher: Arc::new(dispatcher),
            recv_buffer_size: config.server.recv_buffer_size,
            idle_timeout: config.clients.idle_timeout(),
            reap_interval: config.clients.reap_interval(),
        })
    }

    /// Address the socket is actually bound to (resolves port 0)
    ///
    /// # Errors
    ///
    /// Returns error if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Receive and dispatch until `shutdown` completes or the socket fails
    ///
    /// # Returns
    ///
    /// Final statistics on a requested shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`PadBridgeError::Io`] if receiving fails with a non-transient
    /// error. Statistics are logged before returning either way.
    pub async fn run<F>(self, shutdown: F) -> Result<StatsSnapshot>
    where
        F: Future<Output = ()>,
    {
        let reaper: JoinHandle<()> = tokio::spawn(reaper_loop(
            Arc::clone(self.dispatcher.registry()),
            self.idle_timeout,
            self.reap_interval,
        ));

        if let Ok(addr) = self.socket.local_addr() {
            info!("Listening on UDP {}", addr);
        }

        let mut buf = vec![0u8; self.recv_buffer_size];
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => {
                        if let Some(reply) = self.dispatcher.handle(&buf[..len], src) {
                            if let Err(e) = self.socket.send_to(&reply, src).await {
                                debug!("Failed to reply to {}: {}", src, e);
                            }
                        }
                    }
                    Err(e) if is_transient(&e) => {
                        debug!("Transient receive error: {}", e);
                    }
                    Err(e) => {
                        error!("UDP receive failed: {}", e);
                        break Err(PadBridgeError::Io(e));
                    }
                },
            }
        };

        reaper.abort();

        if let Err(e) = self.dispatcher.backend().close() {
            warn!("Failed to close input backend: {}", e);
        }

        let snapshot = self.dispatcher.stats().snapshot();
        info!("Statistics: {}", snapshot);
        info!("Tracked clients at exit: {}", self.dispatcher.registry().len());

        outcome.map(|()| snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dry_run::DryRunBackend;
    use crate::protocol::encoder::encode_ping;
    use crate::protocol::packet::{DISCOVERY_REPLY, DISCOVERY_REQUEST};
    use crate::stats::ServerStats;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Instant;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn loopback_config() -> Config {
        let mut config = Config::default();
        config.server.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.server.port = 0;
        config
    }

    fn dry_run_dispatcher(config: &Config) -> Dispatcher {
        Dispatcher::new(
            Arc::new(DryRunBackend::new()),
            Arc::new(ClientRegistry::new()),
            Arc::new(ServerStats::new()),
            &config.input,
        )
    }

    #[test]
    fn test_bind_socket_sets_reuse_and_broadcast() {
        let socket = bind_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let socket = Socket::from(socket);
        assert!(socket.reuse_address().unwrap());
        assert!(socket.broadcast().unwrap());
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionRefused)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn test_reap_idle_clients() {
        let registry = ClientRegistry::new();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        registry.swap_buttons_at(ip, 0, Instant::now());

        assert_eq!(reap_idle_clients(&registry, Duration::from_secs(60)), 0);
        assert_eq!(reap_idle_clients(&registry, Duration::ZERO), 1);
        assert!(registry.is_empty());
    }

    /// Give spawned tasks a chance to run on the paused runtime
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_on_interval() {
        let registry = Arc::new(ClientRegistry::new());
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        registry.swap_buttons_at(ip, 0x1, tokio::time::Instant::now().into_std());

        let reaper = tokio::spawn(reaper_loop(
            Arc::clone(&registry),
            Duration::from_secs(60),
            Duration::from_secs(30),
        ));
        settle().await;

        // Tick at 30s: idle 30s
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert!(registry.get(ip).is_some());

        // No tick between 30s and 60s
        tokio::time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert!(registry.get(ip).is_some());

        // Tick at 60s: idle 60s, evicted
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(registry.get(ip).is_none());

        reaper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_removes_client_within_one_interval_of_timeout() {
        let registry = Arc::new(ClientRegistry::new());
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));

        let reaper = tokio::spawn(reaper_loop(
            Arc::clone(&registry),
            Duration::from_secs(60),
            Duration::from_secs(30),
        ));
        settle().await;

        // Last packet 1s after a tick: still present at the 60s tick
        // (idle 59s), gone at the 90s tick (idle 89s)
        tokio::time::advance(Duration::from_secs(1)).await;
        registry.swap_buttons_at(ip, 0x1, tokio::time::Instant::now().into_std());

        for _ in 0..59 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        assert!(registry.get(ip).is_some());

        for _ in 0..30 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        assert!(registry.get(ip).is_none());

        reaper.abort();
    }

    #[tokio::test]
    async fn test_server_replies_and_shuts_down() {
        let config = loopback_config();
        let server = UdpServer::bind(&config, dry_run_dispatcher(&config))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = stop_rx.await;
        }));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 64];

        client.send_to(DISCOVERY_REQUEST, addr).await.unwrap();
        let (len, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], DISCOVERY_REPLY);

        let ping = encode_ping(42);
        client.send_to(&ping, addr).await.unwrap();
        let (len, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], ping.as_slice());

        stop_tx.send(()).unwrap();
        let stats = timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.discoveries, 1);
        assert_eq!(stats.pings, 1);
        assert_eq!(stats.packets, 2);
    }
}
