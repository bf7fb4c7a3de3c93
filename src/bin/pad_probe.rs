//! # Pad Probe
//!
//! Diagnostic client for a running Pad Bridge server. Finds the server the
//! way the phone app does (broadcast `DISCOVER_JOYSTICK_SERVER`), then
//! measures round-trip latency with timestamped pings.
//!
//! ```bash
//! pad-probe                          # broadcast discovery, 10 pings
//! pad-probe --server 192.168.1.20 -c 50
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use pad_bridge::protocol::encoder::{encode_ping, ping_timestamp};
use pad_bridge::protocol::packet::{DISCOVERY_REPLY, DISCOVERY_REQUEST};

/// Probe a Pad Bridge server: discovery and ping latency
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address; broadcast discovery when omitted
    #[clap(short, long)]
    server: Option<IpAddr>,

    /// Server UDP port
    #[clap(short, long, default_value = "26760")]
    port: u16,

    /// Number of pings to send
    #[clap(short, long, default_value = "10")]
    count: u32,

    /// Delay between pings in milliseconds
    #[clap(short, long, default_value = "200")]
    interval_ms: u64,

    /// How long to wait for each reply in milliseconds
    #[clap(short, long, default_value = "1000")]
    timeout_ms: u64,
}

/// Microseconds since the Unix epoch
fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_micros() as u64
}

/// Send the discovery request and wait for the server's answer
async fn discover(socket: &UdpSocket, target: SocketAddr, wait: Duration) -> Result<SocketAddr> {
    socket.send_to(DISCOVERY_REQUEST, target).await?;
    let mut buf = [0u8; 64];

    loop {
        let (len, from) = timeout(wait, socket.recv_from(&mut buf))
            .await
            .with_context(|| format!("no discovery reply from {} within {:?}", target, wait))??;
        if &buf[..len] == DISCOVERY_REPLY {
            return Ok(from);
        }
        debug!("Ignoring {} bytes from {}", len, from);
    }
}

/// Send one ping and return its round-trip time
async fn ping(socket: &UdpSocket, server: SocketAddr, wait: Duration) -> Result<Duration> {
    let sent = now_micros();
    socket.send_to(&encode_ping(sent), server).await?;
    let mut buf = [0u8; 64];

    loop {
        let (len, from) = timeout(wait, socket.recv_from(&mut buf))
            .await
            .context("ping timed out")??;
        // Late replies to earlier pings carry older timestamps
        if from == server && ping_timestamp(&buf[..len]) == Some(sent) {
            return Ok(Duration::from_micros(now_micros().saturating_sub(sent)));
        }
        debug!("Ignoring stale or foreign reply from {}", from);
    }
}

#[derive(Debug, Default)]
struct RttSummary {
    samples: Vec<Duration>,
    lost: u32,
}

impl RttSummary {
    fn min(&self) -> Option<Duration> {
        self.samples.iter().min().copied()
    }

    fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    fn mean(&self) -> Option<Duration> {
        let count = u32::try_from(self.samples.len()).ok().filter(|&n| n > 0)?;
        Some(self.samples.iter().sum::<Duration>() / count)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let wait = Duration::from_millis(args.timeout_ms);

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;

    let target = SocketAddr::new(
        args.server.unwrap_or(IpAddr::V4(Ipv4Addr::BROADCAST)),
        args.port,
    );
    println!("Discovering server via {}...", target);
    let server = discover(&socket, target, wait).await?;
    println!("Found server at {}", server);

    let mut summary = RttSummary::default();
    for seq in 1..=args.count {
        match ping(&socket, server, wait).await {
            Ok(rtt) => {
                println!("ping {}: {:.2} ms", seq, rtt.as_secs_f64() * 1000.0);
                summary.samples.push(rtt);
            }
            Err(e) => {
                warn!("ping {} failed: {}", seq, e);
                summary.lost += 1;
            }
        }
        if seq < args.count {
            sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    println!(
        "{} sent, {} received, {} lost",
        args.count,
        summary.samples.len(),
        summary.lost
    );
    match (summary.min(), summary.mean(), summary.max()) {
        (Some(min), Some(mean), Some(max)) => println!(
            "rtt min/avg/max = {:.2}/{:.2}/{:.2} ms",
            min.as_secs_f64() * 1000.0,
            mean.as_secs_f64() * 1000.0,
            max.as_secs_f64() * 1000.0
        ),
        _ => bail!("no ping replies received"),
    }

    Ok(())
}
