//! # Server Statistics
//!
//! Process-wide counters written by the dispatcher and read once at shutdown.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic packet counters, safe to bump from any task.
#[derive(Debug, Default)]
pub struct ServerStats {
    packets: AtomicU64,
    pings: AtomicU64,
    discoveries: AtomicU64,
    mouse_moves: AtomicU64,
    clicks: AtomicU64,
    scrolls: AtomicU64,
    gamepad_packets: AtomicU64,
    button_changes: AtomicU64,
    gyro_packets: AtomicU64,
    checksum_ok: AtomicU64,
    checksum_failed: AtomicU64,
    malformed: AtomicU64,
    unknown: AtomicU64,
    backend_errors: AtomicU64,
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Packets,
    Pings,
    Discoveries,
    MouseMoves,
    Clicks,
    Scrolls,
    GamepadPackets,
    ButtonChanges,
    GyroPackets,
    ChecksumOk,
    ChecksumFailed,
    Malformed,
    Unknown,
    BackendErrors,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub packets: u64,
    pub pings: u64,
    pub discoveries: u64,
    pub mouse_moves: u64,
    pub clicks: u64,
    pub scrolls: u64,
    pub gamepad_packets: u64,
    pub button_changes: u64,
    pub gyro_packets: u64,
    pub checksum_ok: u64,
    pub checksum_failed: u64,
    pub malformed: u64,
    pub unknown: u64,
    pub backend_errors: u64,
}

impl ServerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Packets => &self.packets,
            Counter::Pings => &self.pings,
            Counter::Discoveries => &self.discoveries,
            Counter::MouseMoves => &self.mouse_moves,
            Counter::Clicks => &self.clicks,
            Counter::Scrolls => &self.scrolls,
            Counter::GamepadPackets => &self.gamepad_packets,
            Counter::ButtonChanges => &self.button_changes,
            Counter::GyroPackets => &self.gyro_packets,
            Counter::ChecksumOk => &self.checksum_ok,
            Counter::ChecksumFailed => &self.checksum_failed,
            Counter::Malformed => &self.malformed,
            Counter::Unknown => &self.unknown,
            Counter::BackendErrors => &self.backend_errors,
        }
    }

    /// Add one to `counter`
    pub fn incr(&self, counter: Counter) {
        self.counter(counter).fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of a single counter
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counter(counter).load(Ordering::Relaxed)
    }

    /// Copy every counter
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets: self.get(Counter::Packets),
            pings: self.get(Counter::Pings),
            discoveries: self.get(Counter::Discoveries),
            mouse_moves: self.get(Counter::MouseMoves),
            clicks: self.get(Counter::Clicks),
            scrolls: self.get(Counter::Scrolls),
            gamepad_packets: self.get(Counter::GamepadPackets),
            button_changes: self.get(Counter::ButtonChanges),
            gyro_packets: self.get(Counter::GyroPackets),
            checksum_ok: self.get(Counter::ChecksumOk),
            checksum_failed: self.get(Counter::ChecksumFailed),
            malformed: self.get(Counter::Malformed),
            unknown: self.get(Counter::Unknown),
            backend_errors: self.get(Counter::BackendErrors),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets={} pings={} discoveries={} mouse_moves={} clicks={} scrolls={} \
             gamepad={} button_changes={} gyro={} checksum_ok={} checksum_failed={} \
             malformed={} unknown={} backend_errors={}",
            self.packets,
            self.pings,
            self.discoveries,
            self.mouse_moves,
            self.clicks,
            self.scrolls,
            self.gamepad_packets,
            self.button_changes,
            self.gyro_packets,
            self.checksum_ok,
            self.checksum_failed,
            self.malformed,
            self.unknown,
            self.backend_errors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_stats_are_zero() {
        assert_eq!(ServerStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_incr_targets_one_counter() {
        let stats = ServerStats::new();
        stats.incr(Counter::ChecksumFailed);
        stats.incr(Counter::ChecksumFailed);
        stats.incr(Counter::Pings);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.checksum_failed, 2);
        assert_eq!(snapshot.pings, 1);
        assert_eq!(snapshot.checksum_ok, 0);
        assert_eq!(snapshot.packets, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(ServerStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.incr(Counter::Packets);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.get(Counter::Packets), 4000);
    }

    #[test]
    fn test_display_summary() {
        let stats = ServerStats::new();
        stats.incr(Counter::Packets);
        stats.incr(Counter::Unknown);
        let summary = stats.snapshot().to_string();
        assert!(summary.starts_with("packets=1 "));
        assert!(summary.contains("unknown=1"));
        assert!(summary.ends_with("backend_errors=0"));
    }
}
