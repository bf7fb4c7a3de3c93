//! # Client Registry
//!
//! Per-client state keyed by source IP: the last applied gamepad button mask
//! and the time of the last packet. Clients are identified by IP only, so two
//! phones behind one NAT address share an entry.
//!
//! Only an accepted gamepad packet creates an entry. Other traffic from a
//! known client just refreshes its activity time.
//!
//! All operations go through one mutex, so the receive loop and the reaper
//! never mutate an entry concurrently.
//!
//! ```
//! use std::net::{IpAddr, Ipv4Addr};
//! use pad_bridge::registry::ClientRegistry;
//!
//! let registry = ClientRegistry::new();
//! let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
//!
//! assert_eq!(registry.prev_buttons(ip), 0);
//! registry.set_buttons(ip, 0x5);
//! assert_eq!(registry.prev_buttons(ip), 0x5);
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// State remembered for one remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientState {
    /// Buttons currently held, as last forwarded to the backend
    pub buttons: u32,
    /// When the last packet from this client arrived
    pub last_seen: Instant,
}

impl ClientState {
    fn new(now: Instant) -> Self {
        Self {
            buttons: 0,
            last_seen: now,
        }
    }
}

/// Thread-safe map from client IP to [`ClientState`].
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<IpAddr, ClientState>>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poisoning only means another thread panicked mid-update; the map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, ClientState>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record activity from `ip` now
    ///
    /// # Returns
    ///
    /// `false` if `ip` is not tracked; no entry is created.
    pub fn touch(&self, ip: IpAddr) -> bool {
        self.touch_at(ip, Instant::now())
    }

    /// Refresh `last_seen` of an existing entry
    pub fn touch_at(&self, ip: IpAddr, now: Instant) -> bool {
        match self.lock().get_mut(&ip) {
            Some(state) => {
                state.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Last applied button mask, 0 for unknown clients (all released)
    #[must_use]
    pub fn prev_buttons(&self, ip: IpAddr) -> u32 {
        self.lock().get(&ip).map_or(0, |state| state.buttons)
    }

    /// Store the button mask for `ip` and mark it active, creating the entry if needed
    pub fn set_buttons(&self, ip: IpAddr, mask: u32) {
        self.swap_buttons(ip, mask);
    }

    /// Atomically replace the mask, returning the previous one.
    ///
    /// Lets a caller read-compare-write without another packet from the same
    /// client slipping in between. Creates the entry for a new client and
    /// refreshes `last_seen`.
    pub fn swap_buttons(&self, ip: IpAddr, mask: u32) -> u32 {
        self.swap_buttons_at(ip, mask, Instant::now())
    }

    /// [`swap_buttons`](Self::swap_buttons) with an explicit arrival time
    pub fn swap_buttons_at(&self, ip: IpAddr, mask: u32, now: Instant) -> u32 {
        let mut clients = self.lock();
        let state = clients.entry(ip).or_insert_with(|| ClientState::new(now));
        state.last_seen = now;
        std::mem::replace(&mut state.buttons, mask)
    }

    /// Snapshot of one client's state
    #[must_use]
    pub fn get(&self, ip: IpAddr) -> Option<ClientState> {
        self.lock().get(&ip).copied()
    }

    /// Number of tracked clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove clients idle for at least `max_idle`, measured from now
    pub fn reap(&self, max_idle: Duration) -> Vec<(IpAddr, ClientState)> {
        self.reap_at(Instant::now(), max_idle)
    }

    /// Remove clients whose `last_seen` is `max_idle` or more before `now`.
    ///
    /// Returns the evicted entries so the caller can log them. A later packet
    /// from an evicted IP starts again from an all-released mask.
    pub fn reap_at(&self, now: Instant, max_idle: Duration) -> Vec<(IpAddr, ClientState)> {
        let mut clients = self.lock();
        let expired: Vec<IpAddr> = clients
            .iter()
            .filter(|(_, state)| now.saturating_duration_since(state.last_seen) >= max_idle)
            .map(|(ip, _)| *ip)
            .collect();

        expired
            .into_iter()
            .filter_map(|ip| clients.remove(&ip).map(|state| (ip, state)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    const IDLE: Duration = Duration::from_secs(60);

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_unknown_client_has_no_buttons() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.prev_buttons(ip(1)), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_touch_does_not_create_entry() {
        let registry = ClientRegistry::new();
        assert!(!registry.touch(ip(1)));
        assert!(registry.get(ip(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_touch_refreshes_known_client() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        registry.swap_buttons_at(ip(1), 0x2, start);

        let later = start + Duration::from_secs(5);
        assert!(registry.touch_at(ip(1), later));

        let state = registry.get(ip(1)).unwrap();
        assert_eq!(state.buttons, 0x2);
        assert_eq!(state.last_seen, later);
    }

    #[test]
    fn test_swap_buttons_creates_entry_for_new_client() {
        let registry = ClientRegistry::new();
        let now = Instant::now();
        assert_eq!(registry.swap_buttons_at(ip(1), 0x0, now), 0);

        let state = registry.get(ip(1)).unwrap();
        assert_eq!(state.buttons, 0);
        assert_eq!(state.last_seen, now);
    }

    #[test]
    fn test_touch_keeps_buttons() {
        let registry = ClientRegistry::new();
        registry.set_buttons(ip(1), 0x3);
        registry.touch(ip(1));
        assert_eq!(registry.prev_buttons(ip(1)), 0x3);
    }

    #[test]
    fn test_set_buttons_upserts() {
        let registry = ClientRegistry::new();
        registry.set_buttons(ip(1), 0x1);
        registry.set_buttons(ip(1), 0x6);
        assert_eq!(registry.prev_buttons(ip(1)), 0x6);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_swap_buttons_returns_previous() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.swap_buttons(ip(1), 0x5), 0);
        assert_eq!(registry.swap_buttons(ip(1), 0x1), 0x5);
        assert_eq!(registry.prev_buttons(ip(1)), 0x1);
    }

    #[test]
    fn test_clients_are_independent() {
        let registry = ClientRegistry::new();
        registry.set_buttons(ip(1), 0x1);
        registry.set_buttons(ip(2), 0x2);
        assert_eq!(registry.prev_buttons(ip(1)), 0x1);
        assert_eq!(registry.prev_buttons(ip(2)), 0x2);
    }

    #[test]
    fn test_reap_removes_only_idle_clients() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        registry.swap_buttons_at(ip(1), 0, start);
        registry.swap_buttons_at(ip(2), 0, start + Duration::from_secs(30));

        let evicted = registry.reap_at(start + Duration::from_secs(61), IDLE);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, ip(1));
        assert!(registry.get(ip(1)).is_none());
        assert!(registry.get(ip(2)).is_some());
    }

    #[test]
    fn test_reap_boundary_is_inclusive() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        registry.swap_buttons_at(ip(1), 0x1, start);

        assert!(registry
            .reap_at(start + Duration::from_secs(59), IDLE)
            .is_empty());
        assert_eq!(registry.reap_at(start + IDLE, IDLE).len(), 1);
    }

    #[test]
    fn test_reaped_client_starts_from_zero_mask() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        registry.swap_buttons_at(ip(1), 0xFF, start);

        let evicted = registry.reap_at(start + Duration::from_secs(90), IDLE);
        assert_eq!(evicted[0].1.buttons, 0xFF);
        assert_eq!(registry.prev_buttons(ip(1)), 0);
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_entries() {
        let registry = Arc::new(ClientRegistry::new());
        let handles: Vec<_> = (0..8u8)
            .map(|n| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for mask in 0..100 {
                        registry.touch(ip(n));
                        registry.set_buttons(ip(n), mask);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        for n in 0..8u8 {
            assert_eq!(registry.prev_buttons(ip(n)), 99);
        }
    }
}
