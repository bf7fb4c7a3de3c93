//! # Dispatch Module
//!
//! Routes each received datagram to the backend calls it entails.
//!
//! This module handles:
//! - Decoding with the configured checksum and gyro settings
//! - Per-client button diffing through the [`ClientRegistry`]
//! - Deadzones and sensitivity ([`transform`])
//! - Statistics for every outcome, including rejected packets
//!
//! Backend failures are logged and counted here and never reach the
//! receive loop.

pub mod transform;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::backend::{BackendResult, InputBackend};
use crate::config::InputConfig;
use crate::protocol::decoder::{decode_packet, DecodeError, DecodeOptions};
use crate::protocol::packet::{
    GamepadButton, GamepadReport, GyroReading, MouseButton, Packet, DISCOVERY_REPLY,
};
use crate::registry::ClientRegistry;
use crate::stats::{Counter, ServerStats};
use transform::{gyro_to_backend, InputTransform};

/// Stateless per call; cross-packet state lives in the registry and stats.
pub struct Dispatcher {
    backend: Arc<dyn InputBackend>,
    registry: Arc<ClientRegistry>,
    stats: Arc<ServerStats>,
    options: DecodeOptions,
    transform: InputTransform,
    joystick_as_mouse: bool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .field("transform", &self.transform)
            .field("joystick_as_mouse", &self.joystick_as_mouse)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    ///
    /// * `backend` - Where input is injected
    /// * `registry` - Per-client button state, shared with the reaper
    /// * `stats` - Counters, shared with the server loop
    /// * `input` - Sensitivity, deadzone and decoding settings
    #[must_use]
    pub fn new(
        backend: Arc<dyn InputBackend>,
        registry: Arc<ClientRegistry>,
        stats: Arc<ServerStats>,
        input: &InputConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            stats,
            options: input.decode_options(),
            transform: InputTransform::from_config(input),
            joystick_as_mouse: input.joystick_as_mouse,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn InputBackend> {
        &self.backend
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Handle one datagram from `src`
    ///
    /// # Returns
    ///
    /// The reply to send back to `src`, if any: the ping bytes verbatim or
    /// the discovery answer.
    pub fn handle(&self, data: &[u8], src: SocketAddr) -> Option<Vec<u8>> {
        self.stats.incr(Counter::Packets);
        trace!("{} -> {:02X?}", src, data);

        let decoded = decode_packet(data, &self.options);
        // A corrupted gamepad packet must not touch client state
        if !matches!(decoded, Err(DecodeError::ChecksumMismatch { .. })) {
            self.registry.touch(src.ip());
        }

        let packet = match decoded {
            Ok(packet) => packet,
            Err(e) => {
                self.record_rejection(&e, src);
                return None;
            }
        };

        match packet {
            Packet::Ping => {
                self.stats.incr(Counter::Pings);
                debug!("Ping from {}, echoing {} bytes", src, data.len());
                Some(data.to_vec())
            }
            Packet::Discovery => {
                self.stats.incr(Counter::Discoveries);
                info!("Discovery request from {}, replying", src);
                Some(DISCOVERY_REPLY.to_vec())
            }
            Packet::Gamepad(report) => {
                self.handle_gamepad(&report, src);
                None
            }
            Packet::MouseMove { dx, dy } => {
                self.handle_mouse_move(dx, dy);
                None
            }
            Packet::MouseButton { button, pressed } => {
                let button = MouseButton::from(button);
                self.stats.incr(Counter::Clicks);
                info!(
                    "{} mouse {:?} {}",
                    src,
                    button,
                    if pressed { "down" } else { "up" }
                );
                self.call("mouse_button", self.backend.mouse_button(button, pressed));
                None
            }
            Packet::MouseWheel { delta } => {
                let scroll = self.transform.scroll(delta);
                self.stats.incr(Counter::Scrolls);
                debug!("{} scroll {} (raw {})", src, scroll, delta);
                self.call("mouse_scroll", self.backend.mouse_scroll(scroll));
                None
            }
            Packet::Gyro(reading) => {
                self.handle_gyro(reading);
                None
            }
        }
    }

    fn record_rejection(&self, error: &DecodeError, src: SocketAddr) {
        let counter = match error {
            DecodeError::ChecksumMismatch { .. } => Counter::ChecksumFailed,
            DecodeError::UnknownType(_) => Counter::Unknown,
            DecodeError::Empty | DecodeError::Truncated { .. } => Counter::Malformed,
        };
        self.stats.incr(counter);
        debug!("Dropped packet from {}: {}", src, error);
    }

    fn handle_gamepad(&self, report: &GamepadReport, src: SocketAddr) {
        self.stats.incr(Counter::GamepadPackets);
        if self.options.verify_checksum {
            self.stats.incr(Counter::ChecksumOk);
        }

        // Swap under the registry lock so two packets from one client
        // cannot both observe the same previous mask
        let prev = self.registry.swap_buttons(src.ip(), report.buttons);
        if report.buttons != prev {
            self.stats.incr(Counter::ButtonChanges);
            if report.buttons != 0 {
                let names: Vec<&str> = GamepadButton::pressed_in(report.buttons)
                    .map(GamepadButton::name)
                    .collect();
                info!("{} buttons: {}", src, names.join(", "));
            }
            self.call(
                "gamepad_buttons",
                self.backend.gamepad_buttons(report.buttons, prev),
            );
        }

        let lx = self.transform.stick(report.left_x);
        let ly = self.transform.stick(report.left_y);
        let rx = self.transform.stick(report.right_x);
        let ry = self.transform.stick(report.right_y);
        self.call("gamepad_left_stick", self.backend.gamepad_left_stick(lx, ly));
        self.call("gamepad_right_stick", self.backend.gamepad_right_stick(rx, ry));

        let l2 = self.transform.trigger(report.l2);
        let r2 = self.transform.trigger(report.r2);
        self.call("gamepad_triggers", self.backend.gamepad_triggers(l2, r2));

        if self.joystick_as_mouse && (lx != 0 || ly != 0) {
            let dx = self.transform.stick_as_mouse(lx);
            let dy = self.transform.stick_as_mouse(ly);
            self.call("mouse_move", self.backend.mouse_move(dx, dy));
        }
    }

    fn handle_mouse_move(&self, dx: i8, dy: i8) {
        let dx = self.transform.mouse_delta(dx);
        let dy = self.transform.mouse_delta(dy);
        if dx == 0 && dy == 0 {
            return;
        }

        self.stats.incr(Counter::MouseMoves);
        trace!("Mouse move ({}, {})", dx, dy);
        self.call("mouse_move", self.backend.mouse_move(dx, dy));
    }

    fn handle_gyro(&self, reading: GyroReading) {
        self.stats.incr(Counter::GyroPackets);
        let (x, y, z) = gyro_to_backend(reading);
        trace!("Gyro ({}, {}, {})", x, y, z);
        self.call("gamepad_gyro", self.backend.gamepad_gyro(x, y, z));
    }

    fn call(&self, operation: &str, result: BackendResult) {
        if let Err(e) = result {
            self.stats.incr(Counter::BackendErrors);
            debug!("Backend {} {} failed: {}", self.backend.name(), operation, e);
        }
    }
}
