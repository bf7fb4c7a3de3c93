//! # Input Backend Module
//!
//! The capability interface the dispatcher injects input through, and the
//! concrete backends behind it.
//!
//! This module handles:
//! - The [`InputBackend`] trait (mouse + gamepad operations)
//! - Kernel virtual devices via uinput ([`uinput`])
//! - X11/Wayland command-line tools ([`command`])
//! - A log-only backend for running without devices ([`dry_run`])
//! - Ordered fallback selection with aggregated failure reasons

pub mod command;
pub mod dry_run;
pub mod uinput;

use std::sync::Arc;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{PadBridgeError, Result};
use crate::protocol::packet::MouseButton;

/// Failure of a backend to start or to perform one call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Prerequisite missing (device node, tool, session type)
    #[error("{0}")]
    Unavailable(String),

    /// Device I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External tool failed, timed out or could not be spawned
    #[error("{program}: {reason}")]
    Command { program: &'static str, reason: String },

    /// Backend was already closed
    #[error("backend closed")]
    Closed,
}

/// Result type for backend calls
pub type BackendResult = std::result::Result<(), BackendError>;

/// Input injection capabilities.
///
/// Calls are fire-and-forget and must return quickly. Mouse operations are
/// mandatory; gamepad operations default to no-ops so a mouse-only backend
/// can implement just the first three.
#[cfg_attr(test, mockall::automock)]
pub trait InputBackend: Send + Sync {
    /// Short backend name ("uinput", "xdotool", ...)
    fn name(&self) -> &'static str;

    /// How input is injected, for the startup log
    fn method(&self) -> &'static str;

    /// Relative pointer motion
    fn mouse_move(&self, dx: i32, dy: i32) -> BackendResult;

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> BackendResult;

    /// Vertical wheel; positive scrolls up
    fn mouse_scroll(&self, delta: i32) -> BackendResult;

    /// Apply a new held-button mask. Implementations diff against `prev` and
    /// emit only the buttons that changed.
    fn gamepad_buttons(&self, _mask: u32, _prev: u32) -> BackendResult {
        Ok(())
    }

    /// Left stick, -127..=127 per axis
    fn gamepad_left_stick(&self, _x: i32, _y: i32) -> BackendResult {
        Ok(())
    }

    /// Right stick, -127..=127 per axis
    fn gamepad_right_stick(&self, _x: i32, _y: i32) -> BackendResult {
        Ok(())
    }

    /// Analog triggers, 0..=255
    fn gamepad_triggers(&self, _left: i32, _right: i32) -> BackendResult {
        Ok(())
    }

    /// Angular rate, ±32767 for ±500 deg/s
    fn gamepad_gyro(&self, _x: i32, _y: i32, _z: i32) -> BackendResult {
        Ok(())
    }

    /// Release devices. Further calls may fail with [`BackendError::Closed`].
    fn close(&self) -> BackendResult {
        Ok(())
    }
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Try uinput, then ydotool (Wayland), then xdotool
    #[default]
    Auto,
    Uinput,
    Ydotool,
    Xdotool,
    DryRun,
}

/// Deferred backend construction, tried in order by [`first_available`]
pub type BackendConstructor =
    Box<dyn FnOnce() -> std::result::Result<Box<dyn InputBackend>, BackendError>>;

/// Whether the current desktop session is Wayland
#[must_use]
pub fn session_is_wayland() -> bool {
    std::env::var("XDG_SESSION_TYPE").is_ok_and(|session| session.eq_ignore_ascii_case("wayland"))
}

/// Start the backend selected by `config.kind`
///
/// `Auto` tries, in order: uinput, ydotool (Wayland sessions only), xdotool.
///
/// # Errors
///
/// Returns [`PadBridgeError::NoBackend`] listing every candidate's failure
/// when none could be started.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn InputBackend>> {
    let timeout = config.command_timeout();
    let mut candidates: Vec<(&'static str, BackendConstructor)> = Vec::new();

    let wants = |kind: BackendKind| config.kind == kind || config.kind == BackendKind::Auto;

    if wants(BackendKind::Uinput) {
        candidates.push((
            "uinput",
            Box::new(|| boxed(uinput::UinputBackend::open())),
        ));
    }
    if config.kind == BackendKind::Ydotool
        || (config.kind == BackendKind::Auto && session_is_wayland())
    {
        candidates.push((
            "ydotool",
            Box::new(move || boxed(command::CommandBackend::ydotool(timeout))),
        ));
    }
    if wants(BackendKind::Xdotool) {
        candidates.push((
            "xdotool",
            Box::new(move || boxed(command::CommandBackend::xdotool(timeout))),
        ));
    }
    if config.kind == BackendKind::DryRun {
        candidates.push((
            "dry-run",
            Box::new(|| boxed(Ok(dry_run::DryRunBackend::new()))),
        ));
    }

    first_available(candidates).map(Arc::from)
}

/// Erase a concrete backend type
fn boxed<B: InputBackend + 'static>(
    backend: std::result::Result<B, BackendError>,
) -> std::result::Result<Box<dyn InputBackend>, BackendError> {
    backend.map(|backend| Box::new(backend) as Box<dyn InputBackend>)
}

/// Construct the first candidate that succeeds
///
/// # Errors
///
/// Returns [`PadBridgeError::NoBackend`] with one `name: reason` line per
/// failed candidate.
pub fn first_available(
    candidates: Vec<(&'static str, BackendConstructor)>,
) -> Result<Box<dyn InputBackend>> {
    let mut failures = Vec::new();

    for (name, construct) in candidates {
        debug!("Trying input backend: {}", name);

        match construct() {
            Ok(backend) => {
                info!("Input backend {} started ({})", backend.name(), backend.method());
                return Ok(backend);
            }
            Err(e) => {
                warn!("Input backend {} unavailable: {}", name, e);
                failures.push(format!("  - {}: {}", name, e));
            }
        }
    }

    if failures.is_empty() {
        failures.push("  - no backend candidates".to_string());
    }
    Err(PadBridgeError::NoBackend(failures.join("\n")))
}
