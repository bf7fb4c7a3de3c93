//! Backend that only logs, for testing the network side without input devices.

use tracing::{debug, info, trace};

use super::{BackendResult, InputBackend};
use crate::protocol::packet::{GamepadButton, MouseButton};

/// Logs every call and injects nothing.
#[derive(Debug, Default)]
pub struct DryRunBackend;

impl DryRunBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl InputBackend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn method(&self) -> &'static str {
        "log only, no input injected"
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> BackendResult {
        trace!("[dry-run] mouse move dx={} dy={}", dx, dy);
        Ok(())
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> BackendResult {
        debug!("[dry-run] mouse {:?} pressed={}", button, pressed);
        Ok(())
    }

    fn mouse_scroll(&self, delta: i32) -> BackendResult {
        debug!("[dry-run] scroll {}", delta);
        Ok(())
    }

    fn gamepad_buttons(&self, mask: u32, prev: u32) -> BackendResult {
        for button in GamepadButton::pressed_in(mask & !prev) {
            debug!("[dry-run] {} down", button.name());
        }
        for button in GamepadButton::pressed_in(prev & !mask) {
            debug!("[dry-run] {} up", button.name());
        }
        Ok(())
    }

    fn gamepad_left_stick(&self, x: i32, y: i32) -> BackendResult {
        trace!("[dry-run] left stick x={} y={}", x, y);
        Ok(())
    }

    fn gamepad_right_stick(&self, x: i32, y: i32) -> BackendResult {
        trace!("[dry-run] right stick x={} y={}", x, y);
        Ok(())
    }

    fn gamepad_triggers(&self, left: i32, right: i32) -> BackendResult {
        trace!("[dry-run] triggers l2={} r2={}", left, right);
        Ok(())
    }

    fn gamepad_gyro(&self, x: i32, y: i32, z: i32) -> BackendResult {
        trace!("[dry-run] gyro x={} y={} z={}", x, y, z);
        Ok(())
    }

    fn close(&self) -> BackendResult {
        info!("[dry-run] closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_operation_succeeds() {
        let backend = DryRunBackend::new();
        assert_eq!(backend.name(), "dry-run");
        assert!(backend.mouse_move(1, -1).is_ok());
        assert!(backend.mouse_button(MouseButton::Middle, true).is_ok());
        assert!(backend.mouse_scroll(-3).is_ok());
        assert!(backend.gamepad_buttons(0x5, 0x1).is_ok());
        assert!(backend.gamepad_triggers(255, 0).is_ok());
        assert!(backend.close().is_ok());
    }
}
