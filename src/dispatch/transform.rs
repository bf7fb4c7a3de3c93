//! # Input Transforms
//!
//! Deadzones, sensitivity scaling and unit conversion applied between the
//! decoded packet and the backend call.
//!
//! ## Deadzone
//!
//! Stick axes with magnitude below the stick deadzone become 0; anything at
//! or above passes through unscaled, since the wire range (-127..=127)
//! already matches the virtual device. Triggers use a one-sided deadzone.
//!
//! ## Scroll
//!
//! The wheel multiplier is in tenths and uses floor division, so a small
//! negative delta still scrolls down. A nonzero delta always produces at
//! least one notch in the same direction.
//!
//! ## Usage
//!
//! ```
//! use pad_bridge::dispatch::transform::InputTransform;
//!
//! let transform = InputTransform::new(1.6, 2, 10, 20);
//!
//! assert_eq!(transform.stick(5), 0);
//! assert_eq!(transform.stick(-10), -10);
//! assert_eq!(transform.scroll(1), 1);
//! assert_eq!(transform.mouse_delta(-3), -4);
//! ```

use crate::config::InputConfig;
use crate::protocol::packet::{GyroReading, GYRO_FULL_SCALE, GYRO_RANGE_DPS};

/// Largest stick magnitude; the wire's -128 is folded onto -127
pub const STICK_LIMIT: i32 = 127;

/// Sensitivity and deadzone settings for one server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputTransform {
    mouse_sensitivity: f32,
    scroll_sensitivity: i32,
    stick_deadzone: i32,
    trigger_deadzone: i32,
}

impl Default for InputTransform {
    fn default() -> Self {
        Self::from_config(&InputConfig::default())
    }
}

impl InputTransform {
    /// Creates a transform with explicit settings.
    ///
    /// # Arguments
    ///
    /// * `mouse_sensitivity` - Multiplier for mouse deltas
    /// * `scroll_sensitivity` - Wheel multiplier in tenths
    /// * `stick_deadzone` - Minimum stick magnitude that is passed through
    /// * `trigger_deadzone` - Minimum trigger value that is passed through
    #[must_use]
    pub fn new(
        mouse_sensitivity: f32,
        scroll_sensitivity: i32,
        stick_deadzone: i32,
        trigger_deadzone: i32,
    ) -> Self {
        Self {
            mouse_sensitivity,
            scroll_sensitivity,
            stick_deadzone,
            trigger_deadzone,
        }
    }

    #[must_use]
    pub fn from_config(config: &InputConfig) -> Self {
        Self::new(
            config.mouse_sensitivity,
            config.scroll_sensitivity,
            config.joystick_deadzone,
            config.trigger_deadzone,
        )
    }

    /// Stick axis after the deadzone, clamped to -127..=127
    #[must_use]
    pub fn stick(&self, value: i8) -> i32 {
        let value = i32::from(value).clamp(-STICK_LIMIT, STICK_LIMIT);
        if value.abs() < self.stick_deadzone {
            0
        } else {
            value
        }
    }

    /// Trigger value after the deadzone
    #[must_use]
    pub fn trigger(&self, value: u8) -> i32 {
        let value = i32::from(value);
        if value < self.trigger_deadzone {
            0
        } else {
            value
        }
    }

    /// Mouse delta scaled by sensitivity, truncated toward zero
    #[must_use]
    pub fn mouse_delta(&self, delta: i8) -> i32 {
        (f32::from(delta) * self.mouse_sensitivity) as i32
    }

    /// Pointer delta for a stick axis when the stick drives the mouse
    #[must_use]
    pub fn stick_as_mouse(&self, value: i32) -> i32 {
        (value as f32 * self.mouse_sensitivity / 20.0) as i32
    }

    /// Wheel notches for a raw wheel delta
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::dispatch::transform::InputTransform;
    ///
    /// let transform = InputTransform::new(1.0, 2, 10, 20);
    /// assert_eq!(transform.scroll(0), 0);
    /// assert_eq!(transform.scroll(3), 1);  // 6 / 10 rounds to 0, forced to +1
    /// assert_eq!(transform.scroll(-3), -1); // floor(-6 / 10)
    /// assert_eq!(transform.scroll(50), 10);
    /// ```
    #[must_use]
    pub fn scroll(&self, delta: i8) -> i32 {
        let delta = i32::from(delta);
        let scroll = (delta * self.scroll_sensitivity).div_euclid(10);
        if scroll == 0 {
            delta.signum()
        } else {
            scroll
        }
    }
}

/// Convert a gyro sample to backend units (±32767 for ±500 deg/s).
///
/// Pre-scaled samples pass through. Radian samples are converted to degrees,
/// scaled, truncated toward zero and clamped.
#[must_use]
pub fn gyro_to_backend(reading: GyroReading) -> (i32, i32, i32) {
    match reading {
        GyroReading::Scaled { x, y, z } => (i32::from(x), i32::from(y), i32::from(z)),
        GyroReading::Radians { x, y, z } => (
            radians_to_backend(x),
            radians_to_backend(y),
            radians_to_backend(z),
        ),
    }
}

fn radians_to_backend(rate: f32) -> i32 {
    let scale = GYRO_FULL_SCALE as f32 / GYRO_RANGE_DPS;
    // NaN casts to 0
    let scaled = (rate.to_degrees() * scale) as i32;
    scaled.clamp(-GYRO_FULL_SCALE, GYRO_FULL_SCALE)
}
