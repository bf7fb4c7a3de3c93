//! # uinput Backend
//!
//! Creates kernel virtual devices through `/dev/uinput` and writes evdev
//! events to them. Works under X11, Wayland and the console alike.
//!
//! ## Devices
//!
//! | Device | Events |
//! |--------|--------|
//! | Pad Bridge Mouse | REL_X, REL_Y, REL_WHEEL, BTN_LEFT/RIGHT/MIDDLE |
//! | Pad Bridge Gamepad | 17 buttons, ABS_X/Y + ABS_RX/RY (sticks), ABS_Z/RZ (triggers) |
//! | Pad Bridge Motion | ABS_RX/RY/RZ angular rate |
//!
//! ## Button Codes
//!
//! | Button | evdev Code |
//! |--------|------------|
//! | A / B / X / Y | BTN_SOUTH / BTN_EAST / BTN_NORTH / BTN_WEST |
//! | L1 / R1 | BTN_TL / BTN_TR |
//! | L2 / R2 (digital) | BTN_TL2 / BTN_TR2 |
//! | SELECT / START / HOME | BTN_SELECT / BTN_START / BTN_MODE |
//! | L3 / R3 | BTN_THUMBL / BTN_THUMBR |
//! | D-Pad | BTN_DPAD_UP / DOWN / LEFT / RIGHT |

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
    UinputAbsSetup,
};
use tracing::debug;

use super::{BackendError, BackendResult, InputBackend};
use crate::dispatch::transform::STICK_LIMIT;
use crate::protocol::packet::{GamepadButton, MouseButton, GYRO_FULL_SCALE};

/// uinput device node
pub const UINPUT_PATH: &str = "/dev/uinput";

/// Stick axis range, matching what the dispatcher produces
const STICK_MIN: i32 = -STICK_LIMIT;
const STICK_MAX: i32 = STICK_LIMIT;

/// Trigger axis range
const TRIGGER_MIN: i32 = 0;
const TRIGGER_MAX: i32 = 255;

/// evdev key for each gamepad button
#[must_use]
pub fn button_key(button: GamepadButton) -> Key {
    match button {
        GamepadButton::A => Key::BTN_SOUTH,
        GamepadButton::B => Key::BTN_EAST,
        GamepadButton::X => Key::BTN_NORTH,
        GamepadButton::Y => Key::BTN_WEST,
        GamepadButton::L1 => Key::BTN_TL,
        GamepadButton::R1 => Key::BTN_TR,
        GamepadButton::L2 => Key::BTN_TL2,
        GamepadButton::R2 => Key::BTN_TR2,
        GamepadButton::Select => Key::BTN_SELECT,
        GamepadButton::Start => Key::BTN_START,
        GamepadButton::Home => Key::BTN_MODE,
        GamepadButton::L3 => Key::BTN_THUMBL,
        GamepadButton::R3 => Key::BTN_THUMBR,
        GamepadButton::DpadUp => Key::BTN_DPAD_UP,
        GamepadButton::DpadDown => Key::BTN_DPAD_DOWN,
        GamepadButton::DpadLeft => Key::BTN_DPAD_LEFT,
        GamepadButton::DpadRight => Key::BTN_DPAD_RIGHT,
    }
}

/// evdev key for a mouse button
#[must_use]
pub fn mouse_key(button: MouseButton) -> Key {
    match button {
        MouseButton::Left => Key::BTN_LEFT,
        MouseButton::Right => Key::BTN_RIGHT,
        MouseButton::Middle => Key::BTN_MIDDLE,
    }
}

/// Key events for every button whose state differs between `prev` and `mask`.
#[must_use]
pub fn button_transitions(mask: u32, prev: u32) -> Vec<InputEvent> {
    let changed = mask ^ prev;
    GamepadButton::ALL
        .iter()
        .filter(|button| changed & button.mask() != 0)
        .map(|&button| {
            let pressed = mask & button.mask() != 0;
            key_event(button_key(button), pressed)
        })
        .collect()
}

fn key_event(key: Key, pressed: bool) -> InputEvent {
    InputEvent::new(EventType::KEY, key.code(), i32::from(pressed))
}

fn abs_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE, axis.0, value)
}

fn rel_event(axis: RelativeAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::RELATIVE, axis.0, value)
}

/// Virtual mouse, gamepad and motion sensor backed by uinput.
pub struct UinputBackend {
    mouse: Mutex<Option<VirtualDevice>>,
    gamepad: Mutex<Option<VirtualDevice>>,
    motion: Mutex<Option<VirtualDevice>>,
}

impl std::fmt::Debug for UinputBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputBackend").finish_non_exhaustive()
    }
}

impl UinputBackend {
    /// Create the three virtual devices
    ///
    /// # Errors
    ///
    /// Returns error if `/dev/uinput` is missing or a device cannot be
    /// created (usually a permissions problem).
    pub fn open() -> Result<Self, BackendError> {
        if !Path::new(UINPUT_PATH).exists() {
            return Err(BackendError::Unavailable(format!("{} not found", UINPUT_PATH)));
        }

        let mouse = build_mouse()?;
        let gamepad = build_gamepad()?;
        let motion = build_motion()?;
        debug!("Created uinput mouse, gamepad and motion devices");

        Ok(Self {
            mouse: Mutex::new(Some(mouse)),
            gamepad: Mutex::new(Some(gamepad)),
            motion: Mutex::new(Some(motion)),
        })
    }

    fn emit(device: &Mutex<Option<VirtualDevice>>, events: &[InputEvent]) -> BackendResult {
        if events.is_empty() {
            return Ok(());
        }
        let mut guard = lock(device);
        let device = guard.as_mut().ok_or(BackendError::Closed)?;
        // emit() terminates the batch with SYN_REPORT
        device.emit(events)?;
        Ok(())
    }
}

fn lock(device: &Mutex<Option<VirtualDevice>>) -> MutexGuard<'_, Option<VirtualDevice>> {
    device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_mouse() -> std::io::Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for button in [MouseButton::Left, MouseButton::Right, MouseButton::Middle] {
        keys.insert(mouse_key(button));
    }

    let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
    rel_axes.insert(RelativeAxisType::REL_X);
    rel_axes.insert(RelativeAxisType::REL_Y);
    rel_axes.insert(RelativeAxisType::REL_WHEEL);

    VirtualDeviceBuilder::new()?
        .name("Pad Bridge Mouse")
        .with_keys(&keys)?
        .with_relative_axes(&rel_axes)?
        .build()
}

fn build_gamepad() -> std::io::Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for button in GamepadButton::ALL {
        keys.insert(button_key(button));
    }

    let mut builder = VirtualDeviceBuilder::new()?
        .name("Pad Bridge Gamepad")
        .with_keys(&keys)?;

    let sticks = [
        AbsoluteAxisType::ABS_X,
        AbsoluteAxisType::ABS_Y,
        AbsoluteAxisType::ABS_RX,
        AbsoluteAxisType::ABS_RY,
    ];
    for axis in sticks {
        let setup = UinputAbsSetup::new(axis, AbsInfo::new(0, STICK_MIN, STICK_MAX, 0, 0, 0));
        builder = builder.with_absolute_axis(&setup)?;
    }

    for axis in [AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ] {
        let setup = UinputAbsSetup::new(axis, AbsInfo::new(0, TRIGGER_MIN, TRIGGER_MAX, 0, 0, 0));
        builder = builder.with_absolute_axis(&setup)?;
    }

    builder.build()
}

fn build_motion() -> std::io::Result<VirtualDevice> {
    let mut builder = VirtualDeviceBuilder::new()?.name("Pad Bridge Motion");

    for axis in [
        AbsoluteAxisType::ABS_RX,
        AbsoluteAxisType::ABS_RY,
        AbsoluteAxisType::ABS_RZ,
    ] {
        let setup = UinputAbsSetup::new(
            axis,
            AbsInfo::new(0, -GYRO_FULL_SCALE, GYRO_FULL_SCALE, 0, 0, 0),
        );
        builder = builder.with_absolute_axis(&setup)?;
    }

    builder.build()
}

impl InputBackend for UinputBackend {
    fn name(&self) -> &'static str {
        "uinput"
    }

    fn method(&self) -> &'static str {
        "kernel uinput virtual devices"
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> BackendResult {
        Self::emit(
            &self.mouse,
            &[
                rel_event(RelativeAxisType::REL_X, dx),
                rel_event(RelativeAxisType::REL_Y, dy),
            ],
        )
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> BackendResult {
        Self::emit(&self.mouse, &[key_event(mouse_key(button), pressed)])
    }

    fn mouse_scroll(&self, delta: i32) -> BackendResult {
        Self::emit(&self.mouse, &[rel_event(RelativeAxisType::REL_WHEEL, delta)])
    }

    fn gamepad_buttons(&self, mask: u32, prev: u32) -> BackendResult {
        Self::emit(&self.gamepad, &button_transitions(mask, prev))
    }

    fn gamepad_left_stick(&self, x: i32, y: i32) -> BackendResult {
        Self::emit(
            &self.gamepad,
            &[
                abs_event(AbsoluteAxisType::ABS_X, x),
                abs_event(AbsoluteAxisType::ABS_Y, y),
            ],
        )
    }

    fn gamepad_right_stick(&self, x: i32, y: i32) -> BackendResult {
        Self::emit(
            &self.gamepad,
            &[
                abs_event(AbsoluteAxisType::ABS_RX, x),
                abs_event(AbsoluteAxisType::ABS_RY, y),
            ],
        )
    }

    fn gamepad_triggers(&self, left: i32, right: i32) -> BackendResult {
        Self::emit(
            &self.gamepad,
            &[
                abs_event(AbsoluteAxisType::ABS_Z, left),
                abs_event(AbsoluteAxisType::ABS_RZ, right),
            ],
        )
    }

    fn gamepad_gyro(&self, x: i32, y: i32, z: i32) -> BackendResult {
        Self::emit(
            &self.motion,
            &[
                abs_event(AbsoluteAxisType::ABS_RX, x),
                abs_event(AbsoluteAxisType::ABS_RY, y),
                abs_event(AbsoluteAxisType::ABS_RZ, z),
            ],
        )
    }

    fn close(&self) -> BackendResult {
        // Dropping a VirtualDevice destroys it
        lock(&self.mouse).take();
        lock(&self.gamepad).take();
        lock(&self.motion).take();
        Ok(())
    }
}
