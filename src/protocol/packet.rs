//! # Packet Constants and Types
//!
//! Wire definitions for the phone controller protocol. Every datagram is one
//! packet; the first byte selects the type. Multi-byte integers are
//! little-endian.
//!
//! | Type | Name | Min length | Layout |
//! |------|------|------------|--------|
//! | 0x7F | PING | 9 | type + 8-byte opaque timestamp |
//! | 0x01 | GAMEPAD | 12 | type + buttons:u32 + lx ly rx ry:i8 + l2 r2:u8 + xor:u8 |
//! | 0x02 | MOUSE_MOVE | 3 | type + dx:i8 + dy:i8 |
//! | 0x03 | MOUSE_BUTTON | 3 | type + button:u8 + pressed:u8 |
//! | 0x04 | MOUSE_WHEEL | 2 | type + delta:i8 |
//! | 0x0D | GYRO | 7 / 13 | type + 3 × i16 (or 3 × f32 rad/s) |
//! | ASCII | DISCOVERY | - | contains `DISCOVER` |

use std::fmt;

/// Ping packet type (echoed back verbatim)
pub const PACKET_PING: u8 = 0x7F;

/// Gamepad snapshot packet type
pub const PACKET_GAMEPAD: u8 = 0x01;

/// Relative mouse movement packet type
pub const PACKET_MOUSE_MOVE: u8 = 0x02;

/// Mouse button packet type
pub const PACKET_MOUSE_BUTTON: u8 = 0x03;

/// Mouse wheel packet type
pub const PACKET_MOUSE_WHEEL: u8 = 0x04;

/// Gyroscope packet type
pub const PACKET_GYRO: u8 = 0x0D;

pub const PING_MIN_LEN: usize = 9;
pub const GAMEPAD_LEN: usize = 12;
pub const MOUSE_MOVE_MIN_LEN: usize = 3;
pub const MOUSE_BUTTON_MIN_LEN: usize = 3;
pub const MOUSE_WHEEL_MIN_LEN: usize = 2;
pub const GYRO_INT16_MIN_LEN: usize = 7;
pub const GYRO_FLOAT32_MIN_LEN: usize = 13;

/// Index of the XOR checksum byte inside a gamepad packet
pub const GAMEPAD_CHECKSUM_INDEX: usize = 11;

/// Substring that marks a discovery request
pub const DISCOVERY_MARKER: &[u8] = b"DISCOVER";

/// Request payload sent by the phone app
pub const DISCOVERY_REQUEST: &[u8] = b"DISCOVER_JOYSTICK_SERVER";

/// Fixed discovery reply
pub const DISCOVERY_REPLY: &[u8] = b"I_AM_SERVER";

/// Full-scale gyro value on the wire and at the backend
pub const GYRO_FULL_SCALE: i32 = 32767;

/// Angular rate (deg/s) represented by [`GYRO_FULL_SCALE`]
pub const GYRO_RANGE_DPS: f32 = 500.0;

/// Which gyro wire encoding the server accepts.
///
/// Only one encoding is active per server; the two are never sniffed by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GyroEncoding {
    /// Three pre-scaled little-endian i16 values (7-byte packet)
    #[default]
    Int16,
    /// Three little-endian f32 values in radians/second (13-byte packet)
    Float32,
}

impl GyroEncoding {
    /// Minimum packet length for this encoding
    #[must_use]
    pub fn min_len(self) -> usize {
        match self {
            GyroEncoding::Int16 => GYRO_INT16_MIN_LEN,
            GyroEncoding::Float32 => GYRO_FLOAT32_MIN_LEN,
        }
    }
}

/// Binary packet kinds, identified by the leading type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Ping,
    Gamepad,
    MouseMove,
    MouseButton,
    MouseWheel,
    Gyro,
}

impl PacketKind {
    /// Looks up the kind for a type byte
    #[must_use]
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            PACKET_PING => Some(PacketKind::Ping),
            PACKET_GAMEPAD => Some(PacketKind::Gamepad),
            PACKET_MOUSE_MOVE => Some(PacketKind::MouseMove),
            PACKET_MOUSE_BUTTON => Some(PacketKind::MouseButton),
            PACKET_MOUSE_WHEEL => Some(PacketKind::MouseWheel),
            PACKET_GYRO => Some(PacketKind::Gyro),
            _ => None,
        }
    }

    /// Type byte on the wire
    #[must_use]
    pub fn type_byte(self) -> u8 {
        match self {
            PacketKind::Ping => PACKET_PING,
            PacketKind::Gamepad => PACKET_GAMEPAD,
            PacketKind::MouseMove => PACKET_MOUSE_MOVE,
            PacketKind::MouseButton => PACKET_MOUSE_BUTTON,
            PacketKind::MouseWheel => PACKET_MOUSE_WHEEL,
            PacketKind::Gyro => PACKET_GYRO,
        }
    }

    /// Minimum total length (type byte included)
    #[must_use]
    pub fn min_len(self, gyro: GyroEncoding) -> usize {
        match self {
            PacketKind::Ping => PING_MIN_LEN,
            PacketKind::Gamepad => GAMEPAD_LEN,
            PacketKind::MouseMove => MOUSE_MOVE_MIN_LEN,
            PacketKind::MouseButton => MOUSE_BUTTON_MIN_LEN,
            PacketKind::MouseWheel => MOUSE_WHEEL_MIN_LEN,
            PacketKind::Gyro => gyro.min_len(),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Ping => "PING",
            PacketKind::Gamepad => "GAMEPAD",
            PacketKind::MouseMove => "MOUSE_MOVE",
            PacketKind::MouseButton => "MOUSE_BUTTON",
            PacketKind::MouseWheel => "MOUSE_WHEEL",
            PacketKind::Gyro => "GYRO",
        };
        f.write_str(name)
    }
}

/// Gamepad buttons in bit order of the `buttons` mask.
///
/// Bit positions are fixed for the protocol version: bit 0 is A, bit 16 is
/// D-pad right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    L2,
    R2,
    Select,
    Start,
    Home,
    L3,
    R3,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl GamepadButton {
    /// All buttons, indexed by bit position
    pub const ALL: [GamepadButton; 17] = [
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
        GamepadButton::L1,
        GamepadButton::R1,
        GamepadButton::L2,
        GamepadButton::R2,
        GamepadButton::Select,
        GamepadButton::Start,
        GamepadButton::Home,
        GamepadButton::L3,
        GamepadButton::R3,
        GamepadButton::DpadUp,
        GamepadButton::DpadDown,
        GamepadButton::DpadLeft,
        GamepadButton::DpadRight,
    ];

    /// Bit mask of this button inside the `buttons` field
    #[must_use]
    pub fn mask(self) -> u32 {
        1 << (self as u32)
    }

    /// Short label used in logs
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            GamepadButton::A => "A",
            GamepadButton::B => "B",
            GamepadButton::X => "X",
            GamepadButton::Y => "Y",
            GamepadButton::L1 => "L1",
            GamepadButton::R1 => "R1",
            GamepadButton::L2 => "L2",
            GamepadButton::R2 => "R2",
            GamepadButton::Select => "SELECT",
            GamepadButton::Start => "START",
            GamepadButton::Home => "HOME",
            GamepadButton::L3 => "L3",
            GamepadButton::R3 => "R3",
            GamepadButton::DpadUp => "DPAD_UP",
            GamepadButton::DpadDown => "DPAD_DOWN",
            GamepadButton::DpadLeft => "DPAD_LEFT",
            GamepadButton::DpadRight => "DPAD_RIGHT",
        }
    }

    /// Buttons held in `mask`, in table order. Unknown high bits are ignored.
    pub fn pressed_in(mask: u32) -> impl Iterator<Item = GamepadButton> {
        Self::ALL.into_iter().filter(move |b| mask & b.mask() != 0)
    }
}

/// Mouse button as understood by backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<u8> for MouseButton {
    /// 0/1/2 map to left/right/middle; any other code falls back to left.
    fn from(code: u8) -> Self {
        match code {
            1 => MouseButton::Right,
            2 => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Decoded gamepad snapshot. Values are raw, before deadzones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadReport {
    /// Currently held buttons, one bit per [`GamepadButton`]
    pub buttons: u32,
    pub left_x: i8,
    pub left_y: i8,
    pub right_x: i8,
    pub right_y: i8,
    /// L2 analog trigger (0-255)
    pub l2: u8,
    /// R2 analog trigger (0-255)
    pub r2: u8,
}

/// Angular rate sample in the active wire encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GyroReading {
    /// Already scaled so that ±500 deg/s is ±32767
    Scaled { x: i16, y: i16, z: i16 },
    /// Radians per second
    Radians { x: f32, y: f32, z: f32 },
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Latency probe, replied to with the received bytes
    Ping,
    /// Server discovery request
    Discovery,
    Gamepad(GamepadReport),
    MouseMove { dx: i8, dy: i8 },
    /// `button` is the raw wire code; see [`MouseButton::from`]
    MouseButton { button: u8, pressed: bool },
    MouseWheel { delta: i8 },
    Gyro(GyroReading),
}
