//! # Packet Decoder
//!
//! Validates and decodes raw datagrams into [`Packet`]s. Pure functions: no
//! shared state, no I/O.

use thiserror::Error;

use super::checksum::{verify_xor_checksum, xor_checksum};
use super::packet::*;

/// Why a datagram was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Zero-length datagram
    #[error("empty datagram")]
    Empty,

    /// Shorter than the minimum length of its type
    #[error("{kind} packet too short: expected at least {expected} bytes, got {actual}")]
    Truncated {
        kind: PacketKind,
        expected: usize,
        actual: usize,
    },

    /// Gamepad checksum byte does not match the XOR of bytes 0-10
    #[error("checksum mismatch: computed 0x{expected:02X}, received 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Leading byte is not a known packet type
    #[error("unknown packet type 0x{0:02X}")]
    UnknownType(u8),
}

/// Decoder settings that change how packets are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject gamepad packets whose XOR checksum does not match
    pub verify_checksum: bool,
    /// Active gyro wire encoding
    pub gyro_encoding: GyroEncoding,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            gyro_encoding: GyroEncoding::Int16,
        }
    }
}

/// Decode a complete datagram
///
/// A known leading type byte always decides the packet type, so binary
/// payloads that happen to contain `DISCOVER` are decoded as what they are.
/// Only a datagram with an unknown leading byte is checked for the
/// `DISCOVER` marker.
///
/// # Errors
///
/// Returns error if:
/// - The datagram is empty
/// - The type byte is unknown
/// - The datagram is shorter than its type requires
/// - Checksum verification is enabled and a gamepad checksum mismatches
///
/// # Examples
///
/// ```
/// use pad_bridge::protocol::decoder::{decode_packet, DecodeOptions};
/// use pad_bridge::protocol::packet::Packet;
///
/// let packet = decode_packet(&[0x02, 0x05, 0xFB], &DecodeOptions::default()).unwrap();
/// assert_eq!(packet, Packet::MouseMove { dx: 5, dy: -5 });
/// ```
pub fn decode_packet(data: &[u8], options: &DecodeOptions) -> Result<Packet, DecodeError> {
    let Some(&type_byte) = data.first() else {
        return Err(DecodeError::Empty);
    };

    let Some(kind) = PacketKind::from_type_byte(type_byte) else {
        if is_discovery(data) {
            return Ok(Packet::Discovery);
        }
        return Err(DecodeError::UnknownType(type_byte));
    };

    let expected = kind.min_len(options.gyro_encoding);
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            kind,
            expected,
            actual: data.len(),
        });
    }

    match kind {
        PacketKind::Ping => Ok(Packet::Ping),
        PacketKind::Gamepad => decode_gamepad(data, options.verify_checksum).map(Packet::Gamepad),
        PacketKind::MouseMove => Ok(Packet::MouseMove {
            dx: signed_byte(data[1]),
            dy: signed_byte(data[2]),
        }),
        PacketKind::MouseButton => Ok(Packet::MouseButton {
            button: data[1],
            pressed: data[2] == 1,
        }),
        PacketKind::MouseWheel => Ok(Packet::MouseWheel {
            delta: signed_byte(data[1]),
        }),
        PacketKind::Gyro => Ok(Packet::Gyro(decode_gyro(&data[1..], options.gyro_encoding))),
    }
}

/// Whether the datagram contains the discovery marker
#[must_use]
pub fn is_discovery(data: &[u8]) -> bool {
    data.windows(DISCOVERY_MARKER.len())
        .any(|window| window == DISCOVERY_MARKER)
}

/// Reinterpret a raw byte as two's-complement: 0-127 stay, 128-255 become -128..-1
#[inline]
#[must_use]
pub fn signed_byte(byte: u8) -> i8 {
    byte as i8
}

/// Decode a gamepad packet body (caller guarantees `data.len() >= 12`)
fn decode_gamepad(data: &[u8], verify_checksum: bool) -> Result<GamepadReport, DecodeError> {
    if verify_checksum {
        let covered = &data[..GAMEPAD_CHECKSUM_INDEX];
        let actual = data[GAMEPAD_CHECKSUM_INDEX];
        if !verify_xor_checksum(covered, actual) {
            return Err(DecodeError::ChecksumMismatch {
                expected: xor_checksum(covered),
                actual,
            });
        }
    }

    Ok(GamepadReport {
        buttons: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
        left_x: signed_byte(data[5]),
        left_y: signed_byte(data[6]),
        right_x: signed_byte(data[7]),
        right_y: signed_byte(data[8]),
        l2: data[9],
        r2: data[10],
    })
}

/// Decode the three gyro axes (caller guarantees the body is long enough)
fn decode_gyro(body: &[u8], encoding: GyroEncoding) -> GyroReading {
    match encoding {
        GyroEncoding::Int16 => GyroReading::Scaled {
            x: i16::from_le_bytes([body[0], body[1]]),
            y: i16::from_le_bytes([body[2], body[3]]),
            z: i16::from_le_bytes([body[4], body[5]]),
        },
        GyroEncoding::Float32 => GyroReading::Radians {
            x: f32::from_le_bytes([body[0], body[1], body[2], body[3]]),
            y: f32::from_le_bytes([body[4], body[5], body[6], body[7]]),
            z: f32::from_le_bytes([body[8], body[9], body[10], body[11]]),
        },
    }
}
