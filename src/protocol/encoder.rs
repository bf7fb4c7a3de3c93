//! # Packet Encoder
//!
//! Builds client-side packets. The server itself only decodes; the encoder
//! serves the `pad-probe` tool and tests.

use super::checksum::xor_checksum;
use super::packet::*;

/// Encode a gamepad snapshot, appending the XOR checksum
///
/// # Returns
///
/// * `Vec<u8>` - 12-byte packet
///
/// # Examples
///
/// ```
/// use pad_bridge::protocol::encoder::encode_gamepad;
/// use pad_bridge::protocol::packet::GamepadReport;
///
/// let frame = encode_gamepad(&GamepadReport::default());
/// assert_eq!(frame, vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01]);
/// ```
#[must_use]
pub fn encode_gamepad(report: &GamepadReport) -> Vec<u8> {
    let mut frame = Vec::with_capacity(GAMEPAD_LEN);
    frame.push(PACKET_GAMEPAD);
    frame.extend_from_slice(&report.buttons.to_le_bytes());
    frame.push(report.left_x as u8);
    frame.push(report.left_y as u8);
    frame.push(report.right_x as u8);
    frame.push(report.right_y as u8);
    frame.push(report.l2);
    frame.push(report.r2);

    let checksum = xor_checksum(&frame);
    frame.push(checksum);
    frame
}

/// Encode a ping carrying an opaque 8-byte timestamp
#[must_use]
pub fn encode_ping(timestamp: u64) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PING_MIN_LEN);
    frame.push(PACKET_PING);
    frame.extend_from_slice(&timestamp.to_le_bytes());
    frame
}

/// Extract the timestamp from an echoed ping, if the reply is a ping
#[must_use]
pub fn ping_timestamp(frame: &[u8]) -> Option<u64> {
    if frame.len() < PING_MIN_LEN || frame[0] != PACKET_PING {
        return None;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&frame[1..PING_MIN_LEN]);
    Some(u64::from_le_bytes(raw))
}

#[must_use]
pub fn encode_mouse_move(dx: i8, dy: i8) -> Vec<u8> {
    vec![PACKET_MOUSE_MOVE, dx as u8, dy as u8]
}

#[must_use]
pub fn encode_mouse_button(button: u8, pressed: bool) -> Vec<u8> {
    vec![PACKET_MOUSE_BUTTON, button, u8::from(pressed)]
}

#[must_use]
pub fn encode_mouse_wheel(delta: i8) -> Vec<u8> {
    vec![PACKET_MOUSE_WHEEL, delta as u8]
}

/// Encode a gyro sample in the `int16` wire encoding (7 bytes)
#[must_use]
pub fn encode_gyro_scaled(x: i16, y: i16, z: i16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(GYRO_INT16_MIN_LEN);
    frame.push(PACKET_GYRO);
    for axis in [x, y, z] {
        frame.extend_from_slice(&axis.to_le_bytes());
    }
    frame
}

/// Encode a gyro sample in the `float32` wire encoding (13 bytes, rad/s)
#[must_use]
pub fn encode_gyro_radians(x: f32, y: f32, z: f32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(GYRO_FLOAT32_MIN_LEN);
    frame.push(PACKET_GYRO);
    for axis in [x, y, z] {
        frame.extend_from_slice(&axis.to_le_bytes());
    }
    frame
}
