//! # Protocol Module
//!
//! The phone controller's UDP wire protocol.
//!
//! This module handles:
//! - Packet type constants and the gamepad button table
//! - Decoding and validating datagrams (length, XOR checksum)
//! - Encoding packets for the probe client and tests

pub mod packet;
pub mod encoder;
pub mod decoder;
pub mod checksum;
