//! # Pad Bridge Library
//!
//! Turn a phone into a mouse and gamepad for a Linux desktop.
//!
//! This library receives the phone controller app's UDP packets, validates
//! them, and injects the corresponding input through a virtual device
//! (uinput) or a desktop automation tool (xdotool, ydotool).

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
