//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every key is optional; an empty file yields the defaults below.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 26760
//!
//! [input]
//! mouse_sensitivity = 1.6
//! scroll_sensitivity = 2
//! joystick_deadzone = 10
//! trigger_deadzone = 20
//! gyro_encoding = "int16"
//!
//! [clients]
//! idle_timeout_s = 60
//! reap_interval_s = 30
//!
//! [backend]
//! kind = "auto"
//!
//! [logging]
//! level = "info"
//! file = "pad_bridge.log"
//! ```

use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::backend::BackendKind;
use crate::error::{PadBridgeError, Result};
use crate::protocol::decoder::DecodeOptions;
use crate::protocol::packet::GyroEncoding;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub clients: ClientsConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// UDP listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest datagram read in one call; longer datagrams are truncated
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

/// Input translation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Multiplier applied to mouse deltas
    #[serde(default = "default_mouse_sensitivity")]
    pub mouse_sensitivity: f32,

    /// Wheel multiplier in tenths (2 means 0.2x, never below one notch)
    #[serde(default = "default_scroll_sensitivity")]
    pub scroll_sensitivity: i32,

    /// Stick values with magnitude below this become 0
    #[serde(default = "default_joystick_deadzone")]
    pub joystick_deadzone: i32,

    /// Trigger values below this become 0
    #[serde(default = "default_trigger_deadzone")]
    pub trigger_deadzone: i32,

    /// Also drive the pointer with the left stick
    #[serde(default)]
    pub joystick_as_mouse: bool,

    #[serde(default = "default_verify_checksum")]
    pub verify_checksum: bool,

    #[serde(default)]
    pub gyro_encoding: GyroEncoding,
}

/// Client tracking configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClientsConfig {
    #[serde(default = "default_idle_timeout_s")]
    pub idle_timeout_s: u64,

    #[serde(default = "default_reap_interval_s")]
    pub reap_interval_s: u64,
}

/// Backend selection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Upper bound on one xdotool/ydotool invocation
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append-only log file; empty disables file logging
    #[serde(default = "default_log_file")]
    pub file: String,
}

// Default value functions
fn default_host() -> IpAddr { IpAddr::from([0, 0, 0, 0]) }
fn default_port() -> u16 { 26760 }
fn default_recv_buffer_size() -> usize { 1024 }

fn default_mouse_sensitivity() -> f32 { 1.6 }
fn default_scroll_sensitivity() -> i32 { 2 }
fn default_joystick_deadzone() -> i32 { 10 }
fn default_trigger_deadzone() -> i32 { 20 }
fn default_verify_checksum() -> bool { true }

fn default_idle_timeout_s() -> u64 { 60 }
fn default_reap_interval_s() -> u64 { 30 }

fn default_command_timeout_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> String { "pad_bridge.log".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: default_mouse_sensitivity(),
            scroll_sensitivity: default_scroll_sensitivity(),
            joystick_deadzone: default_joystick_deadzone(),
            trigger_deadzone: default_trigger_deadzone(),
            joystick_as_mouse: false,
            verify_checksum: default_verify_checksum(),
            gyro_encoding: GyroEncoding::default(),
        }
    }
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_s: default_idle_timeout_s(),
            reap_interval_s: default_reap_interval_s(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl ServerConfig {
    /// Address the UDP socket binds to
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl InputConfig {
    /// Decoder settings derived from this section
    #[must_use]
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            verify_checksum: self.verify_checksum,
            gyro_encoding: self.gyro_encoding,
        }
    }
}

impl ClientsConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_s)
    }

    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_s)
    }
}

impl BackendConfig {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl LoggingConfig {
    /// Log file path, `None` when file logging is disabled
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        let file = self.file.trim();
        (!file.is_empty()).then(|| Path::new(file))
    }
}

fn invalid(message: impl Into<String>) -> PadBridgeError {
    PadBridgeError::InvalidConfig(message.into())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pad_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Called by [`Config::load`]; call again after applying command-line
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`PadBridgeError::InvalidConfig`] if any value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.server.recv_buffer_size < crate::protocol::packet::GYRO_FLOAT32_MIN_LEN
            || self.server.recv_buffer_size > 65_535
        {
            return Err(invalid("recv_buffer_size must be between 13 and 65535"));
        }

        let sensitivity = self.input.mouse_sensitivity;
        if !sensitivity.is_finite() || sensitivity <= 0.0 || sensitivity > 20.0 {
            return Err(invalid("mouse_sensitivity must be greater than 0.0 and at most 20.0"));
        }

        if !(1..=100).contains(&self.input.scroll_sensitivity) {
            return Err(invalid("scroll_sensitivity must be between 1 and 100"));
        }

        if !(0..=127).contains(&self.input.joystick_deadzone) {
            return Err(invalid("joystick_deadzone must be between 0 and 127"));
        }

        if !(0..=255).contains(&self.input.trigger_deadzone) {
            return Err(invalid("trigger_deadzone must be between 0 and 255"));
        }

        if self.clients.idle_timeout_s == 0 {
            return Err(invalid("idle_timeout_s must be greater than 0"));
        }

        if self.clients.reap_interval_s == 0 {
            return Err(invalid("reap_interval_s must be greater than 0"));
        }

        if self.backend.command_timeout_ms == 0 || self.backend.command_timeout_ms > 10_000 {
            return Err(invalid("command_timeout_ms must be between 1 and 10000"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 26760);
        assert_eq!(config.server.bind_addr().to_string(), "0.0.0.0:26760");
        assert_eq!(config.backend.kind, BackendKind::Auto);
        assert_eq!(config.input.gyro_encoding, GyroEncoding::Int16);
        assert!(config.input.verify_checksum);
        assert!(!config.input.joystick_as_mouse);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, default_port());
        assert_eq!(config.input.joystick_deadzone, 10);
        assert_eq!(config.clients.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.clients.reap_interval(), Duration::from_secs(30));
        assert_eq!(config.backend.command_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9999

[input]
mouse_sensitivity = 2.5
verify_checksum = false
gyro_encoding = "float32"

[backend]
kind = "dry-run"

[logging]
file = ""
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.server.bind_addr().to_string(), "127.0.0.1:9999");
        assert_eq!(config.input.mouse_sensitivity, 2.5);
        assert_eq!(config.input.gyro_encoding, GyroEncoding::Float32);
        assert_eq!(config.backend.kind, BackendKind::DryRun);
        assert!(config.logging.file_path().is_none());

        let options = config.input.decode_options();
        assert!(!options.verify_checksum);
        assert_eq!(options.gyro_encoding, GyroEncoding::Float32);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/pad_bridge.toml"),
            Err(PadBridgeError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml("[server]\nport = \"not a number\""),
            Err(PadBridgeError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_backend_kind() {
        assert!(Config::from_toml("[backend]\nkind = \"pynput\"").is_err());
    }

    #[test]
    fn test_mouse_sensitivity_zero() {
        let mut config = Config::default();
        config.input.mouse_sensitivity = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mouse_sensitivity_too_high() {
        let mut config = Config::default();
        config.input.mouse_sensitivity = 20.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mouse_sensitivity_nan() {
        let mut config = Config::default();
        config.input.mouse_sensitivity = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scroll_sensitivity_range() {
        let mut config = Config::default();
        config.input.scroll_sensitivity = 0;
        assert!(config.validate().is_err());
        config.input.scroll_sensitivity = 101;
        assert!(config.validate().is_err());
        config.input.scroll_sensitivity = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_joystick_deadzone_range() {
        let mut config = Config::default();
        config.input.joystick_deadzone = -1;
        assert!(config.validate().is_err());
        config.input.joystick_deadzone = 128;
        assert!(config.validate().is_err());
        config.input.joystick_deadzone = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_trigger_deadzone_too_high() {
        let mut config = Config::default();
        config.input.trigger_deadzone = 256;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idle_timeout_zero() {
        let mut config = Config::default();
        config.clients.idle_timeout_s = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reap_interval_zero() {
        let mut config = Config::default();
        config.clients.reap_interval_s = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_command_timeout_range() {
        let mut config = Config::default();
        config.backend.command_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.backend.command_timeout_ms = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recv_buffer_too_small() {
        let mut config = Config::default();
        config.server.recv_buffer_size = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_level() {
        let mut config = Config::default();
        config.logging.level = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_file_path() {
        let config = Config::default();
        assert_eq!(config.logging.file_path(), Some(Path::new("pad_bridge.log")));
    }
}
