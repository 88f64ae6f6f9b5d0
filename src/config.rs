//! Session configuration.
//!
//! Everything has a default except the request timeout: the firmware documents none,
//! so callers must pick one. Configs can be built in code or loaded from JSON:
//!
//! ```
//! use neural_link::SessionConfig;
//!
//! let config = SessionConfig::from_json_str(
//!     r#"{ "port": "/dev/ttyUSB0", "request_timeout_ms": 500 }"#,
//! ).unwrap();
//! assert_eq!(config.baud_rate, 115_200);
//! assert_eq!(config.request_timeout().as_millis(), 500);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::MAX_PAYLOAD_SIZE;

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read buffer size for the reader task.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default capacity of the reader-to-session event queue.
pub const DEFAULT_INBOUND_CAPACITY: usize = 64;

/// What a request does when another one is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyMode {
    /// Wait in FIFO order for the channel.
    #[default]
    Queue,
    /// Fail immediately with `SessionBusy`.
    Reject,
}

/// How response frames are matched to the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Match by response code; skip other commands' responses and accept an unknown code
    /// as the response. PING still requires PONG.
    #[default]
    Lenient,
    /// Any code mismatch is a protocol violation and closes the session.
    Strict,
}

/// Retry policy applied by [`NeuralUnit`](crate::NeuralUnit) to idempotent commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub attempts: u32,
    /// Pause between attempts, in milliseconds.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// No retries.
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Retry up to `attempts` total tries with a fixed pause.
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    /// Pause between attempts.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial device path. Only needed when the session opens the port itself.
    #[serde(default)]
    pub port: Option<String>,
    /// Serial baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Per-request deadline, in milliseconds. Required.
    pub request_timeout_ms: u64,
    /// Behavior when a request is already in flight.
    #[serde(default)]
    pub busy_mode: BusyMode,
    /// Response matching policy.
    #[serde(default)]
    pub correlation: CorrelationMode,
    /// Largest payload length accepted from an incoming header.
    #[serde(default = "default_max_payload")]
    pub max_payload: u16,
    /// Size of the reader task's read buffer.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Retry policy for idempotent commands.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_max_payload() -> u16 {
    MAX_PAYLOAD_SIZE as u16
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl SessionConfig {
    /// Create a config with the given request timeout and defaults for everything else.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            request_timeout_ms: request_timeout.as_millis() as u64,
            busy_mode: BusyMode::default(),
            correlation: CorrelationMode::default(),
            max_payload: default_max_payload(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// Per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
