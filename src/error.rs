//! Error types for neural-link.
//!
//! Errors are layered the same way the crate is:
//! - [`FrameError`] - building a frame failed before anything was written
//! - [`TransportError`] - a request/response exchange on the session failed
//! - [`NeuralLinkError`] - everything a [`NeuralUnit`](crate::NeuralUnit) caller can see
//!
//! Framing and integrity failures on the receive path never show up here directly.
//! The decoder recovers from them locally; callers only notice them as a
//! [`TransportError::Timeout`] or [`TransportError::Corrupt`] once the deadline passes.

use thiserror::Error;

use crate::protocol::CommandCode;

/// Errors raised while encoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Payload does not fit the 16-bit length field.
    #[error("Payload of {0} bytes exceeds the 65535 byte frame limit")]
    PayloadTooLarge(usize),
}

/// Errors surfaced by a [`Session`](crate::Session) exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response arrived before the request deadline.
    #[error("Request timed out")]
    Timeout,

    /// The serial channel is closed (explicitly, by EOF, or after a fatal error).
    #[error("Channel closed")]
    ChannelClosed,

    /// The deadline passed and only corrupt frames arrived in the meantime.
    #[error("Response failed integrity check")]
    Corrupt,

    /// The device answered with a command code that does not belong to the request.
    #[error("Unexpected response command 0x{actual:02X} for request {expected:?}")]
    UnexpectedCommand { expected: CommandCode, actual: u8 },

    /// Another request is in flight and the session rejects instead of queueing.
    #[error("Session busy")]
    SessionBusy,

    /// Another session in this process already owns the port.
    #[error("Port already open: {0}")]
    PortInUse(String),

    /// The request could not be framed.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Opening or configuring the serial port failed.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error while writing or reading the channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether retrying the same request could succeed.
    ///
    /// Only deadline failures qualify; a closed or misbehaving channel stays that way.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Corrupt)
    }
}

/// Main error type for all neural-link operations.
#[derive(Debug, Error)]
pub enum NeuralLinkError {
    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Destructive command issued without the explicit confirmation value.
    #[error("Confirmation required for destructive command {0:?}")]
    ConfirmationRequired(CommandCode),

    /// Caller-supplied argument is outside the range the firmware accepts.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Response payload does not match the documented layout.
    #[error("Malformed response to {command:?}: {reason}")]
    MalformedResponse {
        command: CommandCode,
        reason: String,
    },

    /// JSON error (configuration and snapshot files).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error on configuration and snapshot files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FrameError> for NeuralLinkError {
    fn from(err: FrameError) -> Self {
        NeuralLinkError::Transport(TransportError::Frame(err))
    }
}

/// Result type alias using NeuralLinkError.
pub type Result<T> = std::result::Result<T, NeuralLinkError>;
