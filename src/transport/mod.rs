//! Transport module - serial port handling.
//!
//! Provides:
//! - [`SerialLink`]: a configured `tokio-serial` stream
//! - [`PortLease`]: process-wide exclusive claim on a device path
//!
//! Sessions accept any `AsyncRead + AsyncWrite` stream, so tests and callers with their
//! own port setup can bypass this module.

mod serial;

pub use serial::{list_ports, PortLease, SerialLink};
