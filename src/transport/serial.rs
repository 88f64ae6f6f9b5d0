//! Serial port transport.
//!
//! Opens the Neural Unit's serial device through `tokio-serial` (8N1, no flow control)
//! and guards it with a process-wide [`PortLease`] so two sessions never share a port.
//!
//! # Example
//!
//! ```ignore
//! use neural_link::transport::SerialLink;
//!
//! let link = SerialLink::open("/dev/ttyUSB0", 115_200)?;
//! let (stream, lease) = link.into_parts();
//! ```

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::TransportError;

fn open_ports() -> &'static Mutex<HashSet<String>> {
    static OPEN_PORTS: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    OPEN_PORTS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on a port path within this process.
///
/// Released on drop.
#[derive(Debug)]
pub struct PortLease {
    path: String,
}

impl PortLease {
    /// Claim `path`, failing with `PortInUse` if another lease holds it.
    pub fn acquire(path: &str) -> Result<Self, TransportError> {
        let mut ports = open_ports()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ports.insert(path.to_string()) {
            return Err(TransportError::PortInUse(path.to_string()));
        }
        Ok(Self {
            path: path.to_string(),
        })
    }

    /// The claimed path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        let mut ports = open_ports()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ports.remove(&self.path);
    }
}

/// An open serial connection to the Neural Unit.
pub struct SerialLink {
    stream: SerialStream,
    lease: PortLease,
}

impl SerialLink {
    /// Open and configure the serial device at `path`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let lease = PortLease::acquire(path)?;

        #[allow(unused_mut)]
        let mut stream = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;

        // Keeps other processes off the port too.
        #[cfg(unix)]
        stream.set_exclusive(true)?;

        tracing::debug!("Opened serial port {} at {} baud", path, baud_rate);

        Ok(Self { stream, lease })
    }

    /// The device path.
    pub fn path(&self) -> &str {
        self.lease.path()
    }

    /// Split into the byte stream and the lease that must outlive it.
    pub fn into_parts(self) -> (SerialStream, PortLease) {
        (self.stream, self.lease)
    }
}

/// List serial device paths present on this machine.
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    Ok(tokio_serial::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}
