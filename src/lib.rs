//! # neural-link
//!
//! Host-side client for the Neural Unit serial protocol.
//!
//! The Neural Unit is the microcontroller holding a companion robot's behavioral state
//! (drives, trust, personality, episodic memory). This crate turns its serial byte stream
//! into typed, verified request/response exchanges.
//!
//! ## Architecture
//!
//! - **Protocol**: `[0xAA][len: u16 BE][command][payload][CRC-8]` frames and a decoder that
//!   resynchronizes after noise
//! - **Session**: one serial channel, one request in flight, bounded by a timeout
//! - **Unit**: typed commands, payload codecs, destructive-command confirmation, retries
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use neural_link::{codec::DriveId, NeuralUnit, Session};
//!
//! #[tokio::main]
//! async fn main() -> neural_link::Result<()> {
//!     let session = Session::open("/dev/ttyUSB0", 115_200, Duration::from_millis(500))?;
//!     let unit = NeuralUnit::new(session);
//!
//!     println!("latency: {:?}", unit.ping().await?);
//!     unit.set_drive(DriveId::CURIOSITY, 80).await?;
//!     for reading in unit.get_drives().await? {
//!         println!("{} = {}", reading.id, reading.value);
//!     }
//!
//!     unit.close().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

mod session;
mod unit;

pub use config::{BusyMode, CorrelationMode, RetryPolicy, SessionConfig};
pub use error::{FrameError, NeuralLinkError, Result, TransportError};
pub use session::{Session, SessionBuilder, SessionState};
pub use unit::NeuralUnit;
