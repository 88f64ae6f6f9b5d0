//! Protocol module - wire format, integrity check, framing.
//!
//! This module implements the serial frame layer:
//! - Command codes and the 4-byte header
//! - CRC-8 integrity check
//! - Frame struct and encoder
//! - Incremental decoder that resynchronizes after noise and corruption

mod checksum;
mod decoder;
mod frame;
mod wire_format;

pub use checksum::{checksum, verify, Crc8, CRC8_INIT, CRC8_POLY};
pub use decoder::{DecoderStats, FrameDecoder, FrameEvent};
pub use frame::{encode, Frame};
pub use wire_format::{
    CommandCode, Header, HEADER_SIZE, MAX_PAYLOAD_SIZE, PONG_CODE, START_MARKER, TRAILER_SIZE,
};
