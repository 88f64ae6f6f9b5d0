//! Frame struct with typed accessors, and the frame encoder.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use neural_link::protocol::{encode, CommandCode, Frame};
//!
//! let bytes = encode(CommandCode::SetDrive.code(), &[0x05, 0x64]).unwrap();
//! assert_eq!(&bytes[..6], &[0xAA, 0x00, 0x02, 0x01, 0x05, 0x64]);
//!
//! let frame = Frame::new(CommandCode::SetDrive.code(), &[0x05, 0x64]).unwrap();
//! assert_eq!(frame.to_bytes(), bytes);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::checksum::Crc8;
use super::wire_format::{CommandCode, Header, MAX_PAYLOAD_SIZE, PONG_CODE};
use crate::error::FrameError;

/// A complete, checksum-verified protocol frame.
///
/// Fields are private so a frame can only exist with a matching length and checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: Header,
    payload: Bytes,
    checksum: u8,
}

impl Frame {
    /// Build a frame, computing length and checksum.
    pub fn new(command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        Self::from_bytes(command, Bytes::copy_from_slice(payload))
    }

    /// Build a frame around an existing `Bytes` payload (no copy).
    pub fn from_bytes(command: u8, payload: Bytes) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }
        let header = Header::new(command, payload.len() as u16);
        let checksum = frame_checksum(&header, &payload);
        Ok(Self {
            header,
            payload,
            checksum,
        })
    }

    /// Assemble a frame the decoder already verified.
    pub(crate) fn verified(header: Header, payload: Bytes, checksum: u8) -> Self {
        Self {
            header,
            payload,
            checksum,
        }
    }

    /// Decoded header.
    #[inline]
    pub fn header(&self) -> Header {
        self.header
    }

    /// Raw command byte.
    #[inline]
    pub fn command(&self) -> u8 {
        self.header.command
    }

    /// Command byte as a known request code, if it is one.
    #[inline]
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::try_from(self.header.command).ok()
    }

    /// Whether this frame is the PING response.
    #[inline]
    pub fn is_pong(&self) -> bool {
        self.header.command == PONG_CODE
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Checksum byte carried by the frame.
    #[inline]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.header.frame_size());
        buf.put_slice(&self.header.encode());
        buf.put_slice(&self.payload);
        buf.put_u8(self.checksum);
        buf.freeze()
    }
}

/// Checksum over `length ++ command ++ payload`.
pub(crate) fn frame_checksum(header: &Header, payload: &[u8]) -> u8 {
    let mut crc = Crc8::new();
    crc.update_slice(&header.covered_bytes());
    crc.update_slice(payload);
    crc.finish()
}

/// Encode a command and payload into wire bytes.
///
/// Fails with [`FrameError::PayloadTooLarge`] if the payload exceeds 65535 bytes.
pub fn encode(command: u8, payload: &[u8]) -> Result<Bytes, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }
    let header = Header::new(command, payload.len() as u16);
    let mut buf = BytesMut::with_capacity(header.frame_size());
    buf.put_slice(&header.encode());
    buf.put_slice(payload);
    buf.put_u8(frame_checksum(&header, payload));
    Ok(buf.freeze())
}
