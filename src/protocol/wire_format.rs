//! Wire format encoding and decoding.
//!
//! Every frame on the serial line looks like this:
//! ```text
//! ┌───────┬──────────┬─────────┬──────────────┬──────────┐
//! │ Start │ Length   │ Command │ Payload      │ Checksum │
//! │ 0xAA  │ uint16 BE│ 1 byte  │ Length bytes │ CRC-8    │
//! └───────┴──────────┴─────────┴──────────────┴──────────┘
//! ```
//!
//! The checksum covers length, command and payload, not the start marker.

use std::fmt;

/// Start-of-frame marker.
pub const START_MARKER: u8 = 0xAA;

/// Header size in bytes: start marker, two length bytes, command.
pub const HEADER_SIZE: usize = 4;

/// Trailer size in bytes (checksum).
pub const TRAILER_SIZE: usize = 1;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Response code the firmware answers PING with.
///
/// Not documented alongside the request table; pinned here until confirmed against firmware.
pub const PONG_CODE: u8 = 0x31;

/// Request command codes understood by the Neural Unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Mutate a behavioral drive value.
    SetDrive = 0x01,
    /// Read all drive values.
    GetDrives = 0x02,
    /// Submit a sensory/behavioral event.
    EncodeEvent = 0x10,
    /// Read the trust score.
    GetTrust = 0x11,
    /// Read a personality snapshot.
    GetPersonality = 0x20,
    /// Irreversibly erase personality state.
    ResetPersonality = 0x21,
    /// Liveness check, answered with PONG.
    Ping = 0x30,
}

impl CommandCode {
    /// Every request code, in wire order.
    pub const ALL: [CommandCode; 7] = [
        CommandCode::SetDrive,
        CommandCode::GetDrives,
        CommandCode::EncodeEvent,
        CommandCode::GetTrust,
        CommandCode::GetPersonality,
        CommandCode::ResetPersonality,
        CommandCode::Ping,
    ];

    /// Wire value of this request.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Wire value the firmware answers with.
    ///
    /// PING is answered with PONG; everything else echoes its own code.
    #[inline]
    pub fn response_code(self) -> u8 {
        match self {
            CommandCode::Ping => PONG_CODE,
            other => other.code(),
        }
    }

    /// Whether the command erases state that cannot be recovered.
    #[inline]
    pub fn is_destructive(self) -> bool {
        matches!(self, CommandCode::ResetPersonality)
    }

    /// Whether sending the command twice has the same effect as sending it once.
    #[inline]
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            CommandCode::GetDrives
                | CommandCode::GetTrust
                | CommandCode::GetPersonality
                | CommandCode::Ping
        )
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        CommandCode::ALL
            .into_iter()
            .find(|c| c.code() == value)
            .ok_or(value)
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandCode::SetDrive => "SET_DRIVE",
            CommandCode::GetDrives => "GET_DRIVES",
            CommandCode::EncodeEvent => "ENCODE_EVENT",
            CommandCode::GetTrust => "GET_TRUST",
            CommandCode::GetPersonality => "GET_PERSONALITY",
            CommandCode::ResetPersonality => "RESET_PERSONALITY",
            CommandCode::Ping => "PING",
        };
        f.write_str(name)
    }
}

/// Frame header: everything before the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload byte count.
    pub payload_length: u16,
    /// Raw command byte.
    pub command: u8,
}

impl Header {
    /// Create a new header.
    #[inline]
    pub fn new(command: u8, payload_length: u16) -> Self {
        Self {
            payload_length,
            command,
        }
    }

    /// Encode header to bytes, start marker included.
    ///
    /// # Example
    ///
    /// ```
    /// use neural_link::protocol::Header;
    ///
    /// let bytes = Header::new(0x01, 2).encode();
    /// assert_eq!(bytes, [0xAA, 0x00, 0x02, 0x01]);
    /// ```
    #[inline]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.payload_length.to_be_bytes();
        [START_MARKER, len[0], len[1], self.command]
    }

    /// Decode a header from bytes.
    ///
    /// Returns `None` if the buffer is too short or does not start with the marker.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[0] != START_MARKER {
            return None;
        }
        Some(Self {
            payload_length: u16::from_be_bytes([buf[1], buf[2]]),
            command: buf[3],
        })
    }

    /// The checksum-covered part of the header (length and command).
    #[inline]
    pub fn covered_bytes(&self) -> [u8; 3] {
        let len = self.payload_length.to_be_bytes();
        [len[0], len[1], self.command]
    }

    /// Total encoded size of a frame with this header.
    #[inline]
    pub fn frame_size(&self) -> usize {
        HEADER_SIZE + self.payload_length as usize + TRAILER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(CommandCode::GetDrives.code(), 300);
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_big_endian_length() {
        let bytes = Header::new(0x20, 0x0102).encode();
        assert_eq!(bytes, [START_MARKER, 0x01, 0x02, 0x20]);
    }

    #[test]
    fn test_decode_rejects_short_or_unmarked() {
        assert!(Header::decode(&[START_MARKER, 0, 1]).is_none());
        assert!(Header::decode(&[0x55, 0, 1, 0x01]).is_none());
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(Header::new(0x01, 0).frame_size(), 5);
        assert_eq!(Header::new(0x01, 2).frame_size(), 7);
    }

    #[test]
    fn test_command_codes_match_wire_table() {
        assert_eq!(CommandCode::SetDrive.code(), 0x01);
        assert_eq!(CommandCode::GetDrives.code(), 0x02);
        assert_eq!(CommandCode::EncodeEvent.code(), 0x10);
        assert_eq!(CommandCode::GetTrust.code(), 0x11);
        assert_eq!(CommandCode::GetPersonality.code(), 0x20);
        assert_eq!(CommandCode::ResetPersonality.code(), 0x21);
        assert_eq!(CommandCode::Ping.code(), 0x30);
    }

    #[test]
    fn test_try_from_u8() {
        for code in CommandCode::ALL {
            assert_eq!(CommandCode::try_from(code.code()), Ok(code));
        }
        assert_eq!(CommandCode::try_from(0x7F), Err(0x7F));
        assert_eq!(CommandCode::try_from(PONG_CODE), Err(PONG_CODE));
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(CommandCode::Ping.response_code(), PONG_CODE);
        assert_eq!(CommandCode::GetTrust.response_code(), 0x11);
        assert_eq!(CommandCode::SetDrive.response_code(), 0x01);
    }

    #[test]
    fn test_only_reset_is_destructive() {
        let destructive: Vec<_> = CommandCode::ALL
            .into_iter()
            .filter(|c| c.is_destructive())
            .collect();
        assert_eq!(destructive, vec![CommandCode::ResetPersonality]);
    }

    #[test]
    fn test_mutating_commands_not_idempotent() {
        assert!(!CommandCode::SetDrive.is_idempotent());
        assert!(!CommandCode::EncodeEvent.is_idempotent());
        assert!(!CommandCode::ResetPersonality.is_idempotent());
        assert!(CommandCode::Ping.is_idempotent());
        assert!(CommandCode::GetPersonality.is_idempotent());
    }

    #[test]
    fn test_display_uses_wire_names() {
        assert_eq!(CommandCode::ResetPersonality.to_string(), "RESET_PERSONALITY");
    }
}
