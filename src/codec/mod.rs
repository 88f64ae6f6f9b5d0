//! Codec module - payload layouts for each command.
//!
//! The frame layer only moves opaque bytes; these codecs give them meaning:
//!
//! - [`DriveCodec`] - `SET_DRIVE` requests and `GET_DRIVES` responses
//! - [`EventCodec`] - 38-byte `ENCODE_EVENT` records
//! - [`TrustCodec`] - `GET_TRUST` requests and responses
//! - [`PersonalityCodec`] - 18-byte trait records from `GET_PERSONALITY`
//!
//! # Design
//!
//! Codecs are marker structs with static methods. They never touch the session, so every
//! layout can be checked without a device.
//!
//! # Example
//!
//! ```
//! use neural_link::codec::{DriveCodec, DriveId, TrustCodec};
//!
//! let payload = DriveCodec::encode_set(DriveId::HUNGER, 80).unwrap();
//! assert_eq!(payload, [0x04, 80]);
//!
//! assert_eq!(TrustCodec::decode(&[0xFF, 0xFF]), 1.0);
//! ```

mod drive;
mod event;
mod personality;
mod trust;

pub use drive::{DriveCodec, DriveId, DriveReading, DEFAULT_DRIVES, MAX_DRIVE_VALUE};
pub use event::{EventCodec, EventDescriptor, EventKind, EVENT_RECORD_SIZE};
pub use personality::{
    PersonalityCodec, PersonalitySnapshot, PersonalityTrait, PERSONALITY_RECORD_SIZE,
    RESET_CONFIRMATION, RESET_GUARD,
};
pub use trust::{uid_hash, TrustCodec, UID_HASH_SIZE};

/// Copy `name` into a NUL-padded `N`-byte field, truncating if longer.
pub(crate) fn pad_name<const N: usize>(name: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = name.as_bytes();
    let len = bytes.len().min(N);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Read a NUL-padded ASCII field. `None` if it holds non-ASCII bytes.
pub(crate) fn read_name(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let name = &field[..end];
    if !name.is_ascii() {
        return None;
    }
    Some(name.iter().map(|&b| b as char).collect())
}

/// Map a `u16` fraction of full scale onto `0.0..=1.0`.
pub(crate) fn unit_fraction(raw: u16) -> f64 {
    f64::from(raw) / f64::from(u16::MAX)
}
