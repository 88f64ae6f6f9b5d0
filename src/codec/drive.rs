//! Drive payloads.
//!
//! `SET_DRIVE` carries `[drive id][value]`; `GET_DRIVES` answers with consecutive
//! `(id, value)` pairs in the firmware's own order. Values are percentages, `0..=100`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NeuralLinkError, Result};

/// Largest accepted drive value.
pub const MAX_DRIVE_VALUE: u8 = 100;

/// Identifier of a behavioral drive in the firmware's drive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(pub u8);

impl DriveId {
    pub const CURIOSITY: DriveId = DriveId(1);
    pub const SOCIAL: DriveId = DriveId(2);
    pub const REST: DriveId = DriveId(3);
    pub const HUNGER: DriveId = DriveId(4);
    pub const PLAY: DriveId = DriveId(5);
    pub const SELF_PRESERVE: DriveId = DriveId(6);

    /// Name of a factory drive, `None` for ids the firmware added later.
    pub fn name(self) -> Option<&'static str> {
        match self {
            DriveId::CURIOSITY => Some("curiosity"),
            DriveId::SOCIAL => Some("social"),
            DriveId::REST => Some("rest"),
            DriveId::HUNGER => Some("hunger"),
            DriveId::PLAY => Some("play"),
            DriveId::SELF_PRESERVE => Some("self_preserve"),
            _ => None,
        }
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "drive#{}", self.0),
        }
    }
}

/// Factory drive table.
pub const DEFAULT_DRIVES: [(DriveId, u8); 6] = [
    (DriveId::CURIOSITY, 70),
    (DriveId::SOCIAL, 85),
    (DriveId::REST, 40),
    (DriveId::HUNGER, 50),
    (DriveId::PLAY, 75),
    (DriveId::SELF_PRESERVE, 90),
];

/// One drive value as reported by the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveReading {
    pub id: DriveId,
    pub value: u8,
}

/// Codec for drive payloads.
pub struct DriveCodec;

impl DriveCodec {
    /// Build a `SET_DRIVE` payload.
    pub fn encode_set(id: DriveId, value: u8) -> Result<[u8; 2]> {
        if value > MAX_DRIVE_VALUE {
            return Err(NeuralLinkError::InvalidArgument(format!(
                "drive value must be in 0..={}, got {}",
                MAX_DRIVE_VALUE, value
            )));
        }
        Ok([id.0, value])
    }

    /// Parse a `GET_DRIVES` response. A trailing half pair is dropped.
    pub fn decode_list(payload: &[u8]) -> Vec<DriveReading> {
        let pairs = payload.chunks_exact(2);
        if !pairs.remainder().is_empty() {
            tracing::warn!(
                "GET_DRIVES response has odd length {}, ignoring trailing byte",
                payload.len()
            );
        }
        pairs
            .map(|pair| DriveReading {
                id: DriveId(pair[0]),
                value: pair[1],
            })
            .collect()
    }
}
