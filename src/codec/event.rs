//! `ENCODE_EVENT` records.
//!
//! Layout (38 bytes, big-endian):
//!
//! ```text
//! ┌──────────────────────┬──────────────┬──────────┬───────────┐
//! │ kind name (24, NUL)  │ uid hash (8) │ valence  │ timestamp │
//! │                      │              │ u16      │ u32 secs  │
//! └──────────────────────┴──────────────┴──────────┴───────────┘
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{pad_name, uid_hash, UID_HASH_SIZE};
use crate::error::{NeuralLinkError, Result};

const KIND_FIELD_SIZE: usize = 24;

/// Size of an encoded event record.
pub const EVENT_RECORD_SIZE: usize = KIND_FIELD_SIZE + UID_HASH_SIZE + 2 + 4;

/// Event vocabulary understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PetDetected,
    FaceSeen,
    ObjectSeen,
    TouchHead,
    TouchBack,
    TouchChin,
    TouchPaw,
    TailGrab,
    LoudNoise,
    Darkness,
    PickedUp,
    PutDown,
    Fed,
    PlayInitiated,
    Ignored,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::PetDetected,
        EventKind::FaceSeen,
        EventKind::ObjectSeen,
        EventKind::TouchHead,
        EventKind::TouchBack,
        EventKind::TouchChin,
        EventKind::TouchPaw,
        EventKind::TailGrab,
        EventKind::LoudNoise,
        EventKind::Darkness,
        EventKind::PickedUp,
        EventKind::PutDown,
        EventKind::Fed,
        EventKind::PlayInitiated,
        EventKind::Ignored,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PetDetected => "pet_detected",
            EventKind::FaceSeen => "face_seen",
            EventKind::ObjectSeen => "object_seen",
            EventKind::TouchHead => "touch_head",
            EventKind::TouchBack => "touch_back",
            EventKind::TouchChin => "touch_chin",
            EventKind::TouchPaw => "touch_paw",
            EventKind::TailGrab => "tail_grab",
            EventKind::LoudNoise => "loud_noise",
            EventKind::Darkness => "darkness",
            EventKind::PickedUp => "picked_up",
            EventKind::PutDown => "put_down",
            EventKind::Fed => "fed",
            EventKind::PlayInitiated => "play_initiated",
            EventKind::Ignored => "ignored",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = NeuralLinkError;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| NeuralLinkError::InvalidArgument(format!("unknown event: {:?}", s)))
    }
}

/// One observed event to record in the unit's episodic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub kind: EventKind,
    /// Who the event involves; hashed before it leaves the host.
    pub subject: String,
    /// `-1.0` (very negative) to `1.0` (very positive).
    pub valence: f32,
    /// Unix seconds. `None` stamps the event when it is encoded.
    #[serde(default)]
    pub timestamp: Option<u32>,
}

impl EventDescriptor {
    pub fn new(kind: EventKind, subject: impl Into<String>, valence: f32) -> Self {
        Self {
            kind,
            subject: subject.into(),
            valence,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Codec for event records.
pub struct EventCodec;

impl EventCodec {
    /// Encode an event record.
    ///
    /// Fails with `InvalidArgument` if the valence is outside `-1.0..=1.0`.
    pub fn encode(event: &EventDescriptor) -> Result<[u8; EVENT_RECORD_SIZE]> {
        let valence = event.valence;
        if !valence.is_finite() || !(-1.0..=1.0).contains(&valence) {
            return Err(NeuralLinkError::InvalidArgument(format!(
                "valence must be in -1.0..=1.0, got {}",
                valence
            )));
        }

        let scaled = ((f64::from(valence) + 1.0) / 2.0 * f64::from(u16::MAX)) as u16;
        let timestamp = event.timestamp.unwrap_or_else(now_secs);

        let mut record = [0u8; EVENT_RECORD_SIZE];
        let (kind, rest) = record.split_at_mut(KIND_FIELD_SIZE);
        kind.copy_from_slice(&pad_name::<KIND_FIELD_SIZE>(event.kind.as_str()));
        rest[..UID_HASH_SIZE].copy_from_slice(&uid_hash(&event.subject));
        rest[UID_HASH_SIZE..UID_HASH_SIZE + 2].copy_from_slice(&scaled.to_be_bytes());
        rest[UID_HASH_SIZE + 2..].copy_from_slice(&timestamp.to_be_bytes());
        Ok(record)
    }
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let event = EventDescriptor::new(EventKind::Fed, "abc", 1.0).at(0x0102_0304);
        let record = EventCodec::encode(&event).unwrap();

        assert_eq!(record.len(), 38);
        assert_eq!(&record[..3], b"fed");
        assert!(record[3..24].iter().all(|&b| b == 0));
        assert_eq!(&record[24..32], &uid_hash("abc"));
        assert_eq!(&record[32..34], &[0xFF, 0xFF]);
        assert_eq!(&record[34..38], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_valence_scaling() {
        let encode_valence = |v: f32| {
            let record =
                EventCodec::encode(&EventDescriptor::new(EventKind::Ignored, "x", v).at(0))
                    .unwrap();
            u16::from_be_bytes([record[32], record[33]])
        };

        assert_eq!(encode_valence(-1.0), 0);
        assert_eq!(encode_valence(0.0), 32767);
        assert_eq!(encode_valence(1.0), 65535);
    }

    #[test]
    fn test_valence_out_of_range() {
        for v in [1.01, -1.5, f32::NAN, f32::INFINITY] {
            let event = EventDescriptor::new(EventKind::TailGrab, "x", v);
            assert!(matches!(
                EventCodec::encode(&event),
                Err(NeuralLinkError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_missing_timestamp_uses_clock() {
        let before = now_secs();
        let record = EventCodec::encode(&EventDescriptor::new(EventKind::Darkness, "x", 0.0))
            .unwrap();
        let stamped = u32::from_be_bytes([record[34], record[35], record[36], record[37]]);
        assert!(stamped >= before);
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
            assert!(kind.as_str().len() <= KIND_FIELD_SIZE);
        }
        assert!("sneeze".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_descriptor_json() {
        let event: EventDescriptor =
            serde_json::from_str(r#"{"kind":"touch_head","subject":"alice","valence":0.5}"#)
                .unwrap();
        assert_eq!(event.kind, EventKind::TouchHead);
        assert_eq!(event.timestamp, None);
    }
}
