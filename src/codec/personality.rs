//! Personality snapshots.
//!
//! `GET_PERSONALITY` answers with consecutive 18-byte records:
//! `[trait name: 16 bytes, NUL-padded ASCII][value: u16 BE, fraction of 65535]`.
//! Snapshots can be written to and read back from JSON as a backup record of a unit's
//! personality, e.g. before a `RESET_PERSONALITY`. Nothing here writes traits back to a unit.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{read_name, unit_fraction};
use crate::error::{NeuralLinkError, Result};
use crate::protocol::CommandCode;

const NAME_FIELD_SIZE: usize = 16;

/// Size of one trait record.
pub const PERSONALITY_RECORD_SIZE: usize = NAME_FIELD_SIZE + 2;

/// Value a caller must pass to confirm a personality reset.
pub const RESET_CONFIRMATION: &str = "RESET PERSONALITY";

/// Payload the firmware requires before it erases personality state.
pub const RESET_GUARD: [u8; 2] = [0xDE, 0xAD];

/// One personality trait, `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTrait {
    pub name: String,
    pub value: f64,
}

/// Every trait the unit reported, in the order it reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalitySnapshot {
    pub traits: Vec<PersonalityTrait>,
}

impl PersonalitySnapshot {
    /// Value of the named trait.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.traits.iter().find(|t| t.name == name).map(|t| t.value)
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    /// Write the snapshot as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        tracing::info!("Personality snapshot saved to {}", path.display());
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = serde_json::from_slice(&std::fs::read(path)?)?;
        tracing::info!("Personality snapshot loaded from {}", path.display());
        Ok(snapshot)
    }
}

/// Codec for personality records.
pub struct PersonalityCodec;

impl PersonalityCodec {
    /// Parse a `GET_PERSONALITY` response. A trailing partial record is dropped.
    pub fn decode(payload: &[u8]) -> Result<PersonalitySnapshot> {
        let records = payload.chunks_exact(PERSONALITY_RECORD_SIZE);
        if !records.remainder().is_empty() {
            tracing::warn!(
                "GET_PERSONALITY response has {} trailing bytes, ignoring",
                records.remainder().len()
            );
        }

        let traits = records
            .map(|record| {
                let (name, value) = record.split_at(NAME_FIELD_SIZE);
                let name = read_name(name).ok_or_else(|| NeuralLinkError::MalformedResponse {
                    command: CommandCode::GetPersonality,
                    reason: "trait name is not ASCII".to_string(),
                })?;
                let value = unit_fraction(u16::from_be_bytes([value[0], value[1]]));
                Ok(PersonalityTrait {
                    name,
                    value: round4(value),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PersonalitySnapshot { traits })
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pad_name;

    fn record(name: &str, raw: u16) -> Vec<u8> {
        let mut out = pad_name::<NAME_FIELD_SIZE>(name).to_vec();
        out.extend_from_slice(&raw.to_be_bytes());
        out
    }

    #[test]
    fn test_decode_records_in_order() {
        let mut payload = record("bold", 0x8000);
        payload.extend(record("playful", 0xFFFF));
        payload.extend(record("independent", 0));

        let snapshot = PersonalityCodec::decode(&payload).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.traits[0].name, "bold");
        assert_eq!(snapshot.get("bold"), Some(0.5));
        assert_eq!(snapshot.get("playful"), Some(1.0));
        assert_eq!(snapshot.get("independent"), Some(0.0));
        assert_eq!(snapshot.get("vocal"), None);
    }

    #[test]
    fn test_decode_drops_partial_record() {
        let mut payload = record("vocal", 0x4000);
        payload.extend_from_slice(b"cautio");

        let snapshot = PersonalityCodec::decode(&payload).unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_decode_rejects_non_ascii_name() {
        let mut payload = vec![0xFFu8; NAME_FIELD_SIZE];
        payload.extend_from_slice(&[0, 0]);

        assert!(matches!(
            PersonalityCodec::decode(&payload),
            Err(NeuralLinkError::MalformedResponse {
                command: CommandCode::GetPersonality,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_empty() {
        assert!(PersonalityCodec::decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personality.json");
        let snapshot = PersonalitySnapshot {
            traits: vec![
                PersonalityTrait {
                    name: "bold".into(),
                    value: 0.5,
                },
                PersonalityTrait {
                    name: "affectionate".into(),
                    value: 0.6,
                },
            ],
        };

        snapshot.save(&path).unwrap();
        assert_eq!(PersonalitySnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = PersonalitySnapshot::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(NeuralLinkError::Io(_))));
    }
}
