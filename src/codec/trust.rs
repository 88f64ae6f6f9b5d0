//! Trust payloads and subject hashing.

use sha2::{Digest, Sha256};

use super::unit_fraction;

/// Bytes of SHA-256 kept as a subject's identifier on the wire.
pub const UID_HASH_SIZE: usize = 8;

/// Hash a subject uid the way the firmware keys its trust map.
pub fn uid_hash(uid: &str) -> [u8; UID_HASH_SIZE] {
    let digest = Sha256::digest(uid.as_bytes());
    let mut hash = [0u8; UID_HASH_SIZE];
    hash.copy_from_slice(&digest[..UID_HASH_SIZE]);
    hash
}

/// Codec for `GET_TRUST`.
pub struct TrustCodec;

impl TrustCodec {
    /// Request payload for one subject's trust score.
    pub fn encode_subject(uid: &str) -> [u8; UID_HASH_SIZE] {
        uid_hash(uid)
    }

    /// Parse a trust score in `0.0..=1.0`. Short responses mean "unknown" and read as `0.0`.
    pub fn decode(payload: &[u8]) -> f32 {
        match payload {
            [hi, lo, ..] => unit_fraction(u16::from_be_bytes([*hi, *lo])) as f32,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_hash_is_sha256_prefix() {
        // SHA-256("abc") = ba7816bf8f01cfea...
        assert_eq!(
            uid_hash("abc"),
            [0xBA, 0x78, 0x16, 0xBF, 0x8F, 0x01, 0xCF, 0xEA]
        );
    }

    #[test]
    fn test_decode_scale() {
        assert_eq!(TrustCodec::decode(&[0x00, 0x00]), 0.0);
        assert_eq!(TrustCodec::decode(&[0xFF, 0xFF]), 1.0);
        let half = TrustCodec::decode(&[0x80, 0x00]);
        assert!((half - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_decode_short_is_zero() {
        assert_eq!(TrustCodec::decode(&[]), 0.0);
        assert_eq!(TrustCodec::decode(&[0xFF]), 0.0);
    }

    #[test]
    fn test_decode_ignores_extra_bytes() {
        assert_eq!(TrustCodec::decode(&[0xFF, 0xFF, 0x12]), 1.0);
    }
}
