//! Frame integrity check.
//!
//! CRC-8 over `length ++ command ++ payload` (never the start marker).
//! Parameters are pinned to the firmware build: polynomial `0x07`, initial value `0x00`,
//! no reflection, no final XOR (CRC-8/SMBUS). Any drift here silently breaks every exchange.

/// Generator polynomial shared with the firmware.
pub const CRC8_POLY: u8 = 0x07;

/// Initial register value shared with the firmware.
pub const CRC8_INIT: u8 = 0x00;

const TABLE: [u8; 256] = build_table(CRC8_POLY);

const fn build_table(poly: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC-8 state.
///
/// Used by the decoder, which sees the covered bytes one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc8 {
    value: u8,
}

impl Crc8 {
    /// Start a new checksum at the firmware's initial value.
    #[inline]
    pub const fn new() -> Self {
        Self { value: CRC8_INIT }
    }

    /// Fold one byte into the checksum.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.value = TABLE[(self.value ^ byte) as usize];
    }

    /// Fold a slice into the checksum.
    #[inline]
    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    /// Current checksum value.
    #[inline]
    pub fn finish(&self) -> u8 {
        self.value
    }
}

impl Default for Crc8 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the checksum of a byte sequence.
///
/// # Example
///
/// ```
/// use neural_link::protocol::checksum;
///
/// assert_eq!(checksum(b"123456789"), 0xF4);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    let mut crc = Crc8::new();
    crc.update_slice(bytes);
    crc.finish()
}

/// Verify a received checksum against the covered bytes.
#[inline]
pub fn verify(bytes: &[u8], expected: u8) -> bool {
    checksum(bytes) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bitwise reference, no table.
    fn reference(bytes: &[u8]) -> u8 {
        let mut crc = CRC8_INIT;
        for &b in bytes {
            crc ^= b;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ CRC8_POLY
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), 0xF4);
    }

    #[test]
    fn test_empty_input_is_init() {
        assert_eq!(checksum(&[]), CRC8_INIT);
    }

    #[test]
    fn test_table_matches_bitwise_reference() {
        let data: Vec<u8> = (0..=255u8).collect();
        for end in 0..data.len() {
            assert_eq!(checksum(&data[..end]), reference(&data[..end]));
        }
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = [0x00, 0x02, 0x01, 0x05, 0x64];
        let mut crc = Crc8::new();
        for &b in &data {
            crc.update(b);
        }
        assert_eq!(crc.finish(), checksum(&data));
    }

    #[test]
    fn test_single_bit_flips_detected() {
        let data = [0x00, 0x05, 0x20, b'h', b'e', b'l', b'l', b'o'];
        let good = checksum(&data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data;
                flipped[i] ^= 1 << bit;
                assert!(!verify(&flipped, good), "flip at byte {i} bit {bit}");
            }
        }
    }
}
