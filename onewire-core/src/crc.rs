//! Dallas/Maxim CRC helpers used by the 1-Wire protocol.
//!
//! CRC8 (polynomial 0x8C, bit-reflected) protects ROM addresses and device
//! scratchpads; CRC16 (polynomial 0xA001, bit-reflected) protects longer
//! memory transfers on EEPROM-class devices.

/// Incremental Dallas CRC8 computation.
///
/// With the `crc-table` feature (default) each byte is folded through a
/// 256-entry lookup table; without it the bitwise form is used, trading
/// speed for 256 bytes of flash.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OneWireCrc(u8);

#[cfg(feature = "crc-table")]
const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x01 != 0 { (crc >> 1) ^ 0x8c } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

impl OneWireCrc {
    /// Starts a fresh computation.
    pub const fn new() -> Self {
        Self(0)
    }

    /// The CRC accumulated so far.
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Folds one byte into the CRC.
    #[cfg(feature = "crc-table")]
    pub fn update(&mut self, byte: u8) {
        self.0 = CRC8_TABLE[(self.0 ^ byte) as usize];
    }

    /// Folds one byte into the CRC.
    #[cfg(not(feature = "crc-table"))]
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte;
        for _ in 0..8 {
            crc = if crc & 0x01 != 0 { (crc >> 1) ^ 0x8c } else { crc >> 1 };
        }
        self.0 = crc;
    }

    /// Checks a byte sequence that carries its CRC as the last byte.
    ///
    /// Folding the stored CRC into the running value leaves zero when the
    /// sequence is intact.
    pub fn validate(bytes: &[u8]) -> bool {
        let mut crc = Self::new();
        for byte in bytes {
            crc.update(*byte);
        }
        crc.value() == 0
    }
}

/// Computes the Dallas CRC8 of `bytes`, starting from zero.
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = OneWireCrc::new();
    for byte in bytes {
        crc.update(*byte);
    }
    crc.value()
}

const ODD_PARITY: [u16; 16] = [0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0];

/// Computes the 1-Wire CRC16 over `bytes`, continuing from `seed`.
///
/// Pass 0 as the seed for a fresh transfer, or the running value when a
/// transfer is checked in pieces.
pub fn crc16(bytes: &[u8], seed: u16) -> u16 {
    let mut crc = seed;
    for byte in bytes {
        let mut cdata = (*byte as u16 ^ crc) & 0xff;
        crc >>= 8;
        if (ODD_PARITY[(cdata & 0x0f) as usize] ^ ODD_PARITY[(cdata >> 4) as usize]) != 0 {
            crc ^= 0xc001;
        }
        cdata <<= 6;
        crc ^= cdata;
        cdata <<= 1;
        crc ^= cdata;
    }
    crc
}

/// Checks a transfer against the two inverted CRC16 bytes a device sends,
/// low byte first.
pub fn check_crc16(bytes: &[u8], inverted_crc: &[u8; 2], seed: u16) -> bool {
    let crc = !crc16(bytes, seed);
    crc.to_le_bytes() == *inverted_crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc8_check_value() {
        // CRC-8/MAXIM-DOW check value
        assert_eq!(crc8(b"123456789"), 0xa1);
    }

    #[test]
    fn crc8_of_empty_is_zero() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn validate_accepts_sequence_with_trailing_crc() {
        let mut rom = [0x28, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00];
        rom[7] = crc8(&rom[..7]);
        assert!(OneWireCrc::validate(&rom));
        rom[2] ^= 0x10;
        assert!(!OneWireCrc::validate(&rom));
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = [0x10u8, 0x55, 0x00, 0xff, 0x31];
        let mut crc = OneWireCrc::new();
        for byte in data {
            crc.update(byte);
        }
        assert_eq!(crc.value(), crc8(&data));
    }

    #[test]
    fn crc16_check_value() {
        // CRC-16/ARC check value
        assert_eq!(crc16(b"123456789", 0), 0xbb3d);
    }

    #[test]
    fn crc16_seed_continues_computation() {
        let whole = crc16(b"123456789", 0);
        let first = crc16(b"1234", 0);
        assert_eq!(crc16(b"56789", first), whole);
    }

    #[test]
    fn check_crc16_matches_inverted_bytes() {
        let data = [0x0f, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef];
        let inverted = !crc16(&data, 0);
        assert!(check_crc16(&data, &inverted.to_le_bytes(), 0));
        assert!(!check_crc16(&data, &[0x00, 0x00], 0));
    }
}
