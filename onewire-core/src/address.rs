use crate::crc::OneWireCrc;

/// A 64-bit 1-Wire ROM address.
///
/// The first byte is the device family code, the next six are the device
/// serial number, and the last is a CRC8 over the first seven. Devices
/// transmit the address least significant byte first, which is the order
/// stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Address(pub [u8; 8]);

impl Address {
    /// Creates an address from its raw ROM bytes.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// The device family code (first ROM byte).
    pub const fn family_code(&self) -> u8 {
        self.0[0]
    }

    /// The six serial number bytes between family code and CRC.
    pub const fn serial(&self) -> [u8; 6] {
        [self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6]]
    }

    /// The raw ROM bytes.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Checks the ROM CRC and rejects the all-zero address.
    pub fn is_valid(&self) -> bool {
        self.0[0] != 0 && OneWireCrc::validate(&self.0)
    }
}

impl From<[u8; 8]> for Address {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // printed as the 64-bit ROM value, family code last
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc8;

    fn with_crc(mut rom: [u8; 8]) -> [u8; 8] {
        rom[7] = crc8(&rom[..7]);
        rom
    }

    #[test]
    fn valid_rom_passes() {
        let addr = Address::new(with_crc([0x28, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0]));
        assert!(addr.is_valid());
        assert_eq!(addr.family_code(), 0x28);
        assert_eq!(addr.serial(), [0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
    }

    #[test]
    fn corrupt_rom_fails() {
        let mut rom = with_crc([0x28, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0]);
        rom[3] ^= 0x01;
        assert!(!Address::new(rom).is_valid());
    }

    #[test]
    fn zero_rom_fails() {
        assert!(!Address::default().is_valid());
    }
}
