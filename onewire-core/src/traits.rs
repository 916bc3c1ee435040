use crate::{Address, ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD, OneWireResult};

/// A blocking 1-Wire bus master.
///
/// Implementors provide the reset pulse and the single-bit time slots; the
/// byte-level transfers and device selection are built on top, least
/// significant bit first as the protocol requires. Masters with hardware
/// byte engines can override the byte methods.
pub trait OneWire {
    /// Error type of the underlying bus driver.
    type BusError;

    /// Issues a reset pulse and samples for the presence pulse.
    ///
    /// Returns `true` when at least one device answered.
    fn reset(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit using the standard slot timing.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Issues a read slot and samples the bit a device drives.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes one byte, least significant bit first.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        let mut mask = 0x01u8;
        while mask != 0 {
            self.write_bit(byte & mask != 0)?;
            mask <<= 1;
        }
        Ok(())
    }

    /// Reads one byte, least significant bit first.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0u8;
        let mut mask = 0x01u8;
        while mask != 0 {
            if self.read_bit()? {
                byte |= mask;
            }
            mask <<= 1;
        }
        Ok(byte)
    }

    /// Writes a buffer of bytes back to back.
    fn write_bytes(&mut self, bytes: &[u8]) -> OneWireResult<(), Self::BusError> {
        for byte in bytes {
            self.write_byte(*byte)?;
        }
        Ok(())
    }

    /// Fills a buffer with bytes read from the bus.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        for slot in buffer.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    /// Addresses a single device with the Match ROM command.
    ///
    /// The bus must have been reset immediately before.
    fn select(&mut self, address: &Address) -> OneWireResult<(), Self::BusError> {
        self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
        self.write_bytes(address.as_bytes())
    }

    /// Addresses every device at once with the Skip ROM command.
    fn select_all(&mut self) -> OneWireResult<(), Self::BusError> {
        self.write_byte(ONEWIRE_SKIP_ROM_CMD)
    }
}
