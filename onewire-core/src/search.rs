use crate::{Address, OneWire, OneWireCrc, OneWireError, OneWireResult};

/// Which devices a search pass visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchKind {
    /// Search ROM: visits every device on the bus.
    Normal = 0xf0,
    /// Conditional search: visits only devices in an alarm state.
    Alarmed = 0xec,
}

/// Device discovery on a multidrop bus.
///
/// Implements the Maxim binary-tree ROM search. Each call to
/// [`OneWireSearch::next`] resolves one complete 64-bit address; the
/// discrepancy bookkeeping steers the following call down the next
/// unexplored branch of the address tree until every device has been
/// visited once.
///
/// ```ignore
/// let mut search = OneWireSearch::new(&mut bus, SearchKind::Normal);
/// while let Some(address) = search.next()? {
///     // one device per iteration
/// }
/// ```
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    cmd: u8,
    rom: [u8; 8],
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    last_device: bool,
    family: Option<u8>,
}

impl<'a, T: OneWire> OneWireSearch<'a, T> {
    /// Starts a search over every device on the bus.
    pub fn new(onewire: &'a mut T, kind: SearchKind) -> Self {
        Self {
            onewire,
            cmd: kind as u8,
            rom: [0; 8],
            last_discrepancy: 0,
            last_family_discrepancy: 0,
            last_device: false,
            family: None,
        }
    }

    /// Starts a search restricted to one device family.
    ///
    /// The discrepancy state is seeded so the first pass descends straight
    /// into the family's branch of the address tree. Once a resolved
    /// address carries a different family code the branch is exhausted and
    /// the search ends.
    pub fn with_family(onewire: &'a mut T, kind: SearchKind, family: u8) -> Self {
        let mut rom = [0u8; 8];
        rom[0] = family;
        Self {
            onewire,
            cmd: kind as u8,
            rom,
            last_discrepancy: 64,
            last_family_discrepancy: 0,
            last_device: false,
            family: Some(family),
        }
    }

    /// Rewinds to a fresh pass, keeping the family restriction if one was
    /// set at construction.
    pub fn reset(&mut self) {
        self.rom = [0; 8];
        self.last_discrepancy = 0;
        self.last_family_discrepancy = 0;
        self.last_device = false;
        if let Some(family) = self.family {
            self.rom[0] = family;
            self.last_discrepancy = 64;
        }
    }

    /// The bit position of the last discrepancy within the family code
    /// byte, or 0 when there was none.
    pub fn last_family_discrepancy(&self) -> u8 {
        self.last_family_discrepancy
    }

    /// Runs one search pass and returns the next discovered address.
    ///
    /// Returns `Ok(None)` once every device has been visited, when no
    /// device answers the reset pulse, or when the bus state is
    /// inconsistent mid-pass (a device unplugged during the search). A
    /// resolved address with a bad CRC fails with
    /// [`OneWireError::InvalidCrc`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> OneWireResult<Option<Address>, T::BusError> {
        if self.last_device {
            return Ok(None);
        }
        if !self.onewire.reset()? {
            self.last_device = true;
            return Ok(None);
        }
        self.onewire.write_byte(self.cmd)?;

        let mut last_zero = 0u8;
        for id_bit_number in 1..=64u8 {
            let id_bit = self.onewire.read_bit()?;
            let cmp_id_bit = self.onewire.read_bit()?;
            if id_bit && cmp_id_bit {
                // no device answered this bit position
                self.last_device = true;
                return Ok(None);
            }
            let byte = ((id_bit_number - 1) / 8) as usize;
            let mask = 1u8 << ((id_bit_number - 1) % 8);
            let search_direction = if id_bit != cmp_id_bit {
                // no discrepancy, all remaining devices agree
                id_bit
            } else if id_bit_number < self.last_discrepancy {
                // replay the previous pass up to the last fork
                self.rom[byte] & mask != 0
            } else {
                // take the one branch at the fork, the zero branch beyond it
                id_bit_number == self.last_discrepancy
            };
            if !search_direction {
                last_zero = id_bit_number;
                if last_zero < 9 {
                    self.last_family_discrepancy = last_zero;
                }
            }
            if search_direction {
                self.rom[byte] |= mask;
            } else {
                self.rom[byte] &= !mask;
            }
            self.onewire.write_bit(search_direction)?;
        }

        self.last_discrepancy = last_zero;
        if self.last_discrepancy == 0 {
            self.last_device = true;
        }
        if self.rom[0] == 0 {
            self.last_device = true;
            return Ok(None);
        }
        if !OneWireCrc::validate(&self.rom) {
            return Err(OneWireError::InvalidCrc);
        }
        let address = Address::new(self.rom);
        if let Some(family) = self.family {
            if address.family_code() != family {
                // walked past the family's branch of the tree
                self.last_device = true;
                return Ok(None);
            }
        }
        Ok(Some(address))
    }
}
