#![no_std]
#![deny(missing_docs)]
//! # ds18x20
//! Driver for the DS18x20 family of 1-Wire temperature sensors, covering
//! the DS18S20, DS18B20, DS1822, DS1825 (including MAX31850 thermocouple
//! converters) and DS28EA00.
//!
//! The blocking functions ([request_temp_all], [read_temp] and friends)
//! talk to any [OneWire] master passed per call. A conversion is not
//! awaited here: the caller requests it, schedules the conversion time
//! (up to 750 ms at 12-bit resolution) however it likes, and reads the
//! scratchpad afterwards.
//!
//! [AsyncState] offers the same transfers split into single-bus-operation
//! steps for cooperative schedulers that cannot afford a multi-byte
//! transfer per tick.
//!
//! Raw readings are in units of 1/128 °C, which [Temperature] wraps as a
//! fixed-point number.

mod sequencer;

pub use sequencer::AsyncState;

use onewire_core::crc::crc8;
use onewire_core::{Address, OneWire, OneWireError, OneWireSearch, SearchKind};

/// A temperature reading in units of 1/128 °C.
pub type Temperature = fixed::types::I25F7;

/// Family code of the DS18S20 (and legacy DS1820).
pub const FAMILY_DS18S20: u8 = 0x10;
/// Family code of the DS18B20.
pub const FAMILY_DS18B20: u8 = 0x28;
/// Family code of the DS1822.
pub const FAMILY_DS1822: u8 = 0x22;
/// Family code of the DS1825, shared by the MAX31850/MAX31851.
pub const FAMILY_DS1825: u8 = 0x3b;
/// Family code of the DS28EA00.
pub const FAMILY_DS28EA00: u8 = 0x42;

/// Family codes this driver accepts.
pub const SUPPORTED_FAMILIES: [u8; 5] = [
    FAMILY_DS18S20,
    FAMILY_DS18B20,
    FAMILY_DS1822,
    FAMILY_DS1825,
    FAMILY_DS28EA00,
];

/// Scratchpad byte holding the temperature LSB.
pub const SCRATCHPAD_TEMP_LSB: usize = 0;
/// Scratchpad byte holding the temperature MSB.
pub const SCRATCHPAD_TEMP_MSB: usize = 1;
/// High alarm threshold; fault flags on a MAX31850.
pub const SCRATCHPAD_HIGH_ALARM: usize = 2;
/// Low alarm threshold.
pub const SCRATCHPAD_LOW_ALARM: usize = 3;
/// Configuration register.
pub const SCRATCHPAD_CONFIGURATION: usize = 4;
/// Count-remain register of the DS18S20.
pub const SCRATCHPAD_COUNT_REMAIN: usize = 6;
/// Count-per-degree register of the DS18S20.
pub const SCRATCHPAD_COUNT_PER_C: usize = 7;
/// CRC8 over the first eight scratchpad bytes.
pub const SCRATCHPAD_CRC: usize = 8;

/// Line faults a MAX31850 reports in place of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Thermocouple open circuit.
    Open,
    /// Thermocouple shorted to ground.
    ShortToGround,
    /// Thermocouple shorted to the supply.
    ShortToVdd,
    /// No recognizable fault pattern; probe treated as disconnected.
    Disconnected,
}

/// Outcome of a transaction driven through [AsyncState].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No error so far.
    Ok,
    /// No device answered the reset pulse.
    NoDevice,
    /// A bus transfer failed mid-sequence.
    BusError,
    /// The scratchpad failed its CRC check.
    CrcMismatch,
    /// The sensor reported a line fault.
    Fault(Fault),
}

/// Errors returned by the blocking transfer functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempError<E> {
    /// The bus transfer itself failed.
    Bus(OneWireError<E>),
    /// No device answered the reset pulse.
    NoDevice,
    /// The scratchpad failed its CRC check.
    CrcMismatch,
    /// The sensor reported a line fault.
    Fault(Fault),
}

impl<E> From<OneWireError<E>> for TempError<E> {
    fn from(value: OneWireError<E>) -> Self {
        TempError::Bus(value)
    }
}

/// Whether `address` has a correct ROM CRC and a supported family code.
pub fn is_valid_address(address: &Address) -> bool {
    let rom = address.as_bytes();
    crc8(&rom[..7]) == rom[7] && SUPPORTED_FAMILIES.contains(&address.family_code())
}

/// Starts a temperature conversion on every device at once.
///
/// The devices convert on their own afterwards; wait out the conversion
/// time before reading.
pub fn request_temp_all<O: OneWire>(bus: &mut O) -> Result<(), TempError<O::BusError>> {
    if !bus.reset()? {
        return Err(TempError::NoDevice);
    }
    bus.select_all()?;
    bus.write_byte(CONVERT_TEMP_CMD)?;
    Ok(())
}

/// Starts a temperature conversion on one device.
pub fn request_temp<O: OneWire>(
    bus: &mut O,
    address: &Address,
) -> Result<(), TempError<O::BusError>> {
    if !bus.reset()? {
        return Err(TempError::NoDevice);
    }
    bus.select(address)?;
    bus.write_byte(CONVERT_TEMP_CMD)?;
    Ok(())
}

/// Reads and CRC-checks the nine scratchpad bytes of one device.
pub fn read_scratchpad<O: OneWire>(
    bus: &mut O,
    address: &Address,
) -> Result<[u8; 9], TempError<O::BusError>> {
    if !bus.reset()? {
        return Err(TempError::NoDevice);
    }
    bus.select(address)?;
    bus.write_byte(READ_SCRATCHPAD_CMD)?;
    let mut data = [0u8; 9];
    bus.read_bytes(&mut data)?;
    if crc8(&data[..8]) != data[SCRATCHPAD_CRC] {
        return Err(TempError::CrcMismatch);
    }
    Ok(data)
}

/// Reads one device's last conversion result in 1/128 °C units.
pub fn read_temp_raw<O: OneWire>(
    bus: &mut O,
    address: &Address,
) -> Result<i32, TempError<O::BusError>> {
    let scratchpad = read_scratchpad(bus, address)?;
    decode_temperature(address.family_code(), &scratchpad).map_err(TempError::Fault)
}

/// Reads one device's last conversion result as a fixed-point temperature.
pub fn read_temp<O: OneWire>(
    bus: &mut O,
    address: &Address,
) -> Result<Temperature, TempError<O::BusError>> {
    read_temp_raw(bus, address).map(Temperature::from_bits)
}

/// Reads one device's last conversion result in degrees Celsius.
pub fn read_temp_celsius<O: OneWire>(
    bus: &mut O,
    address: &Address,
) -> Result<f32, TempError<O::BusError>> {
    read_temp_raw(bus, address).map(|raw| raw as f32 * (1.0 / 128.0))
}

/// Enumerates the supported sensors on the bus.
///
/// Runs a full ROM search and calls `visit` for every address that passes
/// [is_valid_address]; enumeration stops early when `visit` returns
/// `false`.
pub fn enum_devices<O, F>(bus: &mut O, mut visit: F) -> Result<(), OneWireError<O::BusError>>
where
    O: OneWire,
    F: FnMut(Address) -> bool,
{
    let mut search = OneWireSearch::new(bus, SearchKind::Normal);
    while let Some(address) = search.next()? {
        if is_valid_address(&address) && !visit(address) {
            break;
        }
    }
    Ok(())
}

/// Decodes a scratchpad into 1/128 °C units.
///
/// Bit 15 of the temperature register is the sign on every supported
/// model. A MAX31850 is told apart from a plain DS1825 by configuration
/// bit 7, carries fault flags in the temperature LSB and the high-alarm
/// byte, and reserves the two low LSB bits. A DS18S20 reading is widened
/// from its 9-bit register with the count registers.
pub fn decode_temperature(family: u8, scratchpad: &[u8; 9]) -> Result<i32, Fault> {
    let lsb = scratchpad[SCRATCHPAD_TEMP_LSB] as i32;
    let msb = scratchpad[SCRATCHPAD_TEMP_MSB] as i32;
    let neg: i32 = if msb & 0x80 != 0 {
        0xfff8_0000u32 as i32
    } else {
        0
    };

    let max31850 = family == FAMILY_DS1825 && scratchpad[SCRATCHPAD_CONFIGURATION] & 0x80 != 0;
    let mut raw = if max31850 {
        if lsb & 1 != 0 {
            let alarm = scratchpad[SCRATCHPAD_HIGH_ALARM];
            return Err(if alarm & 1 != 0 {
                Fault::Open
            } else if (alarm >> 1) & 1 != 0 {
                Fault::ShortToGround
            } else if (alarm >> 2) & 1 != 0 {
                Fault::ShortToVdd
            } else {
                Fault::Disconnected
            });
        }
        (msb << 11) | ((lsb & 0xfc) << 3) | neg
    } else {
        (msb << 11) | (lsb << 3) | neg
    };

    let count_per_c = scratchpad[SCRATCHPAD_COUNT_PER_C] as i32;
    if family == FAMILY_DS18S20 && count_per_c != 0 {
        let count_remain = scratchpad[SCRATCHPAD_COUNT_REMAIN] as i32;
        raw = (((raw & 0xfff0) << 3) - 32 + (((count_per_c - count_remain) << 7) / count_per_c))
            | neg;
    }
    Ok(raw)
}

/// Convert T function command, common to the whole family. The device
/// performs the conversion on its own; at the default 12-bit resolution
/// it takes up to 750 ms, during which the bus is free for other traffic.
pub const CONVERT_TEMP_CMD: u8 = 0x44;

/// Read Scratchpad function command. The device transmits its nine
/// scratchpad bytes, the last being a CRC8 over the first eight.
pub const READ_SCRATCHPAD_CMD: u8 = 0xbe;
