//! Blocking and step-driven transfers checked against scripted bus
//! doubles.

use core::convert::Infallible;
use std::collections::VecDeque;

use ds18x20::{AsyncState, Status, TempError, Temperature};
use onewire_core::crc::crc8;
use onewire_core::{Address, OneWire, OneWireError, OneWireResult};

/// Byte-level bus double: records written bytes, serves canned reads, and
/// reports presence or not. Reading past the script fails like a stuck
/// bus, which doubles as the error-injection hook.
struct MockBus {
    present: bool,
    written: Vec<u8>,
    reads: VecDeque<u8>,
    resets: usize,
}

impl MockBus {
    fn new(present: bool) -> Self {
        Self {
            present,
            written: Vec::new(),
            reads: VecDeque::new(),
            resets: 0,
        }
    }

    fn with_reads(present: bool, reads: &[u8]) -> Self {
        let mut bus = Self::new(present);
        bus.reads = reads.iter().copied().collect();
        bus
    }
}

impl OneWire for MockBus {
    type BusError = Infallible;

    fn reset(&mut self) -> OneWireResult<bool, Infallible> {
        self.resets += 1;
        Ok(self.present)
    }

    fn write_bit(&mut self, _bit: bool) -> OneWireResult<(), Infallible> {
        unreachable!("byte-level double")
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Infallible> {
        unreachable!("byte-level double")
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Infallible> {
        self.written.push(byte);
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Infallible> {
        match self.reads.pop_front() {
            Some(byte) => Ok(byte),
            None => Err(OneWireError::BusNotReleased),
        }
    }
}

fn rom(family: u8, serial: [u8; 6]) -> Address {
    let mut bytes = [
        family, serial[0], serial[1], serial[2], serial[3], serial[4], serial[5], 0,
    ];
    bytes[7] = crc8(&bytes[..7]);
    Address::new(bytes)
}

fn frame(payload: [u8; 8]) -> [u8; 9] {
    let mut data = [0u8; 9];
    data[..8].copy_from_slice(&payload);
    data[8] = crc8(&payload);
    data
}

// +25.0625 °C on a DS18B20
const READING: [u8; 8] = [0x91, 0x01, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10];

#[test]
fn request_temp_all_broadcasts_the_convert_command() {
    let mut bus = MockBus::new(true);
    ds18x20::request_temp_all(&mut bus).unwrap();
    assert_eq!(bus.written, vec![0xcc, 0x44]);
    assert_eq!(bus.resets, 1);
}

#[test]
fn request_temp_selects_the_device_first() {
    let mut bus = MockBus::new(true);
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    ds18x20::request_temp(&mut bus, &addr).unwrap();
    let mut expected = vec![0x55];
    expected.extend_from_slice(addr.as_bytes());
    expected.push(0x44);
    assert_eq!(bus.written, expected);
}

#[test]
fn request_without_presence_fails() {
    let mut bus = MockBus::new(false);
    assert_eq!(
        ds18x20::request_temp_all(&mut bus),
        Err(TempError::NoDevice)
    );
    assert!(bus.written.is_empty());
}

#[test]
fn read_temp_decodes_a_scratchpad() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    let mut bus = MockBus::with_reads(true, &frame(READING));
    assert_eq!(ds18x20::read_temp_celsius(&mut bus, &addr), Ok(25.0625));
    let mut expected = vec![0x55];
    expected.extend_from_slice(addr.as_bytes());
    expected.push(0xbe);
    assert_eq!(bus.written, expected);
}

#[test]
fn read_temp_returns_fixed_point_units() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    let mut bus = MockBus::with_reads(true, &frame(READING));
    assert_eq!(
        ds18x20::read_temp(&mut bus, &addr),
        Ok(Temperature::from_bits(3208))
    );
}

#[test]
fn read_temp_rejects_a_corrupt_scratchpad() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    let mut data = frame(READING);
    data[1] ^= 0x20;
    let mut bus = MockBus::with_reads(true, &data);
    assert_eq!(
        ds18x20::read_temp_raw(&mut bus, &addr),
        Err(TempError::CrcMismatch)
    );
}

#[test]
fn read_temp_without_presence_fails() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    let mut bus = MockBus::new(false);
    assert_eq!(
        ds18x20::read_temp_raw(&mut bus, &addr),
        Err(TempError::NoDevice)
    );
}

#[test]
fn async_broadcast_convert_takes_three_cycles() {
    let mut bus = MockBus::new(true);
    let mut st = AsyncState::new();
    st.start_convert_all(&mut bus);
    assert_eq!(st.status(), Status::Ok);
    assert!(!st.is_done());

    assert!(!st.cycle(&mut bus)); // skip rom
    assert!(!st.cycle(&mut bus)); // convert command
    assert!(st.cycle(&mut bus)); // done transition, no bus traffic
    assert!(st.is_done());
    assert_eq!(bus.written, vec![0xcc, 0x44]);
    assert_eq!(bus.resets, 1);

    // a finished machine stays finished
    assert!(st.cycle(&mut bus));
    assert_eq!(bus.written, vec![0xcc, 0x44]);
}

#[test]
fn async_addressed_convert_selects_the_device() {
    let mut bus = MockBus::new(true);
    let addr = rom(0x42, [9, 8, 7, 6, 5, 4]);
    let mut st = AsyncState::new();
    st.start_convert(&mut bus, addr);
    while !st.cycle(&mut bus) {}
    assert_eq!(st.status(), Status::Ok);
    let mut expected = vec![0x55];
    expected.extend_from_slice(addr.as_bytes());
    expected.push(0x44);
    assert_eq!(bus.written, expected);
}

#[test]
fn async_readout_spreads_one_transfer_per_cycle() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    let mut bus = MockBus::with_reads(true, &frame(READING));
    let mut st = AsyncState::new();
    st.start_read(&mut bus, addr);

    let mut cycles = 0;
    while !st.cycle(&mut bus) {
        cycles += 1;
        assert!(cycles < 32);
    }
    // select, command, nine scratchpad bytes
    assert_eq!(cycles, 11);
    assert_eq!(st.status(), Status::Ok);
    assert_eq!(st.result_raw(), Some(3208));
    assert_eq!(st.result_celsius(), Some(25.0625));
}

#[test]
fn async_start_without_presence_finishes_immediately() {
    let mut bus = MockBus::new(false);
    let mut st = AsyncState::new();
    st.start_read(&mut bus, rom(0x28, [1, 2, 3, 4, 5, 6]));
    assert!(st.is_done());
    assert_eq!(st.status(), Status::NoDevice);
    assert!(st.cycle(&mut bus));
    assert_eq!(st.result_raw(), None);
}

#[test]
fn async_bus_error_parks_the_machine() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    // only four of nine scratchpad bytes available
    let mut bus = MockBus::with_reads(true, &frame(READING)[..4]);
    let mut st = AsyncState::new();
    st.start_read(&mut bus, addr);

    let mut done = false;
    for _ in 0..16 {
        if st.cycle(&mut bus) {
            done = true;
            break;
        }
    }
    assert!(done);
    assert_eq!(st.status(), Status::BusError);
    assert_eq!(st.result_raw(), None);
}

#[test]
fn async_crc_failure_surfaces_on_decode() {
    let addr = rom(0x28, [1, 2, 3, 4, 5, 6]);
    let mut data = frame(READING);
    data[0] ^= 0x01;
    let mut bus = MockBus::with_reads(true, &data);
    let mut st = AsyncState::new();
    st.start_read(&mut bus, addr);
    while !st.cycle(&mut bus) {}
    assert_eq!(st.status(), Status::Ok);
    assert_eq!(st.result_raw(), None);
    assert_eq!(st.status(), Status::CrcMismatch);
}

/// Wired-AND search double for the enumeration tests: read slots return
/// the AND over the ROMs still matching the written direction bits.
struct SearchBus {
    roms: Vec<[u8; 8]>,
    candidates: Vec<usize>,
    searching: bool,
    bit_pos: usize,
    read_phase: u8,
}

impl SearchBus {
    fn new(roms: Vec<[u8; 8]>) -> Self {
        Self {
            roms,
            candidates: Vec::new(),
            searching: false,
            bit_pos: 0,
            read_phase: 0,
        }
    }
}

fn rom_bit(rom: &[u8; 8], pos: usize) -> bool {
    rom[pos / 8] & (1 << (pos % 8)) != 0
}

impl OneWire for SearchBus {
    type BusError = Infallible;

    fn reset(&mut self) -> OneWireResult<bool, Infallible> {
        self.searching = false;
        Ok(!self.roms.is_empty())
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Infallible> {
        if byte == 0xf0 {
            self.searching = true;
            self.bit_pos = 0;
            self.read_phase = 0;
            self.candidates = (0..self.roms.len()).collect();
        }
        Ok(())
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Infallible> {
        if self.searching {
            let pos = self.bit_pos;
            let roms = &self.roms;
            self.candidates.retain(|&i| rom_bit(&roms[i], pos) == bit);
            self.bit_pos += 1;
            self.read_phase = 0;
        }
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Infallible> {
        if !self.searching {
            return Ok(true);
        }
        let pos = self.bit_pos;
        let bit = if self.read_phase == 0 {
            self.candidates.iter().all(|&i| rom_bit(&self.roms[i], pos))
        } else {
            self.candidates.iter().all(|&i| !rom_bit(&self.roms[i], pos))
        };
        self.read_phase += 1;
        Ok(bit)
    }
}

#[test]
fn enum_devices_skips_unsupported_families() {
    let supported_a = rom(0x28, [1, 1, 1, 1, 1, 1]);
    let supported_b = rom(0x10, [2, 2, 2, 2, 2, 2]);
    let alien = rom(0x05, [3, 3, 3, 3, 3, 3]);
    let mut bus = SearchBus::new(vec![
        *supported_a.as_bytes(),
        *supported_b.as_bytes(),
        *alien.as_bytes(),
    ]);

    let mut seen = Vec::new();
    ds18x20::enum_devices(&mut bus, |addr| {
        seen.push(addr);
        true
    })
    .unwrap();

    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&supported_a));
    assert!(seen.contains(&supported_b));
}

#[test]
fn enum_devices_stops_when_the_callback_declines() {
    let a = rom(0x28, [1, 1, 1, 1, 1, 1]);
    let b = rom(0x28, [2, 2, 2, 2, 2, 2]);
    let mut bus = SearchBus::new(vec![*a.as_bytes(), *b.as_bytes()]);

    let mut seen = 0;
    ds18x20::enum_devices(&mut bus, |_| {
        seen += 1;
        false
    })
    .unwrap();
    assert_eq!(seen, 1);
}
