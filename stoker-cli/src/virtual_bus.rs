//! A trait-level model of a multidrop sensor bus.
//!
//! Models the protocol one layer above the wire: ROM commands select
//! devices, the search read slots return the wired AND over the devices
//! still matching the written direction bits, and a Read Scratchpad
//! command queues the selected sensor's scratchpad for the following
//! byte reads. Temperatures are fixed per device, encoded DS18B20 style.

use core::convert::Infallible;

use onewire_core::crc::crc8;
use onewire_core::{OneWire, OneWireResult};

pub struct VirtualSensor {
    rom: [u8; 8],
    celsius: f32,
}

impl VirtualSensor {
    pub fn new(serial: [u8; 6], celsius: f32) -> Self {
        let mut rom = [
            0x28, serial[0], serial[1], serial[2], serial[3], serial[4], serial[5], 0,
        ];
        rom[7] = crc8(&rom[..7]);
        Self { rom, celsius }
    }

    fn scratchpad(&self) -> [u8; 9] {
        let raw = (self.celsius * 16.0) as i16;
        let [lsb, msb] = raw.to_le_bytes();
        let mut data = [lsb, msb, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0];
        data[8] = crc8(&data[..8]);
        data
    }
}

enum Expecting {
    RomCommand,
    MatchRom,
    Function,
}

pub struct VirtualBus {
    sensors: Vec<VirtualSensor>,
    expecting: Expecting,
    match_buf: Vec<u8>,
    selected: Option<usize>,
    broadcast: bool,
    pending_reads: Vec<u8>,
    // search pass state
    searching: bool,
    candidates: Vec<usize>,
    bit_pos: usize,
    read_phase: u8,
}

impl VirtualBus {
    pub fn new(sensors: Vec<VirtualSensor>) -> Self {
        Self {
            sensors,
            expecting: Expecting::RomCommand,
            match_buf: Vec::new(),
            selected: None,
            broadcast: false,
            pending_reads: Vec::new(),
            searching: false,
            candidates: Vec::new(),
            bit_pos: 0,
            read_phase: 0,
        }
    }

    fn rom_bit(rom: &[u8; 8], pos: usize) -> bool {
        rom[pos / 8] & (1 << (pos % 8)) != 0
    }

    fn begin_search(&mut self) {
        self.searching = true;
        self.bit_pos = 0;
        self.read_phase = 0;
        self.candidates = (0..self.sensors.len()).collect();
    }
}

impl OneWire for VirtualBus {
    type BusError = Infallible;

    fn reset(&mut self) -> OneWireResult<bool, Infallible> {
        self.expecting = Expecting::RomCommand;
        self.match_buf.clear();
        self.selected = None;
        self.broadcast = false;
        self.pending_reads.clear();
        self.searching = false;
        Ok(!self.sensors.is_empty())
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Infallible> {
        match self.expecting {
            Expecting::RomCommand => match byte {
                0x55 => self.expecting = Expecting::MatchRom,
                0xcc => {
                    self.broadcast = true;
                    self.expecting = Expecting::Function;
                }
                0xf0 | 0xec => self.begin_search(),
                _ => {}
            },
            Expecting::MatchRom => {
                self.match_buf.push(byte);
                if self.match_buf.len() == 8 {
                    self.selected = self
                        .sensors
                        .iter()
                        .position(|s| s.rom[..] == self.match_buf[..]);
                    self.match_buf.clear();
                    self.expecting = Expecting::Function;
                }
            }
            Expecting::Function => {
                // convert (0x44) needs no response; a scratchpad read is
                // served to the uniquely selected device only
                if byte == 0xbe && !self.broadcast {
                    if let Some(idx) = self.selected {
                        self.pending_reads = self.sensors[idx].scratchpad().to_vec();
                        self.pending_reads.reverse(); // popped from the back
                    }
                }
            }
        }
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Infallible> {
        // an unaddressed read floats high
        Ok(self.pending_reads.pop().unwrap_or(0xff))
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Infallible> {
        if self.searching {
            let pos = self.bit_pos;
            let sensors = &self.sensors;
            self.candidates
                .retain(|&i| Self::rom_bit(&sensors[i].rom, pos) == bit);
            self.bit_pos += 1;
            self.read_phase = 0;
        }
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Infallible> {
        if !self.searching {
            return Ok(true);
        }
        let bit = if self.read_phase == 0 {
            self.candidates
                .iter()
                .all(|&i| Self::rom_bit(&self.sensors[i].rom, self.bit_pos))
        } else {
            self.candidates
                .iter()
                .all(|&i| !Self::rom_bit(&self.sensors[i].rom, self.bit_pos))
        };
        self.read_phase += 1;
        Ok(bit)
    }
}
