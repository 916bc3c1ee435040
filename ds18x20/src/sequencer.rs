use onewire_core::crc::crc8;
use onewire_core::{Address, OneWire};

use crate::{
    CONVERT_TEMP_CMD, READ_SCRATCHPAD_CMD, Status, Temperature, decode_temperature,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Done,
    ConvertAll,
    ConvertOne,
    ReadScratchpad,
}

/// A temperature transaction split into single-bus-operation steps.
///
/// The start methods arm the machine with a synchronous bus reset; each
/// [AsyncState::cycle] afterwards performs exactly one bus transfer (a
/// ROM select, a command byte, or one scratchpad byte), so a cooperative
/// scheduler can spread a full readout over its tick loop. Any bus error
/// mid-sequence parks the machine in the done state with
/// [Status::BusError].
#[derive(Debug, Clone)]
pub struct AsyncState {
    command: Command,
    phase: u8,
    address: Address,
    buffer: [u8; 9],
    status: Status,
}

impl AsyncState {
    /// Creates an idle machine; arm it with one of the start methods.
    pub fn new() -> Self {
        Self {
            command: Command::Done,
            phase: 0,
            address: Address::default(),
            buffer: [0; 9],
            status: Status::Ok,
        }
    }

    fn arm<O: OneWire>(&mut self, bus: &mut O, command: Command) {
        self.phase = 0;
        match bus.reset() {
            Ok(true) => {
                self.command = command;
                self.status = Status::Ok;
            }
            Ok(false) => {
                self.command = Command::Done;
                self.status = Status::NoDevice;
            }
            Err(_) => {
                self.command = Command::Done;
                self.status = Status::BusError;
            }
        }
    }

    /// Arms a broadcast temperature conversion.
    pub fn start_convert_all<O: OneWire>(&mut self, bus: &mut O) {
        self.arm(bus, Command::ConvertAll);
    }

    /// Arms a temperature conversion on one device.
    pub fn start_convert<O: OneWire>(&mut self, bus: &mut O, address: Address) {
        self.address = address;
        self.arm(bus, Command::ConvertOne);
    }

    /// Arms a scratchpad readout of one device.
    pub fn start_read<O: OneWire>(&mut self, bus: &mut O, address: Address) {
        self.address = address;
        self.arm(bus, Command::ReadScratchpad);
    }

    /// Runs one step of the armed transaction.
    ///
    /// Returns `true` once the transaction is finished (also on an idle
    /// machine); the outcome is in [AsyncState::status].
    pub fn cycle<O: OneWire>(&mut self, bus: &mut O) -> bool {
        let step = match self.command {
            Command::Done => return true,
            Command::ReadScratchpad => match self.phase {
                0 => bus.select(&self.address),
                1 => bus.write_byte(READ_SCRATCHPAD_CMD),
                p if (p as usize) < 2 + self.buffer.len() => match bus.read_byte() {
                    Ok(byte) => {
                        self.buffer[p as usize - 2] = byte;
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                _ => {
                    self.command = Command::Done;
                    return true;
                }
            },
            Command::ConvertOne => match self.phase {
                0 => bus.select(&self.address),
                1 => bus.write_byte(CONVERT_TEMP_CMD),
                _ => {
                    self.command = Command::Done;
                    return true;
                }
            },
            Command::ConvertAll => match self.phase {
                0 => bus.select_all(),
                1 => bus.write_byte(CONVERT_TEMP_CMD),
                _ => {
                    self.command = Command::Done;
                    return true;
                }
            },
        };
        match step {
            Ok(()) => {
                self.phase += 1;
                false
            }
            Err(_) => {
                self.command = Command::Done;
                self.status = Status::BusError;
                true
            }
        }
    }

    /// Outcome of the transaction so far.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the machine is parked in the done state.
    pub fn is_done(&self) -> bool {
        self.command == Command::Done
    }

    /// Validates the read scratchpad and decodes the raw 1/128 °C
    /// reading.
    ///
    /// `None` unless a readout finished cleanly; a CRC or sensor fault is
    /// recorded in [AsyncState::status].
    pub fn result_raw(&mut self) -> Option<i32> {
        if self.status != Status::Ok {
            return None;
        }
        if crc8(&self.buffer[..8]) != self.buffer[8] {
            self.status = Status::CrcMismatch;
            return None;
        }
        match decode_temperature(self.address.family_code(), &self.buffer) {
            Ok(raw) => Some(raw),
            Err(fault) => {
                self.status = Status::Fault(fault);
                None
            }
        }
    }

    /// The decoded reading as a fixed-point temperature.
    pub fn result(&mut self) -> Option<Temperature> {
        self.result_raw().map(Temperature::from_bits)
    }

    /// The decoded reading in degrees Celsius.
    pub fn result_celsius(&mut self) -> Option<f32> {
        self.result_raw().map(|raw| raw as f32 * (1.0 / 128.0))
    }
}

impl Default for AsyncState {
    fn default() -> Self {
        Self::new()
    }
}
