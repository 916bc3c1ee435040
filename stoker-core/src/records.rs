//! Persistent records of the stove controller.
//!
//! Every record is a plain fixed-size structure of at most
//! [SECTOR_PAYLOAD](crate::SECTOR_PAYLOAD) bytes without padding, so the
//! store can treat it as an opaque byte blob. Times are whole seconds,
//! temperatures whole degrees Celsius, fuel whole kilograms.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Feeder and fan parameters of one power level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Profile {
    /// Feeder on-time per cycle, in seconds.
    pub fueling_sec: u8,
    /// Burnout time after feeding stops, in seconds.
    pub burnout_sec: u8,
    /// Fan power, in percent.
    pub fan_power: u8,
}

/// How the controller chooses its power level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OperationMode {
    /// The operator switches between power levels.
    #[default]
    Manual = 0,
    /// The controller switches based on the output temperature.
    Automatic = 1,
}

/// Operator-facing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Config {
    /// Full-power profile.
    pub full_power: Profile,
    /// Low-power (attenuation) profile.
    pub low_power: Profile,
    /// Heating value of the fuel, in units of 10 Wh/kg.
    pub heat_value: u8,
    /// Input temperature below which the stove shuts down.
    pub input_min_temp: u8,
    /// Samples of the input trend window.
    pub input_min_temp_samples: u8,
    /// Output temperature above which the stove overheats.
    pub output_max_temp: u8,
    /// Samples of the output trend window.
    pub output_max_temp_samples: u8,
    /// Output temperature at which the pump starts.
    pub pump_start_temp: u8,
    /// [OperationMode] as its raw byte.
    pub operation_mode: u8,
    /// Fan speed-feedback pulses per revolution reference.
    pub fan_pulse_count: u8,
    /// Nonzero routes the log to the serial port.
    pub serial_log_out: u8,
    /// Weight of one fuel bag, in kilograms.
    pub bag_kg: u8,
    /// Capacity of the fuel tray, in kilograms.
    pub tray_kg: u8,
    /// Display brightness level.
    pub display_intensity: u8,
}

impl Config {
    /// The operation mode, falling back to manual on an unknown byte.
    pub fn mode(&self) -> OperationMode {
        match self.operation_mode {
            1 => OperationMode::Automatic,
            _ => OperationMode::Manual,
        }
    }

    /// Sets the operation mode.
    pub fn set_mode(&mut self, mode: OperationMode) {
        self.operation_mode = mode as u8;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            full_power: Profile {
                fueling_sec: 8,
                burnout_sec: 20,
                fan_power: 60,
            },
            low_power: Profile {
                fueling_sec: 5,
                burnout_sec: 30,
                fan_power: 40,
            },
            heat_value: 170,
            input_min_temp: 60,
            input_min_temp_samples: 10,
            output_max_temp: 85,
            output_max_temp_samples: 10,
            pump_start_temp: 40,
            operation_mode: OperationMode::Manual as u8,
            fan_pulse_count: 100,
            serial_log_out: 0,
            bag_kg: 15,
            tray_kg: 225,
            display_intensity: 0,
        }
    }
}

/// Fuel-tray bookkeeping.
///
/// The feeder moves a known weight per second of running time
/// ([feeder_1kg_time](Tray::feeder_1kg_time) seconds per kilogram), so
/// fuel consumption is derived entirely from the accumulated feeder
/// seconds. All fill arithmetic is relative to
/// [tray_fill_time](Tray::tray_fill_time), the feeder time at the last
/// refill. A calibration of zero disables the derivation and the fill is
/// tracked as entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Tray {
    /// Accumulated feeder running time, in seconds.
    pub feeder_time: u32,
    /// Feeder time at the last tray-open event.
    pub tray_open_time: u32,
    /// Feeder time at the last refill.
    pub tray_fill_time: u32,
    /// Feeder seconds needed to move one kilogram of fuel.
    pub feeder_1kg_time: u16,
    /// Fuel loaded at the last refill, in kilograms.
    pub tray_fill_kg: u16,
    /// Fuel consumed in all completed fill cycles, in kilograms.
    pub consumed_fuel_kg: u32,
}

impl Tray {
    /// Feeder time at which the current fill runs out.
    pub const fn empty_time(&self) -> u32 {
        self.tray_fill_time + self.tray_fill_kg as u32 * self.feeder_1kg_time as u32
    }

    /// Fuel consumed since the last refill as of feeder time `reftime`.
    pub const fn consumed_since_fill_at(&self, reftime: u32) -> u32 {
        if self.feeder_1kg_time == 0 {
            return 0;
        }
        reftime.saturating_sub(self.tray_fill_time) / self.feeder_1kg_time as u32
    }

    /// Fuel consumed since the last refill, as of now.
    pub const fn consumed_since_fill(&self) -> u32 {
        self.consumed_since_fill_at(self.feeder_time)
    }

    /// Fuel remaining in the tray, in kilograms.
    pub const fn current_fill(&self) -> u32 {
        if self.feeder_1kg_time == 0 {
            return self.tray_fill_kg as u32;
        }
        let consumed = self.consumed_since_fill();
        if consumed > self.tray_fill_kg as u32 {
            0
        } else {
            self.tray_fill_kg as u32 - consumed
        }
    }

    /// Fuel consumed over the stove's whole life, in kilograms.
    pub const fn total_consumed(&self) -> u32 {
        self.consumed_fuel_kg + self.consumed_since_fill()
    }

    /// Books the fuel consumed up to feeder time `filltime` into the
    /// completed-cycles total and rebases the fill accordingly.
    ///
    /// A `filltime` at or before the current fill time does nothing.
    pub fn commit_consumed(&mut self, filltime: u32) {
        if filltime <= self.tray_fill_time {
            return;
        }
        let consumed = self.consumed_since_fill_at(filltime);
        self.consumed_fuel_kg += consumed;
        self.tray_fill_kg = (self.tray_fill_kg as u32).saturating_sub(consumed) as u16;
        self.tray_fill_time += consumed * self.feeder_1kg_time as u32;
    }

    /// Adjusts the recorded fill by `increment` kilograms at feeder time
    /// `filltime`, clamping at empty.
    ///
    /// A refill substantially larger than the fuel burned this cycle
    /// first commits the running consumption, so the statistics keep up
    /// even when the operator only reports occasionally.
    pub fn update_fill(&mut self, filltime: u32, increment: i32) {
        if self.feeder_1kg_time != 0 {
            let consumed = self.consumed_since_fill_at(filltime);
            if increment > 0 && increment as u32 > consumed / 2 {
                self.commit_consumed(filltime);
            }
        }
        let fill = self.tray_fill_kg as i32 + increment;
        self.tray_fill_kg = fill.clamp(0, u16::MAX as i32) as u16;
    }

    /// Raises the recorded fill to `max_fill` kilograms, a "tray topped
    /// up" shortcut. A fill already above the target is left alone.
    pub fn set_max_fill(&mut self, filltime: u32, max_fill: u32) {
        let remain = self.current_fill();
        if remain > max_fill {
            return;
        }
        self.update_fill(filltime, (max_fill - remain) as i32);
    }
}

impl Default for Tray {
    fn default() -> Self {
        Self {
            feeder_time: 0,
            tray_open_time: 0,
            tray_fill_time: 0,
            feeder_1kg_time: 240,
            tray_fill_kg: 0,
            consumed_fuel_kg: 0,
        }
    }
}

/// Running-time statistics, first group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct Runtime {
    /// Fan running time, in seconds.
    pub fan_time: u32,
    /// Pump running time, in seconds.
    pub pump_time: u32,
    /// Time spent at full power.
    pub full_power_time: u32,
    /// Time spent at low power.
    pub low_power_time: u32,
    /// Time spent cooling down.
    pub cooling_time: u32,
}

/// Running-time statistics, second group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct Runtime2 {
    /// Total powered-on time, in seconds.
    pub active_time: u32,
    /// Time spent in the overheat state.
    pub overheat_time: u32,
    /// Time spent in the stop state.
    pub stop_time: u32,
    /// Kept erased.
    pub reserved1: u32,
    /// Kept erased.
    pub reserved2: u32,
}

/// Event counters, first group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct Counters1 {
    /// Feeder motor starts.
    pub feeder_start_count: u32,
    /// Fan starts.
    pub fan_start_count: u32,
    /// Pump starts.
    pub pump_start_count: u32,
    /// Feeder motor overheat trips.
    pub feeder_overheat_count: u16,
    /// Tray-open events.
    pub tray_open_count: u16,
    /// Controller restarts.
    pub restart_count: u16,
    /// Output overheat events.
    pub overheat_count: u16,
}

/// Event counters, second group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct Counters2 {
    /// Switches into full power.
    pub full_power_count: u32,
    /// Switches into low power.
    pub low_power_count: u32,
    /// Switches into cooling.
    pub cool_count: u32,
    /// Switches into the stop state.
    pub stop_count: u16,
    /// Failed temperature readouts.
    pub temp_read_failure_count: u16,
    /// Kept erased.
    pub reserved1: u16,
    /// Kept erased.
    pub reserved2: u16,
}

/// ROM addresses of the two water temperature sensors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct SensorConfig {
    /// Sensor on the water inlet.
    pub input_temp: [u8; 8],
    /// Sensor on the water outlet.
    pub output_temp: [u8; 8],
}
