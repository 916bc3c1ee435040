#![no_std]
#![deny(missing_docs)]
//! # stoker-core
//! Application core of a pellet-fed heating-stove controller.
//!
//! Three concerns live here, all built for a single-threaded cooperative
//! scheduler:
//!
//! * [records]: the fixed-size configuration and statistics records the
//!   controller keeps across power cycles, including the fuel-tray
//!   bookkeeping arithmetic.
//! * [Settings]: the persistence façade binding those records to an
//!   [eeprom_log] store on the controller's data flash, with a
//!   save/commit split so flash writes happen on the scheduler's terms.
//! * [SensorPoller]: a millisecond-tick state machine reading the input
//!   and output water temperature sensors through the [ds18x20] async
//!   interface, one bus operation per tick, with a per-sensor history
//!   ring for trend extrapolation.
//!
//! Control loops for the feeder, fan and pump, the display and the
//! network surface ride on top of these types and are out of scope here.

pub mod records;
mod sensor;
mod settings;

pub use sensor::{HISTORY_LEN, SensorPoller, SensorReading};
pub use settings::{
    FILE_CONFIG, FILE_COUNTERS1, FILE_COUNTERS2, FILE_RUNTIME1, FILE_RUNTIME2, FILE_SENSORS,
    FILE_TRAY, SECTOR_PAYLOAD, SETTINGS_FILES, Settings, StoveEeprom,
};
