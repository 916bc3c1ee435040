#![no_std]
#![deny(missing_docs)]
//! # onewire-core
//! A no-std interface for 1-Wire bus masters.
//!
//! This crate defines the [OneWire] trait for blocking bus masters, with the
//! byte-level transfers, device selection and the Maxim ROM search algorithm
//! built on top of the implementor's reset and bit-slot primitives.
//! Device discovery lives in [OneWireSearch]; the Dallas CRC8 used for ROM
//! addresses and scratchpads, and the CRC16 used for memory transfers, live
//! in the [crc] module.
//!
//! Masters implement [OneWire] for whatever physical layer they drive (a
//! GPIO pin, an I2C bridge); device drivers are written against the trait
//! and stay portable across masters.

mod address;
pub mod crc;
mod error;
mod search;
mod traits;

pub use address::Address;
pub use crc::OneWireCrc;
pub use error::OneWireError;
pub use search::{OneWireSearch, SearchKind};
pub use traits::OneWire;

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;

/// The Match ROM command followed by a 64-bit ROM sequence allows the bus
/// master to address a specific device on a multidrop bus. Only the device
/// that exactly matches the 64-bit ROM sequence responds to the subsequent
/// function command; all other slaves wait for the next reset pulse.
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// The Skip ROM command saves time on a single-drop bus by allowing the bus
/// master to access the function commands without providing a 64-bit ROM
/// code, and addresses every device at once on a multidrop bus.
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// Command to search for devices on the 1-Wire bus
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;

/// Command to search for devices in alarm state on the 1-Wire bus
pub const ONEWIRE_CONDITIONAL_SEARCH_CMD: u8 = 0xec;
