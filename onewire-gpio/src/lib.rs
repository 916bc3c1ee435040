#![no_std]
#![deny(missing_docs)]
//! # onewire-gpio
//! Bit-banged 1-Wire bus master on a single open-drain GPIO pin.
//!
//! [GpioOneWire] implements the [OneWire](onewire_core::OneWire) trait with
//! busy-wait slot timing taken from a free-running microsecond counter
//! ([MicrosClock]). The pin is handled open-drain style: the master either
//! drives the line low or releases it and lets the pull-up raise it, so any
//! [embedded_hal] pin that is both an
//! [InputPin](embedded_hal::digital::InputPin) and an
//! [OutputPin](embedded_hal::digital::OutputPin) works, with `set_high`
//! meaning release.
//!
//! Every primitive first waits for the line to idle high and reports
//! [BusNotReleased](onewire_core::OneWireError::BusNotReleased) when it
//! stays low past the release timeout, which is how a shorted bus or a
//! stuck slave surfaces. Interrupts are masked with a
//! [critical_section] around the write-1 pulse and the read slot, where a
//! stretched low pulse or a late sample would corrupt the transfer.
//!
//! The `sim` feature adds a discrete-event line simulation ([sim]) used to
//! check slot timing without hardware.

#[cfg(feature = "sim")]
extern crate alloc;

mod clock;
mod onewire;
#[cfg(feature = "sim")]
pub mod sim;
mod timings;

pub use clock::{MicrosClock, deadline_passed};
pub use timings::Timings;

use embedded_hal::digital::{InputPin, OutputPin};
use onewire_core::{OneWireError, OneWireResult};

/// Bit-banged 1-Wire master over one GPIO pin.
///
/// Build through [GpioOneWireBuilder]. All operations block on the clock;
/// the longest single call is the reset sequence at just over a
/// millisecond.
///
/// The driver only ever drives the line low or releases it. A strong
/// pull-up for parasite-powered devices, like holding the line high
/// during a temperature conversion, has to be provided outside the
/// driver; [internal_pullup](GpioOneWire::internal_pullup) tells the
/// platform glue what holds the idle line.
pub struct GpioOneWire<P, C> {
    pin: P,
    clock: C,
    timings: Timings,
    internal_pullup: bool,
}

/// Builder for [GpioOneWire].
#[derive(Debug, Clone, Default)]
pub struct GpioOneWireBuilder {
    timings: Timings,
    internal_pullup: bool,
}

impl GpioOneWireBuilder {
    /// Creates a builder with [Timings::STANDARD] and the internal pull-up
    /// flag cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the slot timing parameters.
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Records that the pin's internal pull-up holds the idle line high
    /// instead of an external resistor.
    ///
    /// The driver itself only ever drives low or releases; the flag is
    /// carried so platform glue can provision the pin to match.
    pub fn with_internal_pullup(mut self, enabled: bool) -> Self {
        self.internal_pullup = enabled;
        self
    }

    /// Binds the pin and clock and releases the line.
    pub fn build<P, C>(self, pin: P, clock: C) -> OneWireResult<GpioOneWire<P, C>, P::Error>
    where
        P: InputPin + OutputPin,
        C: MicrosClock,
    {
        let mut bus = GpioOneWire {
            pin,
            clock,
            timings: self.timings,
            internal_pullup: self.internal_pullup,
        };
        bus.pin.set_high()?;
        Ok(bus)
    }
}

impl<P, C> GpioOneWire<P, C> {
    /// The slot timing in use.
    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Whether the pin's internal pull-up is expected to hold the idle
    /// line. Purely descriptive; the driver itself never pushes the line
    /// high.
    pub fn internal_pullup(&self) -> bool {
        self.internal_pullup
    }

    /// Consumes the bus and hands back the pin and clock.
    pub fn into_parts(self) -> (P, C) {
        (self.pin, self.clock)
    }
}

impl<P, C> GpioOneWire<P, C>
where
    P: InputPin + OutputPin,
    C: MicrosClock,
{
    fn deadline(&mut self, micros: u32) -> u32 {
        self.clock.now_us().wrapping_add(micros)
    }

    fn wait_until(&mut self, deadline: u32) {
        while !deadline_passed(self.clock.now_us(), deadline) {}
    }

    fn wait_for(&mut self, micros: u32) {
        let deadline = self.deadline(micros);
        self.wait_until(deadline);
    }

    /// Polls up to `micros` for the line to leave `level`. `Ok(true)` when
    /// it did, `Ok(false)` on timeout.
    fn wait_while_line(&mut self, micros: u32, level: bool) -> Result<bool, P::Error> {
        let deadline = self.deadline(micros);
        loop {
            if deadline_passed(self.clock.now_us(), deadline) {
                return Ok(false);
            }
            if self.pin.is_high()? != level {
                return Ok(true);
            }
        }
    }

    /// Waits for whoever holds the line to let go, then gives the pull-up
    /// time to settle the level.
    fn wait_for_release(&mut self) -> OneWireResult<(), P::Error> {
        if !self.wait_while_line(self.timings.release_timeout_us, false)? {
            return Err(OneWireError::BusNotReleased);
        }
        self.wait_for(self.timings.settle_us);
        Ok(())
    }

    /// Drives the line low for `hold` microseconds, releases it, and waits
    /// out a further `stabilize` microseconds.
    fn hold_low_for(&mut self, hold: u32, stabilize: u32) -> Result<(), P::Error> {
        let mut deadline = self.deadline(hold);
        self.pin.set_low()?;
        self.wait_until(deadline);
        deadline = deadline.wrapping_add(stabilize);
        self.pin.set_high()?;
        self.wait_until(deadline);
        Ok(())
    }
}
