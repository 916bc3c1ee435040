use embedded_hal::digital::{InputPin, OutputPin};
use onewire_core::{OneWire, OneWireResult};

use crate::{GpioOneWire, MicrosClock};

impl<P, C> OneWire for GpioOneWire<P, C>
where
    P: InputPin + OutputPin,
    C: MicrosClock,
{
    type BusError = P::Error;

    fn reset(&mut self) -> OneWireResult<bool, P::Error> {
        self.wait_for_release()?;
        self.hold_low_for(self.timings.reset_low_us, self.timings.presence_window_us)?;
        if !self.wait_while_line(self.timings.presence_window_us, true)? {
            return Ok(false);
        }
        self.wait_for(self.timings.reset_tail_us);
        Ok(true)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), P::Error> {
        self.wait_for_release()?;
        if bit {
            // an interrupt here would stretch the low pulse into a zero
            critical_section::with(|_| self.hold_low_for(self.timings.write_1_low_us, 0))?;
            self.wait_for(self.timings.write_1_idle_us);
        } else {
            self.hold_low_for(self.timings.write_0_low_us, self.timings.write_0_idle_us)?;
        }
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, P::Error> {
        self.wait_for_release()?;
        let bit = critical_section::with(|_| -> Result<bool, P::Error> {
            self.hold_low_for(self.timings.read_low_us, self.timings.read_sample_us)?;
            let slot_end = self.deadline(self.timings.read_tail_us);
            // the line stays high for the whole window iff the device
            // transmitted a one
            let went_low = self.wait_while_line(self.timings.read_tail_us, true)?;
            self.wait_until(slot_end);
            Ok(!went_low)
        })?;
        Ok(bit)
    }
}
