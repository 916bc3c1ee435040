/// Errors returned by 1-Wire bus operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Error from the underlying pin or bus driver.
    Gpio(E),
    /// The bus did not return to the idle (high) state within the release
    /// timeout. A stuck-low line usually means a short to ground or a
    /// slave holding the bus.
    BusNotReleased,
    /// No device answered the reset pulse with a presence pulse.
    NoDevicePresent,
    /// A ROM address failed its CRC check.
    InvalidCrc,
}

impl<E> From<E> for OneWireError<E> {
    fn from(value: E) -> Self {
        OneWireError::Gpio(value)
    }
}
