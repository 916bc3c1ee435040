/// Errors returned by store operations.
///
/// `E` is the error type of the underlying flash device; a fault reported
/// by the device converts into [`Flash`](EepromError::Flash) through `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromError<E> {
    /// The flash device reported an error.
    Flash(E),
    /// The file number lies outside the directory.
    InvalidFileNumber,
    /// Every page holds live data, the write cannot proceed.
    StorageFull,
}

impl<E> From<E> for EepromError<E> {
    fn from(value: E) -> Self {
        EepromError::Flash(value)
    }
}

/// Alias for results of store operations.
pub type EepromResult<T, E> = Result<T, EepromError<E>>;
