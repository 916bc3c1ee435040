//! RAM-backed flash device for tests and host-side tooling.
//!
//! [MemFlash] behaves like a byte-granular NOR data flash: erase works on
//! whole pages and fills them with 0xff, and programming can only clear
//! bits. Every access is bounds-checked and counted, so tests can assert
//! how much wear an operation causes and what survives a simulated power
//! loss.

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

/// Errors reported by [MemFlash].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemFlashError {
    /// An access reached past the end of the device.
    OutOfBounds,
    /// An erase range was not page aligned.
    NotAligned,
}

impl NorFlashError for MemFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            MemFlashError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            MemFlashError::NotAligned => NorFlashErrorKind::NotAligned,
        }
    }
}

/// In-memory flash of `SIZE` bytes with `ERASE`-byte pages.
pub struct MemFlash<const SIZE: usize, const ERASE: usize> {
    memory: [u8; SIZE],
    reads: u32,
    writes: u32,
    erases: u32,
}

impl<const SIZE: usize, const ERASE: usize> MemFlash<SIZE, ERASE> {
    /// Creates a fully erased device.
    pub const fn new() -> Self {
        const {
            assert!(ERASE > 0 && SIZE % ERASE == 0, "whole number of pages");
        }
        Self {
            memory: [0xff; SIZE],
            reads: 0,
            writes: 0,
            erases: 0,
        }
    }

    /// The raw cell contents.
    pub fn bytes(&self) -> &[u8; SIZE] {
        &self.memory
    }

    /// The raw cell contents, writable.
    ///
    /// Tests use this to plant corruption or stale data without going
    /// through the NOR semantics; the access counters do not move.
    pub fn bytes_mut(&mut self) -> &mut [u8; SIZE] {
        &mut self.memory
    }

    /// Number of `read` calls served so far.
    pub fn read_count(&self) -> u32 {
        self.reads
    }

    /// Number of `write` calls served so far.
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    /// Number of `erase` calls served so far.
    pub fn erase_count(&self) -> u32 {
        self.erases
    }

    /// Resets the access counters, leaving the cells alone.
    pub fn reset_counters(&mut self) {
        self.reads = 0;
        self.writes = 0;
        self.erases = 0;
    }

    fn check_range(offset: u32, len: usize) -> Result<usize, MemFlashError> {
        let offset = offset as usize;
        if offset.checked_add(len).is_none_or(|end| end > SIZE) {
            return Err(MemFlashError::OutOfBounds);
        }
        Ok(offset)
    }
}

impl<const SIZE: usize, const ERASE: usize> Default for MemFlash<SIZE, ERASE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, const ERASE: usize> ErrorType for MemFlash<SIZE, ERASE> {
    type Error = MemFlashError;
}

impl<const SIZE: usize, const ERASE: usize> ReadNorFlash for MemFlash<SIZE, ERASE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), MemFlashError> {
        let offset = Self::check_range(offset, bytes.len())?;
        self.reads += 1;
        bytes.copy_from_slice(&self.memory[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl<const SIZE: usize, const ERASE: usize> NorFlash for MemFlash<SIZE, ERASE> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = ERASE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), MemFlashError> {
        if from % ERASE as u32 != 0 || to % ERASE as u32 != 0 || from > to {
            return Err(MemFlashError::NotAligned);
        }
        let len = (to - from) as usize;
        let from = Self::check_range(from, len)?;
        self.erases += 1;
        self.memory[from..from + len].fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemFlashError> {
        let offset = Self::check_range(offset, bytes.len())?;
        self.writes += 1;
        // programming clears bits, only an erase sets them again
        for (cell, byte) in self.memory[offset..offset + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}
