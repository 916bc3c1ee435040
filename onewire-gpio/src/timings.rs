/// Slot and reset timing parameters, in microseconds.
///
/// The defaults are the Maxim standard-speed values. The release timeout
/// and settle time govern the wait-for-idle check every primitive runs
/// before touching the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Reset pulse low time.
    pub reset_low_us: u32,
    /// Stabilize time after the reset release; devices assert presence in
    /// an equally long window that follows.
    pub presence_window_us: u32,
    /// Idle tail after the presence window completing the reset sequence.
    pub reset_tail_us: u32,
    /// Low pulse opening a write-1 slot.
    pub write_1_low_us: u32,
    /// Idle time completing a write-1 slot.
    pub write_1_idle_us: u32,
    /// Low pulse of a write-0 slot.
    pub write_0_low_us: u32,
    /// Recovery time completing a write-0 slot.
    pub write_0_idle_us: u32,
    /// Low pulse opening a read slot.
    pub read_low_us: u32,
    /// Time from the read slot release to the master sample point.
    pub read_sample_us: u32,
    /// Remainder of the read slot after the sample point.
    pub read_tail_us: u32,
    /// How long a low line is awaited before the bus counts as stuck.
    pub release_timeout_us: u32,
    /// Settle time after the line reads high before driving it again.
    pub settle_us: u32,
}

impl Timings {
    /// Maxim standard-speed slot timing.
    pub const STANDARD: Self = Self {
        reset_low_us: 480,
        presence_window_us: 70,
        reset_tail_us: 410,
        write_1_low_us: 6,
        write_1_idle_us: 64,
        write_0_low_us: 60,
        write_0_idle_us: 10,
        read_low_us: 6,
        read_sample_us: 9,
        read_tail_us: 55,
        release_timeout_us: 500,
        settle_us: 10,
    };
}

impl Default for Timings {
    fn default() -> Self {
        Self::STANDARD
    }
}
