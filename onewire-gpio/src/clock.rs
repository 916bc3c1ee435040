/// Free-running microsecond time source.
///
/// Any monotonic 32-bit microsecond counter works; the counter is allowed
/// to wrap (roughly every 71 minutes) because consumers only ever compare
/// differences through [deadline_passed].
pub trait MicrosClock {
    /// Current counter value in microseconds.
    fn now_us(&mut self) -> u32;
}

/// Whether `now` has reached `deadline`, tolerating counter wraparound.
///
/// The difference is read as a signed quantity: a deadline less than half
/// the counter range ahead of `now` counts as not yet passed.
pub fn deadline_passed(now: u32, deadline: u32) -> bool {
    now.wrapping_sub(deadline) & (1 << 31) == 0
}
