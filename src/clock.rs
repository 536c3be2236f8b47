//! Link timestamps.
//!
//! Every frame, log header and actuator packet carries a microsecond counter
//! truncated to 31 bits, so all timestamps on the link wrap after ~35 minutes
//! and always fit a signed 32-bit field on the boards.

use std::time::Instant;

/// Mask applied to every link timestamp.
pub const TIMESTAMP_MASK: u64 = 0x7FFF_FFFF;

/// Monotonic microsecond clock anchored at link startup.
#[derive(Debug, Clone, Copy)]
pub struct LinkClock {
    origin: Instant,
}

impl LinkClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Microseconds since the clock was created, truncated to 31 bits.
    pub fn now_us(&self) -> u32 {
        truncate_us(self.origin.elapsed().as_micros() as u64)
    }
}

impl Default for LinkClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate a microsecond count to the 31-bit link timestamp.
pub fn truncate_us(micros: u64) -> u32 {
    (micros & TIMESTAMP_MASK) as u32
}
