//! Day-cycle clock.

use std::time::Instant;

/// Length of one in-game day in wall-clock seconds.
pub const DAY_LENGTH_SECONDS: u64 = 1200;

/// Monotonic time-of-day source shared with the TIME_OF_DAY broadcast.
pub struct WorldClock {
    start: Instant,
}

impl WorldClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds into the current day, in `[0, DAY_LENGTH_SECONDS)`.
    pub fn time_of_day(&self) -> u64 {
        self.start.elapsed().as_secs() % DAY_LENGTH_SECONDS
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_stays_in_range() {
        let clock = WorldClock::new();
        assert!(clock.time_of_day() < DAY_LENGTH_SECONDS);
    }
}
