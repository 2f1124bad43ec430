//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. The CPU core
/// and every peripheral count in cycles of this clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (`16_777_216` for the handheld).
    pub frequency_hz: u64,
    /// Cycles in one video frame.
    pub cycles_per_frame: u64,
}

impl MasterClock {
    /// 2^24 Hz crystal; 228 lines of 1232 cycles per frame.
    pub const HANDHELD: Self = Self::new(16_777_216, 228 * 1232);

    #[must_use]
    pub const fn new(frequency_hz: u64, cycles_per_frame: u64) -> Self {
        Self {
            frequency_hz,
            cycles_per_frame,
        }
    }

    /// Ticks in one frame.
    #[must_use]
    pub const fn ticks_per_frame(&self) -> Ticks {
        Ticks::new(self.cycles_per_frame)
    }

    /// Frame rate in milli-hertz (integer division).
    #[must_use]
    pub const fn frame_rate_mhz(&self) -> u64 {
        self.frequency_hz * 1000 / self.cycles_per_frame
    }
}

#[cfg(test)]
mod tests {
    use super::MasterClock;

    #[test]
    fn handheld_frame_is_about_sixty_hertz() {
        let clock = MasterClock::HANDHELD;
        assert_eq!(clock.ticks_per_frame().get(), 280_896);
        assert_eq!(clock.frame_rate_mhz(), 59_727);
    }
}
