//! The fundamental unit of time in the emulator.

/// A cumulative count of master clock ticks.
///
/// Time only moves forward: signed batch totals are folded in through
/// [`Ticks::advance`], which ignores anything that is not positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Convert a signed cycle amount into an elapsed amount.
    ///
    /// Returns `None` for zero or negative amounts, which never advance time.
    #[must_use]
    pub const fn elapsed(cycles: i64) -> Option<u32> {
        if cycles <= 0 {
            None
        } else if cycles > u32::MAX as i64 {
            Some(u32::MAX)
        } else {
            Some(cycles as u32)
        }
    }

    /// Add a signed batch total, ignoring non-positive amounts.
    pub fn advance(&mut self, cycles: i64) {
        if let Some(n) = Self::elapsed(cycles) {
            self.0 += u64::from(n);
        }
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl core::ops::Sub for Ticks {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}
