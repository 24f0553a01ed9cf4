//! Loop counter deciding when the next scheduled image is due.

/// Iteration counter in `[0, period)`.
///
/// An image is due whenever the counter reads zero: on the first iteration,
/// after a wrap, and after a button press rewinds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopCounter {
    value: u32,
    period: u32,
}

impl LoopCounter {
    /// Counter at zero; `period` is clamped to at least one tick.
    pub const fn new(period: u32) -> Self {
        Self {
            value: 0,
            period: if period == 0 { 1 } else { period },
        }
    }

    /// Current value.
    #[inline]
    pub const fn value(&self) -> u32 { self.value }

    /// Ticks per cycle.
    #[inline]
    pub const fn period(&self) -> u32 { self.period }

    /// Whether this iteration should display an image.
    #[inline]
    pub const fn is_due(&self) -> bool { self.value == 0 }

    /// Count one completed iteration, wrapping at the period.
    pub fn advance(&mut self) {
        self.value += 1;
        if self.value >= self.period {
            self.value = 0;
        }
    }

    /// Force the next check to report an image as due.
    pub fn rewind(&mut self) { self.value = 0; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_due() {
        let counter = LoopCounter::new(2880);
        assert!(counter.is_due());
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_wraps_at_period() {
        let mut counter = LoopCounter::new(3);
        let seen: Vec<u32> = (0..7)
            .map(|_| {
                let value = counter.value();
                counter.advance();
                value
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_stays_below_period() {
        let mut counter = LoopCounter::new(5);
        for _ in 0..50 {
            counter.advance();
            assert!(counter.value() < counter.period());
        }
    }

    #[test]
    fn test_rewind_from_any_value() {
        let mut counter = LoopCounter::new(10);
        for _ in 0..7 {
            counter.advance();
        }
        assert!(!counter.is_due());
        counter.rewind();
        assert!(counter.is_due());
    }

    #[test]
    fn test_period_of_one_is_always_due() {
        let mut counter = LoopCounter::new(1);
        counter.advance();
        assert!(counter.is_due());
        assert_eq!(LoopCounter::new(0).period(), 1);
    }
}
