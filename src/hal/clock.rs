//! Monotonic millisecond time source.

/// Monotonic millisecond tick counter
///
/// The counter may wrap; every comparison the driver makes uses wrapping
/// subtraction. Any `FnMut() -> u32` closure is a `Clock`, so a HAL timer can
/// be passed as `|| timer.now().ticks() as u32`.
pub trait Clock {
    /// Current tick in milliseconds
    fn now_ms(&mut self) -> u32;
}

impl<F: FnMut() -> u32> Clock for F {
    fn now_ms(&mut self) -> u32 {
        self()
    }
}

/// A bounded wait started at a known tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    start: u32,
    timeout_ms: u32,
}

impl Deadline {
    /// Create a deadline from an explicit start tick
    pub const fn new(start: u32, timeout_ms: u32) -> Self {
        Self { start, timeout_ms }
    }

    /// Start a deadline at the clock's current tick
    pub fn start<C: Clock + ?Sized>(clock: &mut C, timeout_ms: u32) -> Self {
        Self::new(clock.now_ms(), timeout_ms)
    }

    /// Milliseconds elapsed at tick `now`
    pub const fn elapsed_at(&self, now: u32) -> u32 {
        now.wrapping_sub(self.start)
    }

    /// Returns `true` once `timeout_ms` have elapsed at tick `now`
    pub const fn expired_at(&self, now: u32) -> bool {
        self.elapsed_at(now) >= self.timeout_ms
    }

    /// Returns `true` once the deadline has passed
    pub fn expired<C: Clock + ?Sized>(&self, clock: &mut C) -> bool {
        self.expired_at(clock.now_ms())
    }

    /// Milliseconds left at tick `now` (zero once expired)
    pub const fn remaining_at(&self, now: u32) -> u32 {
        self.timeout_ms.saturating_sub(self.elapsed_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_expires_after_timeout() {
        let d = Deadline::new(100, 50);
        assert!(!d.expired_at(100));
        assert!(!d.expired_at(149));
        assert!(d.expired_at(150));
        assert_eq!(d.remaining_at(120), 30);
        assert_eq!(d.remaining_at(500), 0);
    }

    #[test]
    fn deadline_survives_tick_wraparound() {
        let d = Deadline::new(u32::MAX - 10, 20);
        assert!(!d.expired_at(u32::MAX));
        assert!(!d.expired_at(5));
        assert!(d.expired_at(9));
    }

    #[test]
    fn closure_is_a_clock() {
        let mut t = 0u32;
        let mut clock = || {
            t += 7;
            t
        };
        let d = Deadline::start(&mut clock, 10);
        assert!(!d.expired(&mut clock));
        assert!(d.expired(&mut clock));
    }
}
