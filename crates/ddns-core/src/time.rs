//! Time abstraction for testability.
//!
//! The resolver pool reads the current time only through [`Clock`], so tests
//! can drive server-set expiration deterministically. [`Instant`] is used
//! because DNS answers report their expiry as an `Instant`.

use std::time::Instant;

/// Abstraction over monotonic time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Production clock delegating to [`Instant::now()`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let before = Instant::now();
        let first = clock.now();
        let second = clock.now();

        assert!(first >= before);
        assert!(second >= first);
    }
}
