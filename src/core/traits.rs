//! Core traits - abstractions over the host environment
//!
//! The session and scheduler never read the wall clock directly. The host
//! passes a `Clock`; tests pass a `MockClock` they advance by hand.

use std::time::Instant;

// =============================================================================
// CLOCK
// =============================================================================

/// Source of the current time
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Real monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// =============================================================================
// TEST MOCKS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::mocks::MockClock;
    use super::*;

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.advance_ms(250);
        assert_eq!(clock.now() - start, std::time::Duration::from_millis(250));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
