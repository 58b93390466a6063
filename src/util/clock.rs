//! Clock helpers shared by the scheduler and its tests.

use std::time::{Duration, Instant};

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds elapsed from `origin` to `at`, zero if `at` precedes `origin`.
#[must_use]
pub fn elapsed_ms(origin: Instant, at: Instant) -> u64 {
    duration_ms(at.saturating_duration_since(origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_truncates_sub_millisecond_part() {
        assert_eq!(duration_ms(Duration::from_micros(2_999)), 2);
        assert_eq!(duration_ms(Duration::ZERO), 0);
    }

    #[test]
    fn elapsed_ms_saturates_backwards() {
        let origin = Instant::now();
        let later = origin + Duration::from_millis(25);
        assert_eq!(elapsed_ms(origin, later), 25);
        assert_eq!(elapsed_ms(later, origin), 0);
    }
}
