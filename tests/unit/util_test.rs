//! Tests for utility functions

use std::time::{Duration, Instant};

use prometheus_task_queue::util::{duration_ms, elapsed_ms, init_tracing};

#[test]
fn test_duration_ms_saturates() {
    assert_eq!(duration_ms(Duration::from_secs(2)), 2_000);
    assert_eq!(duration_ms(Duration::MAX), u64::MAX);
}

#[test]
fn test_elapsed_ms() {
    let origin = Instant::now();
    assert_eq!(elapsed_ms(origin, origin + Duration::from_millis(7)), 7);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
