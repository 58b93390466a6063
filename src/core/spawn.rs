//! Runtime seam: spawning driver futures and measuring time.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

/// Abstraction for spawning task execution on a runtime.
///
/// Implementations must hand the future to an executor rather than poll it
/// inline; the scheduler spawns from inside `add` and completion hooks and
/// expects them to return promptly.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Abstraction for the monotonic clock and timers used for delayed starts.
pub trait Clock {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// A future completing once `duration` has elapsed on this clock.
    ///
    /// The returned future may be created outside the runtime; it is only
    /// polled from a spawned task.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}
