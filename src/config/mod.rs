//! Configuration models for schedulers.

pub mod queue;

pub use queue::{QueueConfig, SchedulerConfig, CONCURRENCY_ENV};
