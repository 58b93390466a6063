//! # Prometheus Task Queue
//!
//! Concurrency-limited, time-aware admission for asynchronous work.
//!
//! A [`Scheduler`](core::Scheduler) guarantees that at most `concurrency`
//! submitted futures are outstanding at once. Everything else waits in a
//! backlog ordered by the earliest time it may start, so callers can also ask
//! for a start delay. Each submission returns a [`Deferred`](core::Deferred)
//! that settles with the work's own outcome.
//!
//! ## Key Features
//!
//! - **Admission Control**: Immediate start when a slot is free, FIFO backlog otherwise
//! - **Delayed Starts**: Tasks can be held back until a future point in time
//! - **Single Wake-up Timer**: Only the earliest pending delay keeps a live timer
//! - **Failure Isolation**: Errors and panics settle the task's result and still free its slot
//! - **Slot Lending**: `unblock` lets a running task make nested calls into its own queue
//! - **Runtime Seam**: Spawning and timers go through the `Spawn`/`Clock` traits
//!
//! ## Scheduler
//!
//! ```rust,ignore
//! use prometheus_task_queue::core::Scheduler;
//! use prometheus_task_queue::runtime::TokioSpawner;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(TokioSpawner::current()?, 3);
//!
//! // Runs now if fewer than 3 tasks are outstanding, otherwise queues.
//! let page = scheduler.add(|| async { Ok(fetch_page(1).await?) });
//!
//! // Starts no earlier than 500ms from now.
//! let retry = scheduler.add_delayed(|| async { Ok(fetch_page(2).await?) }, Duration::from_millis(500));
//!
//! // Wrap a function so every call is admitted through the scheduler.
//! let limited_fetch = scheduler.wrap(|n: u32| async move { Ok(fetch_page(n).await?) });
//! let third = limited_fetch(3);
//!
//! let (page, retry, third) = tokio::join!(page, retry, third);
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use prometheus_task_queue::builders::build_schedulers;
//! use prometheus_task_queue::config::SchedulerConfig;
//!
//! let cfg = SchedulerConfig::from_json_str(r#"{ "queues": { "io": { "concurrency": 8 } } }"#)?;
//! let schedulers = build_schedulers(&cfg, &TokioSpawner::current()?)?;
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - Full integration tests

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for schedulers.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Infrastructure adapters for backlog storage.
pub mod infra;
/// Runtime adapters.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
