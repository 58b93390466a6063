//! Error types for scheduler operations and task outcomes.

use std::sync::Arc;

use thiserror::Error;

/// Errors produced while building or configuring a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Concurrency must allow at least one running task.
    #[error("invalid concurrency: {0}")]
    InvalidConcurrency(usize),
    /// Configuration could not be parsed or validated.
    #[error("config error: {0}")]
    Config(String),
    /// Runtime adapter failure with context.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Failure reason carried by a task's deferred result.
///
/// Cheap to clone so that every observer of a settled task sees the same reason.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The work's own future resolved to an error.
    #[error("task failed: {0}")]
    Failed(Arc<anyhow::Error>),
    /// The work panicked, either while being called or while being polled.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The settle handle was dropped before the task produced an outcome.
    #[error("task abandoned before it settled")]
    Abandoned,
    /// The task's work had already been taken by an earlier resume.
    #[error("task already resumed")]
    AlreadyResumed,
}

impl TaskError {
    /// Wrap an application error as a task failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(err.into()))
    }

    /// Build a [`TaskError::Panicked`] from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked(message)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Outcome delivered to everyone observing a task.
pub type TaskResult<T> = Result<T, TaskError>;
