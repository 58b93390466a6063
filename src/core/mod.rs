//! Core scheduling abstractions and capacity accounting.

pub mod backlog;
pub mod deferred;
pub mod error;
pub mod scheduler;
pub mod spawn;
pub mod task;

pub use backlog::{Backlog, Stamped};
pub use deferred::{Deferred, Settler};
pub use error::{AppResult, SchedulerError, TaskError, TaskResult};
pub use scheduler::{Scheduler, SchedulerStats};
pub use spawn::{Clock, Spawn};
pub use task::{try_finally, Execution, QueuedTask, Task, TaskId, Work};
