//! Deferred work items and the finally-wrapped execution path.

use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::core::backlog::Stamped;
use crate::core::deferred::{Deferred, Settler};
use crate::core::error::{AppResult, TaskError};

/// Identifier assigned to each submission, unique per scheduler.
pub type TaskId = u64;

/// Boxed zero-argument work producing a future of its result.
pub type Work<T> = Box<dyn FnOnce() -> BoxFuture<'static, AppResult<T>> + Send>;

/// A started piece of work.
pub struct Execution<T> {
    /// Settles with the work's outcome, after the finish hook has run.
    pub outcome: Deferred<T>,
    /// Drives the work to completion. Must be spawned for anything to happen.
    pub driver: BoxFuture<'static, ()>,
}

impl<T: Send + Sync + 'static> Execution<T> {
    fn already_resumed() -> Self {
        Self {
            outcome: Deferred::rejected(TaskError::AlreadyResumed),
            driver: futures::future::ready(()).boxed(),
        }
    }
}

/// Call `work` and build the driver that awaits it.
///
/// `on_finish` runs once the work's future settles, whatever the outcome,
/// and before `settler` publishes that outcome. A panic while calling `work`
/// or while polling its future becomes [`TaskError::Panicked`].
pub fn try_finally<T, F>(
    work: Work<T>,
    on_finish: F,
    outcome: Deferred<T>,
    settler: Settler<T>,
) -> Execution<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() + Send + 'static,
{
    let started = catch_unwind(AssertUnwindSafe(work));
    let driver = async move {
        let result = match started {
            Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::failed(err)),
                Err(payload) => Err(TaskError::from_panic(payload.as_ref())),
            },
            Err(payload) => Err(TaskError::from_panic(payload.as_ref())),
        };
        on_finish();
        settler.complete(result);
    }
    .boxed();
    Execution { outcome, driver }
}

/// Work waiting in the backlog until its stamp passes and a slot frees up.
pub struct Task<T> {
    id: TaskId,
    stamp: u64,
    work: Option<Work<T>>,
    deferred: Option<Deferred<T>>,
    settler: Option<Settler<T>>,
}

impl<T> Task<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap `work` to become eligible at scheduler time `stamp` (ms).
    #[must_use]
    pub fn new(id: TaskId, stamp: u64, work: Work<T>) -> Self {
        Self {
            id,
            stamp,
            work: Some(work),
            deferred: None,
            settler: None,
        }
    }

    /// Identifier of the submission.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The caller-facing deferred result.
    ///
    /// Created on first call; every later call returns the same deferred.
    pub fn delay(&mut self) -> Deferred<T> {
        if let Some(deferred) = &self.deferred {
            return deferred.clone();
        }
        let (deferred, settler) = Deferred::pending();
        self.deferred = Some(deferred.clone());
        self.settler = Some(settler);
        deferred
    }

    /// Start the work and call `on_finish` when it settles.
    ///
    /// The returned outcome is the same deferred [`Task::delay`] hands out.
    /// Only the first call runs the work; later calls return an execution
    /// already failed with [`TaskError::AlreadyResumed`].
    pub fn resume<F>(&mut self, on_finish: F) -> Execution<T>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(work) = self.work.take() else {
            return Execution::already_resumed();
        };
        let outcome = self.delay();
        let Some(settler) = self.settler.take() else {
            return Execution::already_resumed();
        };
        try_finally(work, on_finish, outcome, settler)
    }
}

impl<T> Stamped for Task<T> {
    fn stamp(&self) -> u64 {
        self.stamp
    }
}

/// Object-safe view of a [`Task`] so tasks of different result types share one backlog.
trait Resumable: Send {
    fn id(&self) -> TaskId;
    fn stamp(&self) -> u64;
    fn resume_boxed(self: Box<Self>, on_finish: Box<dyn FnOnce() + Send>) -> BoxFuture<'static, ()>;
}

impl<T> Resumable for Task<T>
where
    T: Send + Sync + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn stamp(&self) -> u64 {
        self.stamp
    }

    fn resume_boxed(mut self: Box<Self>, on_finish: Box<dyn FnOnce() + Send>) -> BoxFuture<'static, ()> {
        self.resume(on_finish).driver
    }
}

/// A type-erased task as stored in the scheduler's backlog.
pub struct QueuedTask {
    task: Box<dyn Resumable>,
}

impl QueuedTask {
    /// Erase the result type of `task`.
    #[must_use]
    pub fn new<T>(task: Task<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            task: Box::new(task),
        }
    }

    /// Identifier of the submission.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Start the task, returning the driver to spawn.
    pub fn resume<F>(self, on_finish: F) -> BoxFuture<'static, ()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.task.resume_boxed(Box::new(on_finish))
    }
}

impl Stamped for QueuedTask {
    fn stamp(&self) -> u64 {
        self.task.stamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn work<T: Send + 'static>(value: T) -> Work<T> {
        Box::new(move || async move { Ok::<T, anyhow::Error>(value) }.boxed())
    }

    #[test]
    fn test_delay_is_idempotent() {
        let mut task = Task::new(1, 0, work(5_u32));
        let first = task.delay();
        let second = task.delay();
        assert!(Deferred::ptr_eq(&first, &second));
        assert!(!first.is_settled());
    }

    #[tokio::test]
    async fn test_resume_forwards_value_after_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut task = Task::new(1, 0, work("hello".to_string()));
        let outward = task.delay();

        let f = Arc::clone(&finished);
        let execution = task.resume(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(Deferred::ptr_eq(&outward, &execution.outcome));

        let f = Arc::clone(&finished);
        outward.finally(move || assert_eq!(f.load(Ordering::SeqCst), 1));

        execution.driver.await;
        assert_eq!(outward.await.unwrap(), "hello");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resume_runs_work_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let mut task: Task<()> = Task::new(
            7,
            0,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), anyhow::Error>(()) }.boxed()
            }),
        );

        task.resume(|| {}).driver.await;
        let again = task.resume(|| panic!("finish hook must not run twice"));
        again.driver.await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(again.outcome.outcome(), Some(Err(TaskError::AlreadyResumed))));
    }

    #[tokio::test]
    async fn test_synchronous_panic_becomes_failure() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&finished);
        let (outcome, settler) = Deferred::<u8>::pending();
        let execution = try_finally(
            Box::new(|| -> BoxFuture<'static, AppResult<u8>> { panic!("Beep") }),
            move || {
                f.fetch_add(1, Ordering::SeqCst);
            },
            outcome,
            settler,
        );
        execution.driver.await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
        match execution.outcome.await {
            Err(TaskError::Panicked(message)) => assert_eq!(message, "Beep"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_error_is_forwarded() {
        let (outcome, settler) = Deferred::<u8>::pending();
        let execution = try_finally(
            Box::new(|| async { Err::<u8, _>(anyhow::anyhow!("Beep")) }.boxed()),
            || {},
            outcome,
            settler,
        );
        execution.driver.await;
        let err = execution.outcome.await.unwrap_err();
        assert_eq!(err.to_string(), "task failed: Beep");
    }

    #[test]
    fn test_dropping_unresumed_task_abandons() {
        let mut task = Task::new(1, 10, work(1_u8));
        let outward = task.delay();
        drop(QueuedTask::new(task));
        assert!(matches!(outward.outcome(), Some(Err(TaskError::Abandoned))));
    }

    #[test]
    fn test_queued_task_exposes_stamp_and_id() {
        let queued = QueuedTask::new(Task::new(42, 1_000, work(())));
        assert_eq!(queued.id(), 42);
        assert_eq!(queued.stamp(), 1_000);
    }
}
