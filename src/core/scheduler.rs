//! Concurrency-limited scheduler with delayed starts.
//!
//! A [`Scheduler`] lets at most `concurrency` submitted futures run at once.
//! Work that cannot start right away, or that asks for a start delay, waits in
//! a backlog ordered by eligibility stamp. A single wake-up timer is kept
//! armed for the earliest stamp that is still in the future.
//!
//! # State machine
//!
//! - **add**: start immediately if a slot is free and no delay was asked for,
//!   otherwise queue and re-evaluate.
//! - **re-evaluate** (on every completion, timer tick, queue insert or
//!   concurrency change): release slots, start every eligible task that fits,
//!   then keep one timer armed for the next future stamp.
//! - **unblock**: lend the caller's slot to the backlog while it awaits a
//!   nested future, and take it back when that future completes.
//!
//! All bookkeeping sits behind one mutex. Work, observers and spawned drivers
//! never run while it is held.
//!
//! Dropping every [`Scheduler`] handle does not cancel anything: running work
//! and the armed timer each keep the queue alive, so backlogged work still
//! starts when its turn comes. Only a scheduler that can never admit again
//! (zero concurrency) releases its backlog, failing it with
//! [`TaskError::Abandoned`](crate::core::TaskError::Abandoned).
//!
//! ```rust,ignore
//! use prometheus_task_queue::core::Scheduler;
//! use prometheus_task_queue::runtime::TokioSpawner;
//!
//! let scheduler = Scheduler::new(TokioSpawner::current()?, 3);
//! let first = scheduler.add(|| async { Ok(fetch("a").await?) });
//! let later = scheduler.add_delayed(|| async { Ok(fetch("b").await?) }, Duration::from_secs(1));
//! let (a, b) = tokio::join!(first, later);
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{AbortHandle, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::QueueConfig;
use crate::core::backlog::{Backlog, Stamped};
use crate::core::deferred::Deferred;
use crate::core::error::{AppResult, SchedulerError};
use crate::core::spawn::{Clock, Spawn};
use crate::core::task::{try_finally, QueuedTask, Task, TaskId, Work};
use crate::infra::queue::InMemoryBacklog;
use crate::util::clock::{duration_ms, elapsed_ms};

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Current concurrency ceiling.
    pub concurrency: usize,
    /// Slots currently occupied.
    pub busy: usize,
    /// Tasks waiting in the backlog.
    pub queued: usize,
    /// Stamp (scheduler ms) the wake-up timer is armed for, if any.
    pub timer_stamp: Option<u64>,
    /// Total tasks submitted.
    pub submitted: u64,
    /// Tasks that settled successfully.
    pub completed: u64,
    /// Tasks that settled with an error.
    pub failed: u64,
}

struct ArmedTimer {
    stamp: u64,
    abort: AbortHandle,
}

struct State<B> {
    concurrency: usize,
    busy: usize,
    backlog: B,
    timer: Option<ArmedTimer>,
    submitted: u64,
    completed: u64,
    failed: u64,
}

struct Inner<R, B> {
    runtime: R,
    epoch: Instant,
    next_id: AtomicU64,
    state: Mutex<State<B>>,
}

/// Concurrency-limited, time-aware task scheduler.
///
/// Cloning is cheap and every clone drives the same queue.
pub struct Scheduler<R, B = InMemoryBacklog<QueuedTask>> {
    inner: Arc<Inner<R, B>>,
}

impl<R, B> Clone for Scheduler<R, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> Scheduler<R>
where
    R: Spawn + Clock + Send + Sync + 'static,
{
    /// Create a scheduler running at most `concurrency` tasks at once.
    ///
    /// A concurrency of zero is accepted but nothing will ever start; use
    /// [`Scheduler::from_config`] to have it rejected.
    pub fn new(runtime: R, concurrency: usize) -> Self {
        Self::with_backlog(runtime, concurrency, InMemoryBacklog::new())
    }

    /// Create a scheduler from validated queue configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] for a zero concurrency.
    pub fn from_config(config: &QueueConfig, runtime: R) -> Result<Self, SchedulerError> {
        if config.concurrency == 0 {
            return Err(SchedulerError::InvalidConcurrency(config.concurrency));
        }
        Ok(Self::new(runtime, config.concurrency))
    }
}

impl<R, B> Scheduler<R, B>
where
    R: Spawn + Clock + Send + Sync + 'static,
    B: Backlog<QueuedTask> + 'static,
{
    /// Create a scheduler on top of a custom backlog.
    pub fn with_backlog(runtime: R, concurrency: usize, backlog: B) -> Self {
        let epoch = runtime.now();
        Self {
            inner: Arc::new(Inner {
                runtime,
                epoch,
                next_id: AtomicU64::new(1),
                state: Mutex::new(State {
                    concurrency,
                    busy: 0,
                    backlog,
                    timer: None,
                    submitted: 0,
                    completed: 0,
                    failed: 0,
                }),
            }),
        }
    }

    /// Submit `work` to start as soon as a slot is free.
    ///
    /// With a free slot `work` is called before this returns; otherwise it is
    /// queued behind everything already waiting.
    pub fn add<T, F, Fut>(&self, work: F) -> Deferred<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        self.add_delayed(work, Duration::ZERO)
    }

    /// Submit `work` to start no earlier than `delay` from now.
    pub fn add_delayed<T, F, Fut>(&self, work: F, delay: Duration) -> Deferred<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let work: Work<T> = Box::new(move || work().boxed());

        let admitted = {
            let mut state = self.inner.state.lock();
            state.submitted += 1;
            let admit = delay.is_zero() && state.busy < state.concurrency;
            if admit {
                state.busy += 1;
            }
            admit
        };

        if admitted {
            tracing::info!("task {} started immediately", id);
            let (outcome, settler) = Deferred::pending();
            let execution = try_finally(work, self.finish_hook(id), outcome, settler);
            self.track(&execution.outcome, id);
            self.inner.runtime.spawn(execution.driver);
            return execution.outcome;
        }

        let stamp = self.now_ms().saturating_add(duration_ms(delay));
        let mut task = Task::new(id, stamp, work);
        let outcome = task.delay();
        self.track(&outcome, id);
        self.inner.state.lock().backlog.insert(QueuedTask::new(task));
        tracing::debug!("task {} queued for stamp {}", id, stamp);

        self.reevaluate(0);
        outcome
    }

    /// Treat the calling task as idle until `fut` completes.
    ///
    /// Frees the caller's slot right away so queued work (typically a nested
    /// submission to this same scheduler) can start, and takes the slot back
    /// once `fut` completes or is dropped. The output of `fut` is passed
    /// through unchanged.
    ///
    /// Only call this from work this scheduler is running; the slot it lends
    /// is the caller's own.
    ///
    /// ```rust,ignore
    /// let outer = scheduler.clone();
    /// scheduler.add(move || async move {
    ///     let inner = outer.add(|| async { Ok(2) });
    ///     let value = outer.unblock(inner).await?;
    ///     Ok(value * 21)
    /// });
    /// ```
    pub fn unblock<F>(&self, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        self.reevaluate(1);
        let loan = SlotLoan {
            scheduler: self.clone(),
        };
        async move {
            let output = fut.await;
            drop(loan);
            output
        }
    }

    /// Wrap `func` so every call goes through [`Scheduler::add`].
    pub fn wrap<A, T, F, Fut>(&self, func: F) -> impl Fn(A) -> Deferred<T> + Clone + Send + Sync + 'static
    where
        A: Send + 'static,
        T: Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let scheduler = self.clone();
        let func = Arc::new(func);
        move |args: A| {
            let func = Arc::clone(&func);
            scheduler.add(move || func(args))
        }
    }

    /// Like [`Scheduler::wrap`], binding a shared `context` passed to every call.
    pub fn wrap_with<C, A, T, F, Fut>(
        &self,
        context: Arc<C>,
        func: F,
    ) -> impl Fn(A) -> Deferred<T> + Clone + Send + Sync + 'static
    where
        C: Send + Sync + 'static,
        A: Send + 'static,
        T: Send + Sync + 'static,
        F: Fn(Arc<C>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        self.wrap(move |args: A| func(Arc::clone(&context), args))
    }

    /// Current concurrency ceiling.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.state.lock().concurrency
    }

    /// Change the concurrency ceiling.
    ///
    /// Raising it starts eligible queued work immediately. Lowering it never
    /// interrupts running work; it only holds back new admissions.
    pub fn set_concurrency(&self, concurrency: usize) {
        self.inner.state.lock().concurrency = concurrency;
        tracing::info!("concurrency set to {}", concurrency);
        self.reevaluate(0);
    }

    /// Snapshot of the scheduler's counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock();
        SchedulerStats {
            concurrency: state.concurrency,
            busy: state.busy,
            queued: state.backlog.len(),
            timer_stamp: state.timer.as_ref().map(|t| t.stamp),
            submitted: state.submitted,
            completed: state.completed,
            failed: state.failed,
        }
    }

    /// Milliseconds elapsed on the scheduler clock since construction.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        elapsed_ms(self.inner.epoch, self.inner.runtime.now())
    }

    fn finish_hook(&self, id: TaskId) -> impl FnOnce() + Send + 'static {
        let scheduler = self.clone();
        move || {
            tracing::debug!("task {} released its slot", id);
            scheduler.reevaluate(1);
        }
    }

    /// Count the outcome of a task once it settles.
    fn track<T>(&self, outcome: &Deferred<T>, id: TaskId)
    where
        T: Send + Sync + 'static,
    {
        // Weak: queued tasks own this observer, and the scheduler owns them.
        let inner = Arc::downgrade(&self.inner);
        outcome.on_settle(move |result| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut state = inner.state.lock();
            match result {
                Ok(_) => state.completed += 1,
                Err(err) => {
                    state.failed += 1;
                    drop(state);
                    tracing::warn!("task {} failed: {}", id, err);
                }
            }
        });
    }

    /// Admission re-evaluation after `released` slots were given back.
    fn reevaluate(&self, released: usize) {
        let now = self.now_ms();
        let mut ready = Vec::new();
        let mut timer = None;
        {
            let mut state = self.inner.state.lock();
            state.busy = state.busy.saturating_sub(released);

            while state.busy < state.concurrency {
                let Some(stamp) = state.backlog.peek_min().map(Stamped::stamp) else {
                    break;
                };
                if stamp > now {
                    if state.timer.as_ref().is_none_or(|armed| stamp < armed.stamp) {
                        timer = Some(self.arm_timer(&mut state, stamp, now));
                    }
                    break;
                }
                let Some(task) = state.backlog.extract_min() else {
                    break;
                };
                state.busy += 1;
                ready.push(task);
            }
        }

        if let Some(timer) = timer {
            self.inner.runtime.spawn(timer);
        }
        for task in ready {
            let id = task.id();
            tracing::info!("woke and started task {}", id);
            let driver = task.resume(self.finish_hook(id));
            self.inner.runtime.spawn(driver);
        }
    }

    /// Replace the armed timer with one firing at `stamp`. The returned
    /// future must be spawned once the state lock is released.
    ///
    /// The timer holds a strong handle until it fires or is cancelled.
    fn arm_timer(&self, state: &mut State<B>, stamp: u64, now: u64) -> BoxFuture<'static, ()> {
        if let Some(previous) = state.timer.take() {
            previous.abort.abort();
            tracing::debug!("cancelled wake-up timer for stamp {}", previous.stamp);
        }
        let wait = Duration::from_millis(stamp.saturating_sub(now));
        let (sleep, abort) = futures::future::abortable(self.inner.runtime.sleep(wait));
        state.timer = Some(ArmedTimer { stamp, abort });
        tracing::debug!("armed wake-up timer for stamp {} ({:?})", stamp, wait);

        let scheduler = self.clone();
        async move {
            if sleep.await.is_ok() {
                scheduler.on_timer(stamp);
            }
        }
        .boxed()
    }

    fn on_timer(&self, stamp: u64) {
        {
            let mut state = self.inner.state.lock();
            if state.timer.as_ref().is_none_or(|armed| armed.stamp != stamp) {
                return;
            }
            state.timer = None;
        }
        tracing::debug!("wake-up timer for stamp {} fired", stamp);
        self.reevaluate(0);
    }

    fn reclaim_slot(&self) {
        self.inner.state.lock().busy += 1;
    }
}

/// Gives a lent slot back to its scheduler when dropped.
struct SlotLoan<R, B>
where
    R: Spawn + Clock + Send + Sync + 'static,
    B: Backlog<QueuedTask> + 'static,
{
    scheduler: Scheduler<R, B>,
}

impl<R, B> Drop for SlotLoan<R, B>
where
    R: Spawn + Clock + Send + Sync + 'static,
    B: Backlog<QueuedTask> + 'static,
{
    fn drop(&mut self) {
        self.scheduler.reclaim_slot();
    }
}
