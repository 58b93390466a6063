//! Single-shot deferred results.
//!
//! A [`Deferred`] is settled exactly once, either with a value or a
//! [`TaskError`], through its paired [`Settler`]. Any number of parties can
//! observe the outcome:
//!
//! - `.await` the deferred (requires `T: Clone`, every awaiter gets a copy);
//! - attach callbacks with [`Deferred::observe`], [`Deferred::on_settle`] or
//!   [`Deferred::finally`]. Callbacks attached after settlement still run,
//!   immediately, on the attaching thread.
//!
//! ```rust,ignore
//! let (deferred, settler) = Deferred::<u32>::pending();
//! deferred.finally(|| tracing::debug!("settled"));
//! settler.settle(7);
//! assert_eq!(deferred.await.unwrap(), 7);
//! ```

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, Waker};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::core::error::{TaskError, TaskResult};

type Observer<T> = Box<dyn FnOnce(&TaskResult<T>) + Send>;

struct Waiting<T> {
    observers: Vec<Observer<T>>,
    wakers: Vec<Waker>,
    /// Thread running the settlement passed to [`Deferred::new`], whose
    /// panic payload is recorded there rather than by the settler's drop.
    settling_on: Option<ThreadId>,
}

struct Shared<T> {
    outcome: OnceLock<TaskResult<T>>,
    waiting: Mutex<Waiting<T>>,
}

impl<T> Shared<T> {
    /// Store the outcome and release everyone waiting on it.
    /// Returns false if the outcome was already set.
    fn complete(&self, outcome: TaskResult<T>) -> bool {
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        let (observers, wakers) = {
            let mut waiting = self.waiting.lock();
            (
                std::mem::take(&mut waiting.observers),
                std::mem::take(&mut waiting.wakers),
            )
        };
        if let Some(outcome) = self.outcome.get() {
            for observer in observers {
                run_observer(observer, outcome);
            }
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

fn run_observer<T>(observer: Observer<T>, outcome: &TaskResult<T>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(outcome))) {
        let err = TaskError::from_panic(payload.as_ref());
        tracing::error!("deferred observer panicked: {}", err);
    }
}

/// Shared handle to a result that settles once.
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
}

/// Write side of a [`Deferred`]. Consumed by settling.
///
/// Dropping an unsettled `Settler` fails the deferred with
/// [`TaskError::Abandoned`] (or [`TaskError::Panicked`] during unwinding) so
/// observers never wait forever.
pub struct Settler<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Deferred<T>
where
    T: Send + Sync + 'static,
{
    /// Create an unsettled deferred together with its settle handle.
    #[must_use]
    pub fn pending() -> (Self, Settler<T>) {
        let shared = Arc::new(Shared {
            outcome: OnceLock::new(),
            waiting: Mutex::new(Waiting {
                observers: Vec::new(),
                wakers: Vec::new(),
                settling_on: None,
            }),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Settler {
                shared: Some(shared),
            },
        )
    }

    /// Create a deferred and hand its settler to `settlement`.
    ///
    /// A panic inside `settlement` fails the deferred with
    /// [`TaskError::Panicked`] carrying the panic message, unless it was
    /// already settled.
    pub fn new<F>(settlement: F) -> Self
    where
        F: FnOnce(Settler<T>),
    {
        let (deferred, settler) = Self::pending();
        deferred.shared.waiting.lock().settling_on = Some(thread::current().id());
        let result = catch_unwind(AssertUnwindSafe(|| settlement(settler)));
        deferred.shared.waiting.lock().settling_on = None;
        if let Err(payload) = result {
            deferred
                .shared
                .complete(Err(TaskError::from_panic(payload.as_ref())));
        }
        deferred
    }

    /// An already-successful deferred.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// An already-failed deferred.
    #[must_use]
    pub fn rejected(reason: TaskError) -> Self {
        Self::settled(Err(reason))
    }

    /// An already-settled deferred with the given outcome.
    #[must_use]
    pub fn settled(outcome: TaskResult<T>) -> Self {
        let (deferred, settler) = Self::pending();
        settler.complete(outcome);
        deferred
    }

    /// Run `on_ok` or `on_err` once the outcome is known.
    pub fn observe<S, F>(&self, on_ok: S, on_err: F)
    where
        S: FnOnce(&T) + Send + 'static,
        F: FnOnce(&TaskError) + Send + 'static,
    {
        self.on_settle(move |outcome| match outcome {
            Ok(value) => on_ok(value),
            Err(reason) => on_err(reason),
        });
    }

    /// Run `observer` with the outcome once it is known.
    pub fn on_settle<F>(&self, observer: F)
    where
        F: FnOnce(&TaskResult<T>) + Send + 'static,
    {
        let observer: Observer<T> = Box::new(observer);
        let observer = {
            let mut waiting = self.shared.waiting.lock();
            if self.shared.outcome.get().is_none() {
                waiting.observers.push(observer);
                return;
            }
            observer
        };
        if let Some(outcome) = self.shared.outcome.get() {
            run_observer(observer, outcome);
        }
    }

    /// Run `handler` after settlement, whatever the outcome.
    pub fn finally<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_settle(move |_| handler());
    }
}

impl<T> Deferred<T> {
    /// Whether an outcome has been stored.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// Borrow the outcome if it has been stored.
    #[must_use]
    pub fn outcome(&self) -> Option<&TaskResult<T>> {
        self.shared.outcome.get()
    }

    /// Whether two handles refer to the same deferred.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}

impl<T: Clone> Future for Deferred<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.shared.outcome.get() {
            return Poll::Ready(outcome.clone());
        }
        let mut waiting = self.shared.waiting.lock();
        // settle stores the outcome before taking this lock to drain wakers
        if let Some(outcome) = self.shared.outcome.get() {
            return Poll::Ready(outcome.clone());
        }
        if !waiting.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            waiting.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.outcome.get() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T> Settler<T> {
    /// Resolve with `value`.
    pub fn settle(self, value: T) {
        self.complete(Ok(value));
    }

    /// Reject with `reason`.
    pub fn fail(self, reason: TaskError) {
        self.complete(Err(reason));
    }

    /// Settle with a ready-made outcome.
    pub fn complete(mut self, outcome: TaskResult<T>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(outcome);
        }
    }
}

impl<T> Drop for Settler<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let panicking = thread::panicking();
            if panicking && shared.waiting.lock().settling_on == Some(thread::current().id()) {
                return;
            }
            let reason = if panicking {
                TaskError::Panicked("settler dropped while unwinding".to_string())
            } else {
                TaskError::Abandoned
            };
            shared.complete(Err(reason));
        }
    }
}

impl<T> fmt::Debug for Settler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("consumed", &self.shared.is_none())
            .finish()
    }
}
