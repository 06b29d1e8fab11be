//! Single-assignment result cells for asynchronous workflow operations.
//!
//! A [`WorkflowFuture`] is created when an operation is initiated and resolves
//! exactly once. The await handles returned by [`WorkflowFuture::get`] and
//! [`WorkflowFuture::wait`] do not register wakers: the owning scheduler
//! re-polls the workflow task after every completion delivery, so a pending
//! poll simply yields the coroutine back to that scheduler's turn loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::FusedFuture;

use crate::errors::{Failure, WorkflowError};
use crate::history::EventTarget;

/// Lifecycle of a future. Transitions are one-directional:
/// `Pending -> {Fulfilled | Failed | Cancelled}`, never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Fulfilled,
    Failed,
    Cancelled,
}

/// Resolved outcome of a workflow future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Value(String),
    Failed(Failure),
    Cancelled { details: String },
}

impl Outcome {
    /// Surface the outcome in the calling convention of `get`: the value, or
    /// the captured failure. Cancellation stays a distinct error kind.
    pub fn as_result(&self) -> Result<String, WorkflowError> {
        match self {
            Outcome::Value(value) => Ok(value.clone()),
            Outcome::Failed(failure) => Err(WorkflowError::Application {
                reason: failure.reason.clone(),
                details: failure.details.clone(),
            }),
            Outcome::Cancelled { details } => Err(WorkflowError::Canceled {
                details: details.clone(),
            }),
        }
    }
}

type Callback = Box<dyn FnOnce(&Outcome) + Send>;

struct FutureCell {
    outcome: Option<Outcome>,
    callbacks: Vec<Callback>,
}

/// Single-assignment handle to the eventual result of one asynchronous
/// operation.
///
/// The future exclusively owns its [`EventTarget`]; the execution's
/// outstanding-operations registry and the awaiting coroutine share the
/// resolution cell. `cancelation_id` is the registry key and may differ from
/// the target id when the caller supplied a custom id.
#[derive(Clone)]
pub struct WorkflowFuture {
    target: EventTarget,
    cancelation_id: String,
    cell: Arc<Mutex<FutureCell>>,
}

impl WorkflowFuture {
    pub fn new(target: EventTarget, cancelation_id: impl Into<String>) -> Self {
        Self {
            target,
            cancelation_id: cancelation_id.into(),
            cell: Arc::new(Mutex::new(FutureCell {
                outcome: None,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn cancelation_id(&self) -> &str {
        &self.cancelation_id
    }

    pub fn state(&self) -> FutureState {
        let cell = self.cell.lock().expect("future cell lock poisoned");
        match cell.outcome {
            None => FutureState::Pending,
            Some(Outcome::Value(_)) => FutureState::Fulfilled,
            Some(Outcome::Failed(_)) => FutureState::Failed,
            Some(Outcome::Cancelled { .. }) => FutureState::Cancelled,
        }
    }

    pub fn finished(&self) -> bool {
        self.state() != FutureState::Pending
    }

    /// Terminal-failure state without consuming the outcome.
    pub fn failed(&self) -> bool {
        self.state() == FutureState::Failed
    }

    pub fn canceled(&self) -> bool {
        self.state() == FutureState::Cancelled
    }

    /// The resolved outcome, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        self.cell
            .lock()
            .expect("future cell lock poisoned")
            .outcome
            .clone()
    }

    /// Suspend until terminal, then return the value or the captured failure.
    /// Returns immediately on every call after resolution.
    pub fn get(&self) -> GetFuture {
        GetFuture {
            cell: Arc::clone(&self.cell),
            done: false,
        }
    }

    /// Suspend until terminal, discarding the result. Used for
    /// fire-and-forget joins.
    pub fn wait(&self) -> WaitFuture {
        WaitFuture {
            cell: Arc::clone(&self.cell),
            done: false,
        }
    }

    /// Run `callback` when the future resolves, or immediately if it already
    /// has. Callbacks fire exactly once, in registration order, synchronously
    /// with the resolving transition.
    pub fn add_callback(&self, callback: impl FnOnce(&Outcome) + Send + 'static) {
        let outcome = {
            let mut cell = self.cell.lock().expect("future cell lock poisoned");
            match cell.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    cell.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&outcome);
    }

    pub(crate) fn set(&self, value: impl Into<String>) {
        self.resolve(Outcome::Value(value.into()));
    }

    pub(crate) fn fail(&self, failure: Failure) {
        self.resolve(Outcome::Failed(failure));
    }

    pub(crate) fn cancel(&self, details: impl Into<String>) {
        self.resolve(Outcome::Cancelled {
            details: details.into(),
        });
    }

    fn resolve(&self, outcome: Outcome) {
        let callbacks = {
            let mut cell = self.cell.lock().expect("future cell lock poisoned");
            if cell.outcome.is_some() {
                // One-directional transitions: a second resolution is a
                // programming error, not a condition to recover from.
                panic!("future {} already resolved", self.target);
            }
            cell.outcome = Some(outcome.clone());
            std::mem::take(&mut cell.callbacks)
        };
        // Lock released before user callbacks run so they may inspect the
        // future they were registered on.
        for callback in callbacks {
            callback(&outcome);
        }
    }
}

impl std::fmt::Debug for WorkflowFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowFuture")
            .field("target", &self.target)
            .field("cancelation_id", &self.cancelation_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Await handle produced by [`WorkflowFuture::get`].
#[must_use = "futures do nothing unless awaited"]
pub struct GetFuture {
    cell: Arc<Mutex<FutureCell>>,
    done: bool,
}

impl Future for GetFuture {
    type Output = Result<String, WorkflowError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = {
            let cell = this.cell.lock().expect("future cell lock poisoned");
            cell.outcome.clone()
        };
        match outcome {
            Some(outcome) => {
                this.done = true;
                Poll::Ready(outcome.as_result())
            }
            None => Poll::Pending,
        }
    }
}

impl FusedFuture for GetFuture {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

/// Await handle produced by [`WorkflowFuture::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct WaitFuture {
    cell: Arc<Mutex<FutureCell>>,
    done: bool,
}

impl Future for WaitFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let resolved = {
            let cell = this.cell.lock().expect("future cell lock poisoned");
            cell.outcome.is_some()
        };
        if resolved {
            this.done = true;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl FusedFuture for WaitFuture {
    fn is_terminated(&self) -> bool {
        self.done
    }
}
