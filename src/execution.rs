//! Outstanding-operation registry and external completion surface.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::debug;

use crate::errors::{Failure, WorkflowError};
use crate::future::{Outcome, WorkflowFuture};

/// The set of outstanding futures for one workflow execution, keyed by
/// cancelation id, plus the surface through which externally delivered
/// completions resolve them.
///
/// Entries are removed on resolution. The registry is mutated only by the
/// execution's own coroutine and by the completion-delivery mechanism, which
/// runs inside the same scheduler turn, never concurrently, so the mutex
/// here is uncontended by design.
#[derive(Default)]
pub struct WorkflowExecution {
    outstanding: Mutex<HashMap<String, WorkflowFuture>>,
    resolved_failures: Mutex<Vec<(String, Outcome)>>,
    completions: Notify,
}

impl WorkflowExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a pending future under its cancelation id. Registering a second
    /// future under an id already outstanding is a usage error.
    pub fn register_future(&self, future: WorkflowFuture) -> Result<WorkflowFuture, WorkflowError> {
        let id = future.cancelation_id().to_string();
        let mut outstanding = self.outstanding.lock().expect("registry lock poisoned");
        if outstanding.contains_key(&id) {
            return Err(WorkflowError::misuse(format!(
                "future already registered under cancelation id {id}"
            )));
        }
        outstanding.insert(id, future.clone());
        Ok(future)
    }

    /// Fulfil the outstanding future registered under `id`. Unknown ids are a
    /// usage error; use [`try_complete_future`](Self::try_complete_future)
    /// from delivery paths that may race a cancellation.
    pub fn complete_future(
        &self,
        id: &str,
        value: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let future = self.take(id)?;
        future.set(value);
        self.completions.notify_one();
        Ok(())
    }

    /// Lenient form of [`complete_future`](Self::complete_future): a
    /// completion for an id no longer outstanding is dropped with a debug
    /// log and `false`, matching duplicate-delivery semantics.
    pub fn try_complete_future(&self, id: &str, value: impl Into<String>) -> bool {
        match self.complete_future(id, value) {
            Ok(()) => true,
            Err(_) => {
                debug!(cancelation_id = %id, "ignoring completion for unknown or already-resolved future");
                false
            }
        }
    }

    /// Fail the outstanding future registered under `id` with a captured
    /// failure, waking any suspended waiter.
    pub fn fail_future(&self, id: &str, failure: Failure) -> Result<(), WorkflowError> {
        let future = self.take(id)?;
        future.fail(failure.clone());
        self.record_failure(id, Outcome::Failed(failure));
        self.completions.notify_one();
        Ok(())
    }

    /// Resolve the outstanding future registered under `id` with a
    /// cancellation, waking any suspended waiter. Canceling an id with no
    /// matching outstanding future (already resolved, or never registered)
    /// is an explicit usage error, never a silent no-op.
    pub fn cancel_future(&self, id: &str, details: impl Into<String>) -> Result<(), WorkflowError> {
        let future = self.take(id)?;
        let details = details.into();
        future.cancel(details.clone());
        self.record_failure(id, Outcome::Cancelled { details });
        self.completions.notify_one();
        Ok(())
    }

    pub fn has_outstanding(&self) -> bool {
        !self
            .outstanding
            .lock()
            .expect("registry lock poisoned")
            .is_empty()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding
            .lock()
            .expect("registry lock poisoned")
            .len()
    }

    /// Failures and cancellations resolved through this execution, kept for
    /// inspection even when no waiter consumed them.
    pub fn resolved_failures(&self) -> Vec<(String, Outcome)> {
        self.resolved_failures
            .lock()
            .expect("failure record lock poisoned")
            .clone()
    }

    /// Resolves on the next externally delivered completion. The scheduler
    /// awaits this between turns so deliveries are funneled through its turn,
    /// never applied concurrently with workflow code.
    pub async fn completion_delivered(&self) {
        self.completions.notified().await;
    }

    fn take(&self, id: &str) -> Result<WorkflowFuture, WorkflowError> {
        self.outstanding
            .lock()
            .expect("registry lock poisoned")
            .remove(id)
            .ok_or_else(|| {
                WorkflowError::misuse(format!("no outstanding future under cancelation id {id}"))
            })
    }

    fn record_failure(&self, id: &str, outcome: Outcome) {
        self.resolved_failures
            .lock()
            .expect("failure record lock poisoned")
            .push((id.to_string(), outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{EventCategory, EventTarget};

    fn future(id: u64, key: &str) -> WorkflowFuture {
        WorkflowFuture::new(EventTarget::new(id, EventCategory::Timer), key)
    }

    #[test]
    fn duplicate_registration_is_misuse() {
        let execution = WorkflowExecution::new();
        execution.register_future(future(1, "t1")).unwrap();
        let err = execution.register_future(future(2, "t1")).unwrap_err();
        assert!(matches!(err, WorkflowError::Misuse { .. }));
    }

    #[test]
    fn completion_removes_the_entry_and_resolves() {
        let execution = WorkflowExecution::new();
        let f = execution.register_future(future(1, "t1")).unwrap();
        execution.complete_future("t1", "done").unwrap();
        assert_eq!(f.outcome(), Some(Outcome::Value("done".into())));
        assert!(!execution.has_outstanding());
        // Second delivery finds nothing outstanding.
        assert!(!execution.try_complete_future("t1", "again"));
    }

    #[test]
    fn canceling_unknown_id_is_explicit() {
        let execution = WorkflowExecution::new();
        let err = execution.cancel_future("nope", "canceled").unwrap_err();
        assert!(matches!(err, WorkflowError::Misuse { .. }));
    }

    #[test]
    fn abandoned_failures_stay_recorded() {
        let execution = WorkflowExecution::new();
        execution.register_future(future(1, "a1")).unwrap();
        execution
            .fail_future("a1", Failure::new("boom_error", "boom"))
            .unwrap();
        let recorded = execution.resolved_failures();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "a1");
        assert_eq!(
            recorded[0].1,
            Outcome::Failed(Failure::new("boom_error", "boom"))
        );
    }
}
