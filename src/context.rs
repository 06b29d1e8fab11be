//! The workflow execution context.
//!
//! One context exists per workflow execution and is exclusively owned by the
//! single cooperative coroutine running that workflow. Every asynchronous
//! operation the workflow performs goes through the context, which assigns it
//! a stable identity before any suspension: the event id comes from a
//! monotonic counter, so replaying the same code path against the same input
//! assigns the same id to the same logical operation. Time comes from the
//! execution's replay-consistent clock, never the live system clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;

use crate::activity::{LocalActivityInvoker, LocalInvocation};
use crate::errors::{Failure, FailureConverter, WorkflowError};
use crate::execution::WorkflowExecution;
use crate::future::WorkflowFuture;
use crate::history::{EventCategory, EventTarget};
use crate::metadata::{ActivityMetadata, WorkflowMetadata};
use crate::options::ActivityOptions;
use crate::registry::{ActivityRegistry, WorkflowRegistry};

/// Scheduling decision recorded by the context for the runtime to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    StartTimer {
        cancelation_id: String,
        fire_at_ms: u64,
    },
}

enum Terminal {
    Completed(String),
    Failed(Failure),
}

struct ContextInner {
    last_event_id: u64,
    now_ms: u64,
    commands: Vec<Command>,
    recorded_effects: Vec<String>,
    effect_cursor: usize,
    terminal: Option<Terminal>,
}

/// Outcome of [`WorkflowContext::execute_local_activity`].
#[derive(Debug)]
pub enum LocalActivityOutcome {
    /// The activity finished in-process; no future was created.
    Completed(String),
    /// The activity declared itself asynchronous; its future is registered
    /// under the activity id the same way remote activities are tracked.
    Deferred(WorkflowFuture),
}

/// Execution context bound to one workflow run.
///
/// Clones share state: handing a clone to workflow code and to the scheduler
/// is the intended ownership split. No lock in here is ever contended:
/// a single coroutine runs per execution, and completion delivery happens on
/// that coroutine's scheduler turns.
#[derive(Clone)]
pub struct WorkflowContext {
    execution: Arc<WorkflowExecution>,
    activities: ActivityRegistry,
    workflows: WorkflowRegistry,
    converter: FailureConverter,
    metadata: Arc<WorkflowMetadata>,
    inner: Arc<Mutex<ContextInner>>,
}

impl WorkflowContext {
    pub fn new(
        execution: Arc<WorkflowExecution>,
        metadata: WorkflowMetadata,
        activities: ActivityRegistry,
        workflows: WorkflowRegistry,
        converter: FailureConverter,
        started_at_ms: u64,
    ) -> Self {
        Self {
            execution,
            activities,
            workflows,
            converter,
            metadata: Arc::new(metadata),
            inner: Arc::new(Mutex::new(ContextInner {
                last_event_id: 0,
                now_ms: started_at_ms,
                commands: Vec::new(),
                recorded_effects: Vec::new(),
                effect_cursor: 0,
                terminal: None,
            })),
        }
    }

    /// Seed previously recorded side-effect values so a replay returns them
    /// without re-executing the blocks.
    pub fn with_recorded_effects(self, effects: Vec<String>) -> Self {
        {
            let mut inner = self.lock();
            inner.recorded_effects = effects;
            inner.effect_cursor = 0;
        }
        self
    }

    pub fn metadata(&self) -> &WorkflowMetadata {
        &self.metadata
    }

    pub fn headers(&self) -> &std::collections::HashMap<String, String> {
        &self.metadata.headers
    }

    pub fn execution(&self) -> Arc<WorkflowExecution> {
        Arc::clone(&self.execution)
    }

    /// The execution's replay-consistent clock, in milliseconds since epoch.
    /// Seeded at context creation and advanced by timer firings.
    pub fn now_ms(&self) -> u64 {
        self.lock().now_ms
    }

    pub fn last_event_id(&self) -> u64 {
        self.lock().last_event_id
    }

    /// Whether `release` is live for this execution. Pure lookup against the
    /// immutable disabled-release set, so branches taken on it replay
    /// identically.
    pub fn has_release(&self, release: &str) -> bool {
        !self.metadata.disabled_releases.contains(release)
    }

    /// Schedule an activity and return the future for its eventual result.
    ///
    /// The operation's full identity (event id, activity id, invocation
    /// metadata) is fixed before the handler runs. Activities that do not
    /// defer resolve the returned future before this call returns, firing any
    /// callbacks registered afterwards immediately.
    pub async fn execute_activity(
        &self,
        name: &str,
        input: impl Into<String>,
        options: ActivityOptions,
    ) -> Result<WorkflowFuture, WorkflowError> {
        let handler = self
            .activities
            .get(name)
            .ok_or_else(|| WorkflowError::misuse(format!("activity not registered: {name}")))?;
        let input = input.into();
        let event_id = self.next_event_id();
        let activity_id = options
            .activity_id
            .clone()
            .unwrap_or_else(|| event_id.to_string());
        let target = EventTarget::new(event_id, EventCategory::Activity);
        let future = WorkflowFuture::new(target, activity_id.clone());
        let metadata = self.activity_metadata(name, &activity_id, &options);

        match LocalActivityInvoker::invoke(handler.as_ref(), metadata, input).await {
            LocalInvocation::Deferred => self.execution.register_future(future),
            LocalInvocation::Completed(Ok(value)) => {
                future.set(value);
                Ok(future)
            }
            LocalInvocation::Completed(Err(failure)) => {
                future.fail(failure);
                Ok(future)
            }
        }
    }

    /// Resolved form of [`execute_activity`](Self::execute_activity):
    /// suspends until the result is available and re-raises the original
    /// error kind on failure.
    pub async fn execute_activity_sync(
        &self,
        name: &str,
        input: impl Into<String>,
        options: ActivityOptions,
    ) -> Result<String, WorkflowError> {
        let future = self.execute_activity(name, input, options).await?;
        match future.get().await {
            Ok(value) => Ok(value),
            Err(WorkflowError::Application { reason, details }) => {
                Err(self.converter.rehydrate(&reason, &details))
            }
            Err(other) => Err(other),
        }
    }

    /// Run an activity in-process. No future is created unless the activity
    /// reports itself asynchronous.
    pub async fn execute_local_activity(
        &self,
        name: &str,
        input: impl Into<String>,
        options: ActivityOptions,
    ) -> Result<LocalActivityOutcome, WorkflowError> {
        let handler = self
            .activities
            .get(name)
            .ok_or_else(|| WorkflowError::misuse(format!("activity not registered: {name}")))?;
        let input = input.into();
        let event_id = self.next_event_id();
        let activity_id = options
            .activity_id
            .clone()
            .unwrap_or_else(|| event_id.to_string());
        let metadata = self.activity_metadata(name, &activity_id, &options);

        match LocalActivityInvoker::invoke(handler.as_ref(), metadata, input).await {
            LocalInvocation::Deferred => {
                let target = EventTarget::new(event_id, EventCategory::Activity);
                let future = self
                    .execution
                    .register_future(WorkflowFuture::new(target, activity_id))?;
                Ok(LocalActivityOutcome::Deferred(future))
            }
            LocalInvocation::Completed(Ok(value)) => Ok(LocalActivityOutcome::Completed(value)),
            LocalInvocation::Completed(Err(failure)) => {
                Err(self.converter.rehydrate_failure(&failure))
            }
        }
    }

    /// Register a timer that resolves when it fires or is canceled. The id
    /// defaults to the assigned event id.
    pub fn start_timer(
        &self,
        delay: Duration,
        timer_id: Option<String>,
    ) -> Result<WorkflowFuture, WorkflowError> {
        let event_id = self.next_event_id();
        let timer_id = timer_id.unwrap_or_else(|| event_id.to_string());
        let target = EventTarget::new(event_id, EventCategory::Timer);
        let future = self
            .execution
            .register_future(WorkflowFuture::new(target, timer_id.clone()))?;
        let mut inner = self.lock();
        let fire_at_ms = inner.now_ms + delay.as_millis() as u64;
        inner.commands.push(Command::StartTimer {
            cancelation_id: timer_id,
            fire_at_ms,
        });
        Ok(future)
    }

    /// Resolve an outstanding timer with a cancellation failure, waking any
    /// suspended waiter. Unknown or already-resolved timers are a usage
    /// error.
    pub fn cancel_timer(&self, timer_id: &str) -> Result<(), WorkflowError> {
        self.execution.cancel_future(timer_id, "timer canceled")?;
        self.lock().commands.retain(|command| match command {
            Command::StartTimer { cancelation_id, .. } => cancelation_id != timer_id,
        });
        Ok(())
    }

    pub fn cancel_activity(&self, _activity_id: &str) -> Result<(), WorkflowError> {
        Err(WorkflowError::not_supported("cancel_activity"))
    }

    /// Cancel the outstanding operation behind `target`. Categories with no
    /// cancellation semantics are a misuse error.
    pub fn cancel(&self, target: &EventTarget, cancelation_id: &str) -> Result<(), WorkflowError> {
        match target.category() {
            EventCategory::Activity => self.cancel_activity(cancelation_id),
            EventCategory::Timer => self.cancel_timer(cancelation_id),
            other => Err(WorkflowError::misuse(format!(
                "{} target can not be canceled",
                other.as_str()
            ))),
        }
    }

    /// Run `effect` once and record its value; a replaying context returns
    /// the recorded value without re-executing the block.
    pub fn side_effect(&self, effect: impl FnOnce() -> String) -> String {
        {
            let mut inner = self.lock();
            if inner.effect_cursor < inner.recorded_effects.len() {
                let value = inner.recorded_effects[inner.effect_cursor].clone();
                inner.effect_cursor += 1;
                return value;
            }
        }
        // Lock released while user code runs; single-coroutine discipline
        // keeps the cursor stable across the gap.
        let value = effect();
        let mut inner = self.lock();
        inner.recorded_effects.push(value.clone());
        inner.effect_cursor += 1;
        value
    }

    /// Side-effect values recorded so far, for the host to persist.
    pub fn recorded_effects(&self) -> Vec<String> {
        self.lock().recorded_effects.clone()
    }

    /// Suspend the workflow for `delay`.
    pub async fn sleep(&self, delay: Duration) -> Result<(), WorkflowError> {
        let timer = self.start_timer(delay, None)?;
        timer.wait().await;
        Ok(())
    }

    /// Suspend the workflow until `deadline_ms` on the execution clock. A
    /// deadline at or before `now` suspends nothing.
    pub async fn sleep_until(&self, deadline_ms: u64) -> Result<(), WorkflowError> {
        let delay_ms = deadline_ms.saturating_sub(self.now_ms());
        if delay_ms > 0 {
            self.sleep(Duration::from_millis(delay_ms)).await?;
        }
        Ok(())
    }

    /// Suspend until `future` is terminal.
    pub async fn wait_for(&self, future: &WorkflowFuture) {
        future.wait().await;
    }

    /// Suspend until every given future is terminal, regardless of completion
    /// order; never short-circuits on first failure. Returns without
    /// suspending when given zero or all-pre-resolved futures.
    pub async fn wait_for_all(&self, futures: &[WorkflowFuture]) {
        join_all(futures.iter().map(|f| f.wait())).await;
    }

    /// Mark the execution successfully finished. Valid at most once.
    pub fn complete(&self, result: impl Into<String>) -> Result<String, WorkflowError> {
        let result = result.into();
        let mut inner = self.lock();
        if inner.terminal.is_some() {
            return Err(WorkflowError::misuse(
                "execution already reached a terminal state",
            ));
        }
        inner.terminal = Some(Terminal::Completed(result.clone()));
        Ok(result)
    }

    /// Mark the execution failed and return the reconstructed error kind.
    /// Valid at most once.
    pub fn fail(&self, reason: &str, details: &str) -> WorkflowError {
        {
            let mut inner = self.lock();
            if inner.terminal.is_some() {
                return WorkflowError::misuse("execution already reached a terminal state");
            }
            inner.terminal = Some(Terminal::Failed(Failure::new(reason, details)));
        }
        self.converter.rehydrate(reason, details)
    }

    pub fn is_finished(&self) -> bool {
        self.lock().terminal.is_some()
    }

    /// The recorded terminal failure, if the execution failed.
    pub fn terminal_failure(&self) -> Option<Failure> {
        match &self.lock().terminal {
            Some(Terminal::Failed(failure)) => Some(failure.clone()),
            _ => None,
        }
    }

    /// The recorded terminal result, if the execution completed.
    pub fn terminal_result(&self) -> Option<String> {
        match &self.lock().terminal {
            Some(Terminal::Completed(result)) => Some(result.clone()),
            _ => None,
        }
    }

    /// Child workflow execution tracked by the orchestration service is not
    /// available in the in-process mode.
    pub fn execute_child_workflow(
        &self,
        _name: &str,
        _input: impl Into<String>,
    ) -> Result<WorkflowFuture, WorkflowError> {
        Err(WorkflowError::not_supported("execute_child_workflow"))
    }

    /// Signal subscription is not available in the in-process mode.
    pub fn on_signal<F>(&self, _handler: F) -> Result<(), WorkflowError>
    where
        F: Fn(String) + Send + 'static,
    {
        Err(WorkflowError::not_supported("on_signal"))
    }

    /// Run a named child workflow to completion in-process, against its own
    /// execution and context. Child identity derives from the parent's ids
    /// and the assigned event id, so it replays identically. The caller
    /// suspends on a ChildWorkflow-category future; the child's terminal
    /// outcome arrives as a completion under the child id.
    pub async fn execute_child_workflow_sync(
        &self,
        name: &str,
        input: impl Into<String>,
    ) -> Result<String, WorkflowError> {
        let handler = self
            .workflows
            .get(name)
            .ok_or_else(|| WorkflowError::misuse(format!("workflow not registered: {name}")))?;
        let event_id = self.next_event_id();
        let child_workflow_id = format!("{}::child::{event_id}", self.metadata.workflow_id);
        let target = EventTarget::new(event_id, EventCategory::ChildWorkflow);
        let future = self
            .execution
            .register_future(WorkflowFuture::new(target, child_workflow_id.clone()))?;

        let child_metadata = WorkflowMetadata {
            domain: self.metadata.domain.clone(),
            workflow_id: child_workflow_id.clone(),
            run_id: format!("{}::child::{event_id}", self.metadata.run_id),
            workflow_name: name.to_string(),
            headers: self.metadata.headers.clone(),
            disabled_releases: self.metadata.disabled_releases.clone(),
        };
        let child_ctx = WorkflowContext::new(
            Arc::new(WorkflowExecution::new()),
            child_metadata,
            self.activities.clone(),
            self.workflows.clone(),
            self.converter.clone(),
            self.now_ms(),
        );

        // The child runs on its own task with its own scheduler; the parent
        // registry tracks it like any other outstanding operation.
        let parent_execution = Arc::clone(&self.execution);
        let completion_key = child_workflow_id;
        let input = input.into();
        tokio::spawn(async move {
            match crate::runtime::drive(handler, child_ctx, input).await {
                Ok(result) => {
                    let _ = parent_execution.complete_future(&completion_key, result);
                }
                Err(error) => {
                    let _ = parent_execution
                        .fail_future(&completion_key, crate::errors::capture(&error));
                }
            }
        });

        match future.get().await {
            Ok(value) => Ok(value),
            Err(WorkflowError::Application { reason, details }) => {
                Err(self.converter.rehydrate(&reason, &details))
            }
            Err(other) => Err(other),
        }
    }

    pub(crate) fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut self.lock().commands)
    }

    pub(crate) fn advance_clock_to(&self, now_ms: u64) {
        let mut inner = self.lock();
        if now_ms > inner.now_ms {
            inner.now_ms = now_ms;
        }
    }

    fn next_event_id(&self) -> u64 {
        let mut inner = self.lock();
        inner.last_event_id += 1;
        inner.last_event_id
    }

    fn activity_metadata(
        &self,
        name: &str,
        activity_id: &str,
        options: &ActivityOptions,
    ) -> ActivityMetadata {
        let mut headers = self.metadata.headers.clone();
        headers.extend(options.headers.clone());
        ActivityMetadata {
            domain: options
                .domain
                .clone()
                .unwrap_or_else(|| self.metadata.domain.clone()),
            activity_id: activity_id.to_string(),
            name: name.to_string(),
            task_token: None,
            attempt: 1,
            workflow_id: self.metadata.workflow_id.clone(),
            workflow_run_id: self.metadata.run_id.clone(),
            workflow_name: Some(self.metadata.workflow_name.clone()),
            headers,
            timeouts: options.timeouts.unwrap_or_default(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ContextInner> {
        self.inner.lock().expect("context lock poisoned")
    }
}
