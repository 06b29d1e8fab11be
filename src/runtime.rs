//! In-process execution engine.
//!
//! Drives one workflow per call on a single cooperative coroutine: the
//! workflow task is polled exactly once per turn, and between turns the
//! scheduler delivers whatever resolved: due timer firings from the
//! in-process timer service, or completions delivered externally through the
//! execution's surface. Nothing blocks the OS thread; suspension is always a
//! yield back to this loop, so one worker process can host many executions on
//! a bounded thread pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use uuid::Uuid;

use crate::context::{Command, WorkflowContext};
use crate::errors::{FailureConverter, WorkflowError};
use crate::execution::WorkflowExecution;
use crate::metadata::WorkflowMetadata;
use crate::registry::{ActivityRegistry, WorkflowRegistry};
use crate::runner::{WorkflowHandler, WorkflowRunner};

/// Configuration for the in-process engine.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Domain stamped on every execution's metadata.
    pub domain: String,
    /// Headers propagated into every execution.
    pub headers: HashMap<String, String>,
    /// Versioning gates disabled for executions started here.
    pub disabled_releases: HashSet<String>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            domain: "default".to_string(),
            headers: HashMap::new(),
            disabled_releases: HashSet::new(),
        }
    }
}

/// In-process runtime that runs registered workflows to completion.
pub struct LocalRuntime {
    workflows: WorkflowRegistry,
    activities: ActivityRegistry,
    converter: FailureConverter,
    options: RuntimeOptions,
}

impl LocalRuntime {
    pub fn start(workflows: WorkflowRegistry, activities: ActivityRegistry) -> Arc<Self> {
        Self::start_with_options(
            workflows,
            activities,
            FailureConverter::default(),
            RuntimeOptions::default(),
        )
    }

    pub fn start_with_options(
        workflows: WorkflowRegistry,
        activities: ActivityRegistry,
        converter: FailureConverter,
        options: RuntimeOptions,
    ) -> Arc<Self> {
        // Install a default subscriber if none set (ok to call many times)
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .try_init();

        Arc::new(Self {
            workflows,
            activities,
            converter,
            options,
        })
    }

    /// Run a registered workflow to its terminal state under fresh ids.
    pub async fn run_workflow(
        &self,
        name: &str,
        input: impl Into<String>,
    ) -> Result<String, WorkflowError> {
        self.prepare_workflow(name)?.run(input).await
    }

    pub async fn run_workflow_with_ids(
        &self,
        name: &str,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        input: impl Into<String>,
    ) -> Result<String, WorkflowError> {
        self.prepare_workflow_with_ids(name, workflow_id, run_id)?
            .run(input)
            .await
    }

    /// Bind a registered workflow to a fresh context without running it yet.
    /// Useful when the host needs the context (and its execution's completion
    /// surface) before or while the workflow runs.
    pub fn prepare_workflow(&self, name: &str) -> Result<WorkflowRun, WorkflowError> {
        self.prepare_workflow_with_ids(
            name,
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
        )
    }

    pub fn prepare_workflow_with_ids(
        &self,
        name: &str,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Result<WorkflowRun, WorkflowError> {
        let handler = self
            .workflows
            .get(name)
            .ok_or_else(|| WorkflowError::misuse(format!("workflow not registered: {name}")))?;
        let metadata = WorkflowMetadata {
            domain: self.options.domain.clone(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            workflow_name: name.to_string(),
            headers: self.options.headers.clone(),
            disabled_releases: self.options.disabled_releases.clone(),
        };
        let ctx = WorkflowContext::new(
            Arc::new(WorkflowExecution::new()),
            metadata,
            self.activities.clone(),
            self.workflows.clone(),
            self.converter.clone(),
            epoch_ms_now(),
        );
        Ok(WorkflowRun { handler, ctx })
    }
}

/// One workflow bound to its context, ready to run.
pub struct WorkflowRun {
    handler: Arc<dyn WorkflowHandler>,
    ctx: WorkflowContext,
}

impl WorkflowRun {
    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    pub async fn run(self, input: impl Into<String>) -> Result<String, WorkflowError> {
        drive(self.handler, self.ctx, input.into()).await
    }
}

/// Seed for the execution's replay-consistent clock. Host-side only: workflow
/// code reads time through `WorkflowContext::now_ms`.
fn epoch_ms_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The turn scheduler. Polls the workflow task once, then, only while it is
/// suspended, lets time pass or an external completion arrive, delivers what
/// resolved, and re-polls. The task is resumed exclusively by this loop, so
/// completion delivery is always funneled through the owning execution's
/// turn.
pub(crate) fn drive(
    handler: Arc<dyn WorkflowHandler>,
    ctx: WorkflowContext,
    input: String,
) -> BoxFuture<'static, Result<String, WorkflowError>> {
    Box::pin(async move {
        let execution = ctx.execution();
        let mut timers = TimerService::new();
        let mut runner = WorkflowRunner::new();
        let task = runner.execute_in_context(handler.as_ref(), ctx.clone(), input);
        futures::pin_mut!(task);

        loop {
            match std::future::poll_fn(|cx| Poll::Ready(task.as_mut().poll(cx))).await {
                Poll::Ready(outcome) => return outcome,
                Poll::Pending => {}
            }

            timers.absorb(ctx.take_commands(), ctx.now_ms());
            if timers.fire_due(&execution, &ctx) {
                continue;
            }
            if let Some(deadline) = timers.next_deadline() {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = execution.completion_delivered() => {}
                }
                timers.fire_due(&execution, &ctx);
            } else if execution.has_outstanding() {
                execution.completion_delivered().await;
            } else {
                return Err(WorkflowError::misuse(
                    "workflow stalled: suspended with no outstanding operations",
                ));
            }
        }
    })
}

struct PendingTimer {
    cancelation_id: String,
    fire_at_ms: u64,
    fire_at: Instant,
}

/// In-process timer service: tracks scheduled timers against real time and
/// resolves their futures when due, advancing the execution clock to each
/// timer's logical fire time.
struct TimerService {
    pending: Vec<PendingTimer>,
}

impl TimerService {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    fn absorb(&mut self, commands: Vec<Command>, now_ms: u64) {
        let real_now = Instant::now();
        for command in commands {
            match command {
                Command::StartTimer {
                    cancelation_id,
                    fire_at_ms,
                } => {
                    let delay_ms = fire_at_ms.saturating_sub(now_ms);
                    self.pending.push(PendingTimer {
                        cancelation_id,
                        fire_at_ms,
                        fire_at: real_now + Duration::from_millis(delay_ms),
                    });
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|timer| timer.fire_at).min()
    }

    fn fire_due(&mut self, execution: &WorkflowExecution, ctx: &WorkflowContext) -> bool {
        let real_now = Instant::now();
        self.pending.sort_by_key(|timer| timer.fire_at_ms);
        let mut fired = false;
        let mut remaining = Vec::new();
        for timer in self.pending.drain(..) {
            if timer.fire_at <= real_now {
                ctx.advance_clock_to(timer.fire_at_ms);
                // Canceled timers have no outstanding future left; the
                // delivery is dropped with a debug log.
                execution.try_complete_future(&timer.cancelation_id, "");
                fired = true;
            } else {
                remaining.push(timer);
            }
        }
        self.pending = remaining;
        fired
    }
}
