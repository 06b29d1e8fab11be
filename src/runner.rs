//! Binds a workflow to its execution context and drives it to a terminal
//! state.

use async_trait::async_trait;

use crate::context::WorkflowContext;
use crate::errors::{self, WorkflowError};

/// Lifecycle of one workflow attempt: `Created -> Running -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Completed,
    Failed,
}

/// Trait implemented by workflow handlers. Every entry point receives its
/// execution context as an argument; there is no ambient context binding.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn execute(&self, ctx: WorkflowContext, input: String) -> Result<String, WorkflowError>;
}

/// Function wrapper that implements `WorkflowHandler`.
pub struct FnWorkflow<F, Fut>(pub F)
where
    F: Fn(WorkflowContext, String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String, WorkflowError>> + Send + 'static;

#[async_trait]
impl<F, Fut> WorkflowHandler for FnWorkflow<F, Fut>
where
    F: Fn(WorkflowContext, String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String, WorkflowError>> + Send + 'static,
{
    async fn execute(&self, ctx: WorkflowContext, input: String) -> Result<String, WorkflowError> {
        (self.0)(ctx, input).await
    }
}

/// Drives one workflow attempt to a terminal state.
///
/// Terminal either way: the runner never retries. Retries, if any, are the
/// orchestration service's decision based on the reported terminal state.
pub struct WorkflowRunner {
    state: RunState,
}

impl WorkflowRunner {
    pub fn new() -> Self {
        Self {
            state: RunState::Created,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the handler's `execute` against `ctx`. A normal return completes
    /// the context; any error is logged first (so diagnostic context survives
    /// a lost report), reported through the failure hook, then converted into
    /// the context's terminal failure.
    pub async fn execute_in_context(
        &mut self,
        handler: &dyn WorkflowHandler,
        ctx: WorkflowContext,
        input: String,
    ) -> Result<String, WorkflowError> {
        self.state = RunState::Running;
        match handler.execute(ctx.clone(), input).await {
            Ok(result) => {
                self.state = RunState::Completed;
                ctx.complete(result)
            }
            Err(error) => {
                self.state = RunState::Failed;
                crate::workflow_error!(ctx, error = %error, "workflow execution failed");
                errors::report(&error, ctx.metadata());
                let failure = errors::capture(&error);
                Err(ctx.fail(&failure.reason, &failure.details))
            }
        }
    }
}

impl Default for WorkflowRunner {
    fn default() -> Self {
        Self::new()
    }
}
