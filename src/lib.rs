//! Deterministic client-side execution engine for durable workflows.
//!
//! Workflow code runs on one cooperative coroutine per execution. Every
//! asynchronous operation it performs (activities, timers, local activities)
//! goes through a [`WorkflowContext`], which assigns the operation a stable
//! [`EventTarget`] identity, tracks a [`WorkflowFuture`] for its eventual
//! result, and suspends the coroutine until that identity resolves.
//! Completions arrive out-of-band through the execution's
//! [`WorkflowExecution`] surface and are delivered only between scheduler
//! turns, so re-executing the same code against the same input always makes
//! the same scheduling decisions in the same order.
//!
//! The [`LocalRuntime`] runs registered workflows in-process: activities
//! execute on the calling coroutine (deferring when they complete later via
//! an external completion), timers fire from an in-process timer service, and
//! failures travel as `(reason, details)` pairs re-hydrated into concrete
//! error kinds on the consuming side.

pub mod activity;
pub mod context;
pub mod errors;
pub mod execution;
pub mod future;
pub mod history;
mod logging;
pub mod metadata;
pub mod options;
pub mod registry;
pub mod runner;
pub mod runtime;

pub use activity::{ActivityContext, ActivityHandler, FnActivity, LocalActivityInvoker, LocalInvocation};
pub use context::{LocalActivityOutcome, WorkflowContext};
pub use errors::{Failure, FailureConverter, WorkflowError};
pub use execution::WorkflowExecution;
pub use future::{FutureState, Outcome, WorkflowFuture};
pub use history::{EventCategory, EventTarget};
pub use metadata::{ActivityMetadata, Timeouts, WorkflowMetadata};
pub use options::ActivityOptions;
pub use registry::{
    ActivityRegistry, ActivityRegistryBuilder, Registry, RegistryBuilder, WorkflowRegistry,
    WorkflowRegistryBuilder,
};
pub use runner::{FnWorkflow, RunState, WorkflowHandler, WorkflowRunner};
pub use runtime::{LocalRuntime, RuntimeOptions, WorkflowRun};
