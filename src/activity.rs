//! The activity invocation contract and the in-process invoker.
//!
//! An activity is a unit of possibly side-effecting work identified by
//! `(domain, name)`. Given a context and input it either returns a result or
//! declares itself asynchronous through [`ActivityContext::defer`], in which
//! case completion arrives later through the execution's external completion
//! surface under the activity id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::errors::Failure;
use crate::metadata::ActivityMetadata;

/// Execution-side view handed to activity code.
#[derive(Clone)]
pub struct ActivityContext {
    metadata: ActivityMetadata,
    deferred: Arc<AtomicBool>,
}

impl ActivityContext {
    pub(crate) fn new(metadata: ActivityMetadata) -> Self {
        Self {
            metadata,
            deferred: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn metadata(&self) -> &ActivityMetadata {
        &self.metadata
    }

    pub fn activity_id(&self) -> &str {
        &self.metadata.activity_id
    }

    pub fn headers(&self) -> &std::collections::HashMap<String, String> {
        &self.metadata.headers
    }

    /// Declare that this activity completes later through an external
    /// completion delivered under its activity id. The immediate return value
    /// of the activity body is discarded once deferred.
    pub fn defer(&self) {
        self.deferred.store(true, Ordering::SeqCst);
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.load(Ordering::SeqCst)
    }
}

/// Trait implemented by activity handlers that can be invoked in-process.
///
/// Handlers run on the workflow's coroutine and must produce their result
/// without waiting on external wakeups; work that completes later declares
/// itself asynchronous via [`ActivityContext::defer`] instead.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn invoke(&self, ctx: ActivityContext, input: String) -> Result<String, Failure>;
}

/// Function wrapper that implements `ActivityHandler`.
pub struct FnActivity<F, Fut>(pub F)
where
    F: Fn(ActivityContext, String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String, Failure>> + Send + 'static;

#[async_trait]
impl<F, Fut> ActivityHandler for FnActivity<F, Fut>
where
    F: Fn(ActivityContext, String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String, Failure>> + Send + 'static,
{
    async fn invoke(&self, ctx: ActivityContext, input: String) -> Result<String, Failure> {
        (self.0)(ctx, input).await
    }
}

/// Outcome of one in-process activity invocation.
#[derive(Debug)]
pub enum LocalInvocation {
    /// The activity finished on the caller's coroutine.
    Completed(Result<String, Failure>),
    /// The activity declared itself asynchronous; the execution context must
    /// track a future under the activity id, the same way remote activities
    /// are tracked.
    Deferred,
}

/// Runs activity code in-process, on the caller's coroutine, with no remote
/// round trip.
pub struct LocalActivityInvoker;

impl LocalActivityInvoker {
    pub async fn invoke(
        handler: &dyn ActivityHandler,
        metadata: ActivityMetadata,
        input: String,
    ) -> LocalInvocation {
        let ctx = ActivityContext::new(metadata);
        let result = handler.invoke(ctx.clone(), input).await;
        if ctx.is_deferred() {
            LocalInvocation::Deferred
        } else {
            LocalInvocation::Completed(result)
        }
    }
}
