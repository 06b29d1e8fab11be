use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadent::{
    ActivityContext, ActivityOptions, ActivityRegistry, Failure, LocalActivityOutcome,
    LocalRuntime, Outcome, WorkflowContext, WorkflowError, WorkflowRegistry,
};

fn activities() -> ActivityRegistry {
    ActivityRegistry::builder()
        .register("Double", |_ctx: ActivityContext, input: String| async move {
            let n: i64 = input
                .parse()
                .map_err(|e| Failure::new("parse_error", format!("{e}")))?;
            Ok((n * 2).to_string())
        })
        .register("Gather", |ctx: ActivityContext, _input: String| async move {
            // Completes later through the execution's completion surface.
            ctx.defer();
            Ok(String::new())
        })
        .build()
}

#[tokio::test]
async fn local_activity_returns_its_result_without_a_future() {
    let workflows = WorkflowRegistry::builder()
        .register("Inline", |ctx: WorkflowContext, input: String| async move {
            match ctx
                .execute_local_activity("Double", input, ActivityOptions::default())
                .await?
            {
                LocalActivityOutcome::Completed(value) => Ok(value),
                LocalActivityOutcome::Deferred(_) => panic!("Double does not defer"),
            }
        })
        .build();
    let rt = LocalRuntime::start(workflows, activities());
    assert_eq!(rt.run_workflow("Inline", "21").await.unwrap(), "42");
}

#[tokio::test]
async fn local_activity_failure_rehydrates_the_original_kind() {
    let workflows = WorkflowRegistry::builder()
        .register("Inline", |ctx: WorkflowContext, input: String| async move {
            match ctx
                .execute_local_activity("Double", input, ActivityOptions::default())
                .await
            {
                Err(err) => Err(err),
                Ok(_) => panic!("expected a parse failure"),
            }
        })
        .build();
    let rt = LocalRuntime::start(workflows, activities());
    let err = rt.run_workflow("Inline", "not-a-number").await.unwrap_err();
    match err {
        WorkflowError::Application { reason, .. } => assert_eq!(reason, "parse_error"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn deferred_local_activity_is_tracked_and_completed_externally() {
    let workflows = WorkflowRegistry::builder()
        .register("WaitForGather", |ctx: WorkflowContext, _input: String| {
            async move {
                let outcome = ctx
                    .execute_local_activity(
                        "Gather",
                        "",
                        ActivityOptions::default().with_activity_id("a1"),
                    )
                    .await?;
                match outcome {
                    LocalActivityOutcome::Deferred(future) => future.get().await,
                    LocalActivityOutcome::Completed(_) => panic!("Gather defers"),
                }
            }
        })
        .build();
    let rt = LocalRuntime::start(workflows, activities());

    let run = rt.prepare_workflow("WaitForGather").unwrap();
    let ctx = run.context().clone();
    let handle = tokio::spawn(run.run(""));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ctx.execution().has_outstanding());
    ctx.execution().complete_future("a1", "gathered").unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), "gathered");
    assert!(!ctx.execution().has_outstanding());
}

#[tokio::test]
async fn deferred_remote_style_activity_fires_callbacks_on_delivery() {
    let seen: Arc<Mutex<Vec<Outcome>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let workflows = WorkflowRegistry::builder()
        .register("Callbacks", move |ctx: WorkflowContext, _input: String| {
            let sink = Arc::clone(&sink);
            async move {
                let future = ctx
                    .execute_activity(
                        "Gather",
                        "",
                        ActivityOptions::default().with_activity_id("a1"),
                    )
                    .await?;
                let sink2 = Arc::clone(&sink);
                future.add_callback(move |outcome| sink2.lock().unwrap().push(outcome.clone()));
                future.get().await
            }
        })
        .build();
    let rt = LocalRuntime::start(workflows, activities());

    let run = rt.prepare_workflow("Callbacks").unwrap();
    let ctx = run.context().clone();
    let handle = tokio::spawn(run.run(""));

    tokio::time::sleep(Duration::from_millis(50)).await;
    ctx.execution().complete_future("a1", "delivered").unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), "delivered");
    assert_eq!(*seen.lock().unwrap(), vec![Outcome::Value("delivered".into())]);
}

#[tokio::test]
async fn externally_failed_activity_is_recorded_for_inspection() {
    let workflows = WorkflowRegistry::builder()
        .register("AbandonedFailure", |ctx: WorkflowContext, _input: String| {
            async move {
                let _ = ctx
                    .execute_activity(
                        "Gather",
                        "",
                        ActivityOptions::default().with_activity_id("a1"),
                    )
                    .await?;
                // Nobody consumes the future; wait on an unrelated timer so
                // the failure lands while the workflow is suspended.
                ctx.sleep(Duration::from_millis(40)).await?;
                Ok("abandoned".to_string())
            }
        })
        .build();
    let rt = LocalRuntime::start(workflows, activities());

    let run = rt.prepare_workflow("AbandonedFailure").unwrap();
    let ctx = run.context().clone();
    let handle = tokio::spawn(run.run(""));

    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.execution()
        .fail_future("a1", Failure::new("boom_error", "boom"))
        .unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), "abandoned");
    let recorded = ctx.execution().resolved_failures();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "a1");
}
