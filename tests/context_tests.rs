use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use cadent::{
    ActivityContext, ActivityOptions, ActivityRegistry, EventCategory, EventTarget, Failure,
    FailureConverter, FutureState, Outcome, WorkflowContext, WorkflowError, WorkflowExecution,
    WorkflowMetadata, WorkflowRegistry,
};

fn test_metadata() -> WorkflowMetadata {
    WorkflowMetadata {
        domain: "test-domain".into(),
        workflow_id: "wf-1".into(),
        run_id: "run-1".into(),
        workflow_name: "TestWorkflow".into(),
        headers: HashMap::from([("trace".to_string(), "abc".to_string())]),
        disabled_releases: HashSet::from(["old_path".to_string()]),
    }
}

fn test_context(activities: ActivityRegistry) -> WorkflowContext {
    WorkflowContext::new(
        Arc::new(WorkflowExecution::new()),
        test_metadata(),
        activities,
        WorkflowRegistry::default(),
        FailureConverter::default(),
        1_000,
    )
}

fn echo_activities() -> ActivityRegistry {
    ActivityRegistry::builder()
        .register("Echo", |_ctx: ActivityContext, input: String| async move {
            Ok(format!("echo:{input}"))
        })
        .register("Boom", |_ctx: ActivityContext, _input: String| async move {
            Err(Failure::new("boom_error", "boom"))
        })
        .build()
}

#[tokio::test]
async fn synchronous_activity_resolves_its_future_at_call_time() {
    let ctx = test_context(echo_activities());
    let future = ctx
        .execute_activity("Echo", "hi", ActivityOptions::default())
        .await
        .unwrap();

    assert_eq!(future.state(), FutureState::Fulfilled);
    assert_eq!(future.target().category(), EventCategory::Activity);
    assert_eq!(future.target().id(), 1);

    // A callback registered after resolution still fires, immediately.
    let seen = Arc::new(Mutex::new(None));
    let seen2 = Arc::clone(&seen);
    future.add_callback(move |outcome| {
        *seen2.lock().unwrap() = Some(outcome.clone());
    });
    assert_eq!(
        *seen.lock().unwrap(),
        Some(Outcome::Value("echo:hi".into()))
    );
    assert_eq!(future.get().await.unwrap(), "echo:hi");
}

#[tokio::test]
async fn failed_activity_rehydrates_the_original_kind() {
    let ctx = test_context(echo_activities());
    let err = ctx
        .execute_activity_sync("Boom", "", ActivityOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::application("boom_error", "boom"));
}

#[tokio::test]
async fn unregistered_activity_is_misuse() {
    let ctx = test_context(echo_activities());
    let err = ctx
        .execute_activity("Missing", "", ActivityOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Misuse { .. }));
}

#[tokio::test]
async fn caller_supplied_activity_id_keys_the_future() {
    let ctx = test_context(echo_activities());
    let future = ctx
        .execute_activity(
            "Echo",
            "x",
            ActivityOptions::default().with_activity_id("custom-17"),
        )
        .await
        .unwrap();
    assert_eq!(future.cancelation_id(), "custom-17");
    // The event target keeps its counter-assigned id regardless.
    assert_eq!(future.target().id(), 1);
}

#[tokio::test]
async fn wait_for_all_returns_for_zero_and_pre_resolved_futures() {
    let ctx = test_context(echo_activities());

    ctx.wait_for_all(&[]).await;

    let f1 = ctx
        .execute_activity("Echo", "a", ActivityOptions::default())
        .await
        .unwrap();
    let f2 = ctx
        .execute_activity("Echo", "b", ActivityOptions::default())
        .await
        .unwrap();
    let f3 = ctx
        .execute_activity("Echo", "c", ActivityOptions::default())
        .await
        .unwrap();
    ctx.wait_for_all(&[f1.clone(), f2.clone(), f3.clone()]).await;
    assert!(f1.finished() && f2.finished() && f3.finished());
}

#[test]
fn side_effects_are_recorded_once_and_replayed_verbatim() {
    let ctx = test_context(ActivityRegistry::default());
    assert_eq!(ctx.side_effect(|| "first".into()), "first");
    assert_eq!(ctx.side_effect(|| "second".into()), "second");
    assert_eq!(ctx.recorded_effects(), vec!["first", "second"]);

    let replayed = test_context(ActivityRegistry::default())
        .with_recorded_effects(vec!["first".into(), "second".into()]);
    assert_eq!(
        replayed.side_effect(|| panic!("replay must not re-execute the block")),
        "first"
    );
    assert_eq!(
        replayed.side_effect(|| panic!("replay must not re-execute the block")),
        "second"
    );
    // Past the recording, fresh effects execute again.
    assert_eq!(replayed.side_effect(|| "third".into()), "third");
}

#[test]
fn has_release_is_a_pure_lookup_against_disabled_releases() {
    let ctx = test_context(ActivityRegistry::default());
    assert!(!ctx.has_release("old_path"));
    assert!(ctx.has_release("new_path"));
}

#[test]
fn headers_come_from_execution_metadata() {
    let ctx = test_context(ActivityRegistry::default());
    assert_eq!(ctx.headers().get("trace").map(String::as_str), Some("abc"));
}

#[test]
fn cancel_dispatches_by_target_category() {
    let ctx = test_context(ActivityRegistry::default());

    let activity_target = EventTarget::new(1, EventCategory::Activity);
    assert!(matches!(
        ctx.cancel(&activity_target, "1").unwrap_err(),
        WorkflowError::NotSupported { .. }
    ));

    let signal_target = EventTarget::new(2, EventCategory::Signal);
    assert!(matches!(
        ctx.cancel(&signal_target, "2").unwrap_err(),
        WorkflowError::Misuse { .. }
    ));
}

#[test]
fn signal_and_child_workflow_surfaces_report_capability_errors() {
    let ctx = test_context(ActivityRegistry::default());
    assert_eq!(
        ctx.execute_child_workflow("Child", "").unwrap_err(),
        WorkflowError::not_supported("execute_child_workflow")
    );
    assert_eq!(
        ctx.on_signal(|_payload| {}).unwrap_err(),
        WorkflowError::not_supported("on_signal")
    );
}

#[test]
fn complete_and_fail_are_single_shot() {
    let ctx = test_context(ActivityRegistry::default());
    assert_eq!(ctx.complete("done").unwrap(), "done");
    assert!(matches!(
        ctx.complete("again").unwrap_err(),
        WorkflowError::Misuse { .. }
    ));

    let failing = test_context(ActivityRegistry::default());
    let err = failing.fail("boom_error", "boom");
    assert_eq!(err, WorkflowError::application("boom_error", "boom"));
    assert_eq!(
        failing.terminal_failure(),
        Some(Failure::new("boom_error", "boom"))
    );
    assert!(matches!(
        failing.fail("boom_error", "boom"),
        WorkflowError::Misuse { .. }
    ));
}
