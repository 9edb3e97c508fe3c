//! End-to-end orchestrator lifecycle tests

use super::common::*;
use reasoning_engine::executor::SimulatedToolInvoker;
use reasoning_engine::{EngineConfig, TaskOrchestrator};
use reasoning_engine_sdk::{
    AbortOutcome, EngineError, EngineEvent, PlanStatus, ReasoningRuntime, StepStatus,
    SubmitStatus, TaskRequest, TaskStatus,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_create_config_file_completes() {
    let orchestrator = TaskOrchestrator::builder().build().unwrap();
    let receipt = orchestrator
        .submit(TaskRequest::new("create config file").with_context_entry("user", json!("admin")))
        .unwrap();
    assert_eq!(receipt.status, SubmitStatus::ReasoningStarted);
    assert!(receipt.task_id.starts_with("task_"));

    let report = orchestrator.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(report.steps_completed, 4);
    assert_eq!(report.total_steps, 4);

    let confidences: Vec<f64> = report.plan.steps.iter().map(|s| s.confidence).collect();
    assert_eq!(confidences, vec![0.90, 0.85, 0.98, 0.85]);
    assert_eq!(report.plan.steps[3].result, "Action executed: creation");
    assert!(report.plan.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert!(report.plan.completed_at.is_some());
    assert!(report.plan.error.is_none());

    let task = orchestrator.task(&receipt.task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.timeout_ms, 30_000);
}

#[tokio::test]
async fn test_status_is_available_right_after_submit() {
    let orchestrator = TaskOrchestrator::builder().build().unwrap();
    let receipt = orchestrator.submit(TaskRequest::new("monitor cpu usage")).unwrap();

    // The flow has not been polled yet on this single-threaded runtime
    let report = orchestrator.status(&receipt.task_id).unwrap();
    assert_eq!(report.status, PlanStatus::Planning);
    assert_eq!(report.total_steps, 0);

    let report = orchestrator.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(report.plan.steps[3].result, "Action executed: monitoring");
}

#[tokio::test]
async fn test_concurrent_tasks_are_independent() {
    let orchestrator = TaskOrchestrator::builder().build().unwrap();
    let goals = ["create user", "update record", "delete cache", "monitor disk", "say hello"];

    let ids: Vec<String> = goals
        .iter()
        .map(|goal| orchestrator.submit(TaskRequest::new(*goal)).unwrap().task_id)
        .collect();
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), goals.len());

    for (id, goal) in ids.iter().zip(goals) {
        let report = orchestrator.wait(id).await.unwrap();
        assert_eq!(report.status, PlanStatus::Completed);
        assert_eq!(report.plan.goal, goal);
    }
    assert_eq!(orchestrator.registry().len(), goals.len());
}

#[tokio::test]
async fn test_runtime_trait_object() {
    let runtime: Arc<dyn ReasoningRuntime> = Arc::new(TaskOrchestrator::builder().build().unwrap());
    let receipt = runtime.submit(TaskRequest::new("update settings")).unwrap();
    let report = runtime.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(runtime.status(&receipt.task_id).unwrap().steps_completed, 4);
}

// ============================================================================
// Validation and unknown ids
// ============================================================================

#[tokio::test]
async fn test_submit_rejects_invalid_requests() {
    let orchestrator = TaskOrchestrator::builder().build().unwrap();

    let err = orchestrator.submit(TaskRequest::new("   ")).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = orchestrator
        .submit(TaskRequest::new("create file").with_timeout_ms(0))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_unknown_task_id_is_not_found() {
    let orchestrator = TaskOrchestrator::builder().build().unwrap();

    assert_eq!(
        orchestrator.status("task_missing").unwrap_err(),
        EngineError::NotFound("task_missing".to_string())
    );
    assert_eq!(
        orchestrator.abort("task_missing").unwrap_err(),
        EngineError::NotFound("task_missing".to_string())
    );
    assert!(orchestrator.wait("task_missing").await.is_err());
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_action_exhausts_retries() {
    let tool = Arc::new(SimulatedToolInvoker::failing("boom"));
    let orchestrator = orchestrator_with_tool(tool.clone());

    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(report.steps_completed, 3);
    assert_eq!(tool.calls(), 4);

    let action = &report.plan.steps[3];
    assert_eq!(action.status, StepStatus::Failed);
    assert_eq!(action.retry_count, 3);
    assert!(approx_eq(action.confidence, 0.85 * 0.8 * 0.8 * 0.8));
    assert_eq!(
        action.error.as_deref(),
        Some("step 'step_4' failed: tool invocation failed: boom")
    );
    assert_eq!(report.plan.error, action.error);
}

#[tokio::test(start_paused = true)]
async fn test_flaky_action_recovers_with_decayed_confidence() {
    let tool = Arc::new(FlakyTool::new(2));
    let orchestrator = orchestrator_with_tool(tool.clone());

    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 3);

    let action = &report.plan.steps[3];
    assert_eq!(action.retry_count, 2);
    assert!(approx_eq(action.confidence, 0.85 * 0.8 * 0.8));
    assert_eq!(action.result, "recovered");
    assert!(action.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_zero_max_retries_fails_on_first_error() {
    let mut config = EngineConfig::default();
    config.retry.max_retries = 0;
    let tool = Arc::new(SimulatedToolInvoker::failing("boom"));
    let orchestrator = TaskOrchestrator::builder()
        .config(config)
        .tool_invoker(tool.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("delete temp files")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(tool.calls(), 1);
    assert_eq!(report.plan.steps[3].retry_count, 0);
    assert!(approx_eq(report.plan.steps[3].confidence, 0.85));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_tool_fails_the_step() {
    let tool = Arc::new(PanickingTool::default());
    let orchestrator = orchestrator_with_tool(tool.clone());

    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 4);

    let action = &report.plan.steps[3];
    assert_eq!(action.status, StepStatus::Failed);
    assert_eq!(action.retry_count, 3);
    assert_eq!(
        action.error.as_deref(),
        Some("step 'step_4' failed: executor panicked: tool bug")
    );

    assert_eq!(
        orchestrator.abort(&receipt.task_id).unwrap(),
        AbortOutcome::AlreadyTerminal(PlanStatus::Failed)
    );
    assert_eq!(
        orchestrator.task(&receipt.task_id).unwrap().status,
        TaskStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_confidence_is_rejected() {
    let mut step = action("step_a", "a", &[]);
    step.confidence = -0.1;
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(FixedPlanner::new(vec![step]))
        .tool_invoker(Arc::new(SimulatedToolInvoker::failing("boom")))
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("negative confidence")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(report.total_steps, 0);
    assert!(report.plan.error.unwrap().contains("confidence -0.1 outside [0, 1]"));
}

// ============================================================================
// Timeout and abort
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_stops_at_next_step_boundary() {
    let planner = FixedPlanner::new(vec![
        action("step_a", "Execute: first", &[]),
        action("step_b", "Execute: second", &["step_a"]),
    ]);
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(planner)
        .tool_invoker(Arc::new(SleepyTool { delay: Duration::from_millis(200) }))
        .build()
        .unwrap();

    let receipt = orchestrator
        .submit(TaskRequest::new("slow work").with_timeout_ms(100))
        .unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Timeout);
    // The in-flight step is allowed to finish; the next one never starts
    assert_eq!(report.plan.steps[0].status, StepStatus::Completed);
    assert_eq!(report.plan.steps[1].status, StepStatus::Pending);
    assert!(report.plan.steps[1].started_at.is_none());
    assert!(report.plan.error.unwrap().contains("timed out after 100 ms"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_during_retries_abandons_step() {
    let mut config = EngineConfig::default();
    config.retry.base_delay_ms = 1_000;
    let orchestrator = TaskOrchestrator::builder()
        .config(config)
        .tool_invoker(Arc::new(SimulatedToolInvoker::failing("boom")))
        .build()
        .unwrap();

    let receipt = orchestrator
        .submit(TaskRequest::new("create config file").with_timeout_ms(1_500))
        .unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Timeout);
    let action = &report.plan.steps[3];
    assert_eq!(action.status, StepStatus::Failed);
    assert!(action.retry_count < 3);
    assert!(action.error.as_deref().unwrap().starts_with("abandoned on timeout"));
}

#[tokio::test]
async fn test_abort_between_steps() {
    let planner = FixedPlanner::new(vec![
        action("step_a", "Execute: first", &[]),
        action("step_b", "Execute: second", &["step_a"]),
    ]);
    let tool = Arc::new(GatedTool::default());
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(planner)
        .tool_invoker(tool.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("two actions")).unwrap();
    tool.entered.notified().await;

    assert_eq!(orchestrator.abort(&receipt.task_id).unwrap(), AbortOutcome::Signalled);
    tool.release.notify_one();

    let report = orchestrator.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Aborted);
    assert_eq!(report.plan.steps[0].status, StepStatus::Completed);
    assert_eq!(report.plan.steps[1].status, StepStatus::Pending);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

    // Aborting a finished task changes nothing
    assert_eq!(
        orchestrator.abort(&receipt.task_id).unwrap(),
        AbortOutcome::AlreadyTerminal(PlanStatus::Aborted)
    );
    assert_eq!(orchestrator.status(&receipt.task_id).unwrap().status, PlanStatus::Aborted);
}

#[tokio::test]
async fn test_abort_during_last_step_wins_over_completion() {
    let planner = FixedPlanner::new(vec![action("only", "Execute: only", &[])]);
    let tool = Arc::new(GatedTool::default());
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(planner)
        .tool_invoker(tool.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("single action")).unwrap();
    tool.entered.notified().await;
    orchestrator.abort(&receipt.task_id).unwrap();
    tool.release.notify_one();

    let report = orchestrator.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Aborted);
    assert_eq!(report.plan.steps[0].status, StepStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_abort_interrupts_retry_backoff() {
    let orchestrator = orchestrator_with_tool(Arc::new(SimulatedToolInvoker::failing("boom")));
    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();

    for _ in 0..1000 {
        let report = orchestrator.status(&receipt.task_id).unwrap();
        if report.plan.steps.get(3).is_some_and(|s| s.retry_count >= 1) {
            break;
        }
        tokio::task::yield_now().await;
    }
    orchestrator.abort(&receipt.task_id).unwrap();

    let report = orchestrator.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Aborted);
    let action = &report.plan.steps[3];
    assert_eq!(action.status, StepStatus::Failed);
    assert_eq!(action.retry_count, 1);
    assert!(action.error.as_deref().unwrap().starts_with("abandoned on abort"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_live_tasks() {
    let orchestrator = TaskOrchestrator::builder()
        .tool_invoker(Arc::new(SleepyTool { delay: Duration::from_secs(5) }))
        .build()
        .unwrap();
    let receipt = orchestrator.submit(TaskRequest::new("create report")).unwrap();

    orchestrator.shutdown().await;

    let report = orchestrator.status(&receipt.task_id).unwrap();
    assert_eq!(report.status, PlanStatus::Aborted);
}

// ============================================================================
// Planning
// ============================================================================

#[tokio::test]
async fn test_steps_run_in_dependency_order() {
    let planner = FixedPlanner::new(vec![
        action("step_c", "c", &["step_a", "step_b"]),
        action("step_a", "a", &[]),
        action("step_b", "b", &["step_a"]),
    ]);
    let tool = Arc::new(RecordingTool::default());
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(planner)
        .tool_invoker(tool.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("branching plan")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(*tool.calls.lock().unwrap(), vec!["a", "b", "c"]);
    // Declaration index of the last step started
    assert_eq!(report.current_step_index, 0);
}

#[tokio::test]
async fn test_cyclic_plan_fails_before_execution() {
    let planner = FixedPlanner::new(vec![
        action("step_a", "a", &["step_b"]),
        action("step_b", "b", &["step_a"]),
    ]);
    let tool = Arc::new(RecordingTool::default());
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(planner)
        .tool_invoker(tool.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("cyclic plan")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(report.total_steps, 0);
    assert!(report.plan.error.unwrap().contains("circular dependency"));
    assert!(tool.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_generator_error_fails_task() {
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(Arc::new(BrokenPlanner))
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("anything")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(report.total_steps, 0);
    assert_eq!(
        report.plan.error.as_deref(),
        Some("plan generation failed: model unavailable")
    );
}

#[tokio::test]
async fn test_panicking_planner_fails_task() {
    let orchestrator = TaskOrchestrator::builder()
        .plan_generator(Arc::new(PanickingPlanner))
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("anything")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(report.total_steps, 0);
    assert_eq!(
        report.plan.error.as_deref(),
        Some("plan generation failed: plan generator panicked: planner bug")
    );
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_lifecycle_events_are_ordered() {
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = TaskOrchestrator::builder()
        .notifier(notifier.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();
    orchestrator.wait(&receipt.task_id).await.unwrap();
    let events = notifier.wait_for_finish().await;

    assert!(matches!(events.first(), Some(EngineEvent::TaskStarted { .. })));
    assert!(matches!(events.get(1), Some(EngineEvent::PlanReady { total_steps: 4, .. })));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::TaskFinished { status: PlanStatus::Completed, error: None, .. })
    ));

    let completed: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StepCompleted { step_id, .. } => Some(step_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec!["step_1", "step_2", "step_3", "step_4"]);
    assert!(events.iter().all(|e| e.task_id() == receipt.task_id));
}

#[tokio::test(start_paused = true)]
async fn test_retry_events_are_emitted() {
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = TaskOrchestrator::builder()
        .tool_invoker(Arc::new(SimulatedToolInvoker::failing("boom")))
        .notifier(notifier.clone())
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();
    orchestrator.wait(&receipt.task_id).await.unwrap();
    let events = notifier.wait_for_finish().await;

    let delays: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StepRetrying { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![100, 200, 300]);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::StepFailed { step_id, .. } if step_id == "step_4")));
}

#[tokio::test]
async fn test_notifier_failure_does_not_affect_outcome() {
    let orchestrator = TaskOrchestrator::builder()
        .notifier(Arc::new(FailingNotifier))
        .build()
        .unwrap();

    let receipt = orchestrator.submit(TaskRequest::new("create config file")).unwrap();
    let report = orchestrator.wait(&receipt.task_id).await.unwrap();
    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(report.steps_completed, 4);
}
