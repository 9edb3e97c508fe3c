use anyhow::{Context, Result};
use clap::Parser;
use reasoning_engine::cli::{Args, RunConfig};
use reasoning_engine::executor::SimulatedToolInvoker;
use reasoning_engine::notifier::BroadcastNotifier;
use reasoning_engine::TaskOrchestrator;
use reasoning_engine_sdk::{
    log_step_complete, log_step_failed, log_step_retry, log_step_start, log_task_submitted,
    log_task_summary, log_warning, EngineEvent, PlanStatus,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let run: RunConfig = Args::parse().into();
    let config = run.engine_config()?;

    let notifier = Arc::new(BroadcastNotifier::default());
    let tools = if run.fail_actions {
        SimulatedToolInvoker::failing("simulated tool failure")
    } else {
        SimulatedToolInvoker::new()
    };

    let orchestrator = TaskOrchestrator::builder()
        .config(config)
        .tool_invoker(Arc::new(tools))
        .notifier(notifier.clone())
        .build()
        .context("Failed to build orchestrator")?;

    // Subscribe before submitting so no event is missed
    let console = (!run.json).then(|| tokio::spawn(print_events(notifier.subscribe())));

    let receipt = orchestrator
        .submit(run.request())
        .context("Task submission rejected")?;
    if !run.json {
        log_task_submitted!(receipt.task_id, run.goal);
    }

    let report = orchestrator.wait(&receipt.task_id).await?;
    // The printer stops on the terminal event
    let duration_ms = match console {
        Some(console) => console.await.ok().flatten(),
        None => None,
    };
    orchestrator.shutdown().await;

    if run.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(error) = &report.plan.error {
            log_warning!("{}", error);
        }
        log_task_summary!(
            report.status,
            report.steps_completed,
            report.total_steps,
            duration_ms.unwrap_or_default()
        );
    }

    if report.status != PlanStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

/// Print step progress; returns the task duration from the terminal event
async fn print_events(mut rx: broadcast::Receiver<EngineEvent>) -> Option<u64> {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log_warning!("Event stream lagged, skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => return None,
        };

        match &event {
            EngineEvent::StepStarted { step_id, kind, attempt, .. } => {
                log_step_start!(step_id, kind, attempt);
            }
            EngineEvent::StepRetrying { step_id, retry_count, delay_ms, error, .. } => {
                log_step_retry!(step_id, retry_count, delay_ms, error);
            }
            EngineEvent::StepCompleted { step_id, confidence, .. } => {
                log_step_complete!(step_id, confidence);
            }
            EngineEvent::StepFailed { step_id, error, .. } => {
                log_step_failed!(step_id, error);
            }
            EngineEvent::TaskFinished { duration_ms, .. } => return Some(*duration_ms),
            EngineEvent::TaskStarted { .. } | EngineEvent::PlanReady { .. } => {}
        }
    }
}
