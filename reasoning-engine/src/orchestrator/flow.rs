//! Per-task execution flow.
//!
//! State machine: `planning → executing → {completed, failed, timeout, aborted}`.
//! Steps run one at a time in dependency order. Timeout and abort are
//! cooperative: they are checked before every step attempt and while waiting
//! out a retry backoff, never in the middle of a call.

use chrono::Utc;
use futures::FutureExt;
use reasoning_engine_sdk::{EngineError, EngineEvent, Plan, PlanStatus, StepStatus, Task};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::executor::{ExecutionScope, StepExecutor};
use crate::notifier::EventSink;
use crate::planner::{validate_plan, PlanGenerator};
use crate::registry::PlanWriter;

/// Why a flow stopped scheduling steps early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Timeout,
    Abort,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Timeout => f.write_str("timeout"),
            Interrupt::Abort => f.write_str("abort"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

enum StepRun {
    Completed,
    Failed(String),
    Interrupted(Interrupt),
}

pub(crate) struct TaskFlow {
    task: Task,
    plan: Plan,
    writer: PlanWriter,
    generator: Arc<dyn PlanGenerator>,
    executor: Arc<StepExecutor>,
    policy: RetryPolicy,
    events: EventSink,
    started: Instant,
    /// `None` when the budget is too large to represent
    deadline: Option<Instant>,
}

impl TaskFlow {
    pub(crate) fn new(
        task: Task,
        plan: Plan,
        writer: PlanWriter,
        generator: Arc<dyn PlanGenerator>,
        executor: Arc<StepExecutor>,
        policy: RetryPolicy,
        events: EventSink,
    ) -> Self {
        let started = Instant::now();
        let deadline = started.checked_add(Duration::from_millis(task.timeout_ms));
        Self {
            task,
            plan,
            writer,
            generator,
            executor,
            policy,
            events,
            started,
            deadline,
        }
    }

    fn checkpoint(&self) -> Option<Interrupt> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(Interrupt::Timeout);
        }
        if self.writer.abort_requested() {
            return Some(Interrupt::Abort);
        }
        None
    }

    fn publish(&self) {
        self.writer.publish(&self.plan);
    }

    pub(crate) async fn run(mut self) {
        info!(
            task_id = %self.task.id,
            goal = %self.task.goal,
            timeout_ms = self.task.timeout_ms,
            planner = self.generator.name(),
            "Starting reasoning"
        );
        self.events.emit(EngineEvent::TaskStarted {
            task_id: self.task.id.clone(),
            goal: self.task.goal.clone(),
        });

        match self.prepare().await {
            Ok(order) => self.execute(order).await,
            Err(e) => {
                warn!(task_id = %self.task.id, error = %e, "Plan generation failed");
                self.plan.fail(e.to_string());
            }
        }

        self.publish();
        self.finish();
    }

    /// Generate and validate the plan, then publish it in `planning`
    async fn prepare(&mut self) -> Result<Vec<usize>, EngineError> {
        let mut generated = AssertUnwindSafe(self.generator.generate(&self.task))
            .catch_unwind()
            .await
            .map_err(|panic| {
                EngineError::plan_generation(format!(
                    "plan generator panicked: {}",
                    panic_message(&*panic)
                ))
            })??;

        // Runtime state belongs to the flow, whatever the generator filled in
        for step in &mut generated.steps {
            step.status = StepStatus::Pending;
            step.retry_count = 0;
            step.result.clear();
            step.error = None;
            step.started_at = None;
            step.completed_at = None;
        }
        let order = validate_plan(&generated)?;

        generated.task_id = self.task.id.clone();
        generated.status = PlanStatus::Planning;
        generated.current_step_index = 0;
        generated.created_at = self.plan.created_at;
        generated.completed_at = None;
        generated.error = None;
        self.plan = generated;
        self.publish();

        self.events.emit(EngineEvent::PlanReady {
            task_id: self.task.id.clone(),
            total_steps: self.plan.steps.len(),
        });
        debug!(task_id = %self.task.id, ?order, "Plan validated");
        Ok(order)
    }

    async fn execute(&mut self, order: Vec<usize>) {
        self.plan.transition(PlanStatus::Executing);
        self.publish();

        for idx in order {
            if let Some(interrupt) = self.checkpoint() {
                self.stop(interrupt);
                return;
            }

            if let Some(dep) = self.unmet_dependency(idx) {
                let step_id = self.plan.steps[idx].id.clone();
                self.plan.fail(format!(
                    "step '{}' scheduled before dependency '{}' completed",
                    step_id, dep
                ));
                return;
            }

            match self.run_step(idx).await {
                StepRun::Completed => {}
                StepRun::Failed(error) => {
                    self.plan.fail(error);
                    return;
                }
                StepRun::Interrupted(interrupt) => {
                    self.stop(interrupt);
                    return;
                }
            }
        }

        // An abort requested while the last step ran still wins
        if self.writer.finish(&mut self.plan) == PlanStatus::Aborted {
            info!(task_id = %self.task.id, "Task aborted");
        }
    }

    fn unmet_dependency(&self, idx: usize) -> Option<String> {
        self.plan.steps[idx]
            .dependencies
            .iter()
            .find(|dep| !self.plan.step(dep).is_some_and(|s| s.is_completed()))
            .cloned()
    }

    fn stop(&mut self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::Timeout => {
                if self.plan.transition(PlanStatus::Timeout) {
                    self.plan.error = Some(
                        EngineError::Timeout {
                            task_id: self.task.id.clone(),
                            timeout_ms: self.task.timeout_ms,
                        }
                        .to_string(),
                    );
                }
                warn!(task_id = %self.task.id, "Timeout reached");
            }
            Interrupt::Abort => {
                self.plan.transition(PlanStatus::Aborted);
                info!(task_id = %self.task.id, "Task aborted");
            }
        }
    }

    /// Run step `idx` to completion, retrying failed attempts
    async fn run_step(&mut self, idx: usize) -> StepRun {
        self.plan.current_step_index = idx;

        loop {
            let step = {
                let step = &mut self.plan.steps[idx];
                step.status = StepStatus::Executing;
                step.started_at.get_or_insert_with(Utc::now);
                step.clone()
            };
            self.publish();

            let attempt = step.retry_count + 1;
            debug!(task_id = %self.task.id, step_id = %step.id, kind = %step.kind, attempt, "Executing step");
            self.events.emit(EngineEvent::StepStarted {
                task_id: self.task.id.clone(),
                step_id: step.id.clone(),
                kind: step.kind,
                attempt,
            });

            let scope = ExecutionScope {
                task_id: &self.task.id,
                goal: &self.plan.goal,
                context: &self.plan.context,
            };
            let result = AssertUnwindSafe(self.executor.execute(&step, scope))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(EngineError::step(
                        &step.id,
                        format!("executor panicked: {}", panic_message(&*panic)),
                    ))
                });

            let error = match result {
                Ok(outcome) => {
                    let confidence = {
                        let done = &mut self.plan.steps[idx];
                        done.result = outcome.result;
                        done.confidence = done.confidence.min(outcome.confidence);
                        done.status = StepStatus::Completed;
                        done.completed_at = Some(Utc::now());
                        done.error = None;
                        done.confidence
                    };
                    self.publish();

                    info!(task_id = %self.task.id, step_id = %step.id, confidence, "Step completed");
                    self.events.emit(EngineEvent::StepCompleted {
                        task_id: self.task.id.clone(),
                        step_id: step.id,
                        confidence,
                    });
                    return StepRun::Completed;
                }
                Err(e) => e.to_string(),
            };

            self.plan.steps[idx].error = Some(error.clone());

            if let Some(interrupt) = self.checkpoint() {
                self.abandon(idx, interrupt);
                return StepRun::Interrupted(interrupt);
            }

            let retry_count = {
                let step = &mut self.plan.steps[idx];
                if step.retry_count >= step.max_retries {
                    step.status = StepStatus::Failed;
                    step.completed_at = Some(Utc::now());
                    None
                } else {
                    step.retry_count += 1;
                    step.confidence = self.policy.decay(step.confidence);
                    Some(step.retry_count)
                }
            };
            self.publish();

            let Some(retry_count) = retry_count else {
                warn!(task_id = %self.task.id, step_id = %step.id, error = %error, "Step failed, retries exhausted");
                self.events.emit(EngineEvent::StepFailed {
                    task_id: self.task.id.clone(),
                    step_id: step.id,
                    error: error.clone(),
                });
                return StepRun::Failed(error);
            };

            let delay = self.policy.delay_for(retry_count);
            warn!(
                task_id = %self.task.id,
                step_id = %step.id,
                retry_count,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Step failed, retrying"
            );
            self.events.emit(EngineEvent::StepRetrying {
                task_id: self.task.id.clone(),
                step_id: step.id.clone(),
                retry_count,
                delay_ms: delay.as_millis() as u64,
                error,
            });

            self.backoff(delay).await;

            if let Some(interrupt) = self.checkpoint() {
                self.abandon(idx, interrupt);
                return StepRun::Interrupted(interrupt);
            }
        }
    }

    /// Sleep out a retry delay, waking early on abort or at the deadline
    async fn backoff(&self, delay: Duration) {
        let wake = Instant::now() + delay;
        let wake = self.deadline.map_or(wake, |deadline| wake.min(deadline));

        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {}
            _ = self.writer.aborted() => {}
        }
    }

    /// Record an in-flight step as failed because the flow is stopping
    fn abandon(&mut self, idx: usize, interrupt: Interrupt) {
        let step = &mut self.plan.steps[idx];
        let cause = step.error.take().unwrap_or_default();
        let error = format!("abandoned on {}: {}", interrupt, cause);
        step.status = StepStatus::Failed;
        step.completed_at = Some(Utc::now());
        step.error = Some(error.clone());
        let step_id = step.id.clone();
        self.publish();

        self.events.emit(EngineEvent::StepFailed {
            task_id: self.task.id.clone(),
            step_id,
            error,
        });
    }

    fn finish(&self) {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        match self.plan.status {
            PlanStatus::Completed => info!(task_id = %self.task.id, duration_ms, "Reasoning completed"),
            status => warn!(
                task_id = %self.task.id,
                %status,
                error = ?self.plan.error,
                duration_ms,
                "Reasoning ended early"
            ),
        }
        self.events.emit(EngineEvent::TaskFinished {
            task_id: self.task.id.clone(),
            status: self.plan.status,
            error: self.plan.error.clone(),
            duration_ms,
        });
    }
}
