//! Shared types for the reasoning task engine.
//!
//! This crate holds everything a caller or collaborator needs without pulling
//! in the engine itself:
//! - the data model ([`Task`], [`Plan`], [`Step`])
//! - request/response types of the external interface
//! - collaborator traits ([`ToolInvoker`], [`EventNotifier`])
//! - the [`ReasoningRuntime`] trait implemented by the orchestrator
//! - lifecycle events and console logging macros

mod error;
mod model;

pub use error::{EngineError, EngineResult, NotifierError, ToolError};
pub use model::{
    Context, Plan, PlanStatus, Step, StepKind, StepStatus, Task, TaskStatus, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_MS,
};

// Re-export async trait for convenience
pub use async_trait::async_trait;

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// External interface
// ============================================================================

/// Submission input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    pub goal: String,
    #[serde(default)]
    pub context: Context,
    /// Global time budget in milliseconds; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TaskRequest {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_context_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Status returned by submit; execution continues asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    ReasoningStarted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub task_id: String,
    pub status: SubmitStatus,
}

/// Snapshot of a task's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub task_id: String,
    pub status: PlanStatus,
    pub steps_completed: usize,
    pub total_steps: usize,
    pub current_step_index: usize,
    pub plan: Plan,
}

impl From<Plan> for StatusReport {
    fn from(plan: Plan) -> Self {
        Self {
            task_id: plan.task_id.clone(),
            status: plan.status,
            steps_completed: plan.steps_completed(),
            total_steps: plan.steps.len(),
            current_step_index: plan.current_step_index,
            plan,
        }
    }
}

/// Result of an abort request for a known task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortOutcome {
    /// The flow will stop at its next step boundary. The plan is guaranteed
    /// to end `aborted`, even when its last step was already running.
    Signalled,
    /// The plan had already reached a terminal status; nothing changed
    AlreadyTerminal(PlanStatus),
}

// ============================================================================
// Collaborators
// ============================================================================

/// Closed set of action categories an action step can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Create,
    Update,
    Delete,
    Monitor,
    Generic,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Create => "create",
            ActionCategory::Update => "update",
            ActionCategory::Delete => "delete",
            ActionCategory::Monitor => "monitor",
            ActionCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External side-effecting collaborator, called only by action steps.
///
/// Its own retry and timeout semantics are its business; the engine retries a
/// failed action step as a whole, so implementations should tolerate repeats.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        category: ActionCategory,
        content: &str,
        context: &Context,
    ) -> Result<String, ToolError>;
}

/// Best-effort lifecycle notification sink
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn notify(&self, event: &EngineEvent) -> Result<(), NotifierError>;
}

/// Lifecycle events emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Task accepted and its flow started
    TaskStarted { task_id: String, goal: String },
    /// Plan generated and validated
    PlanReady { task_id: String, total_steps: usize },
    /// A step attempt is about to run
    StepStarted {
        task_id: String,
        step_id: String,
        kind: StepKind,
        attempt: u32,
    },
    /// A step attempt failed and will be retried after `delay_ms`
    StepRetrying {
        task_id: String,
        step_id: String,
        retry_count: u32,
        delay_ms: u64,
        error: String,
    },
    /// Step completed
    StepCompleted {
        task_id: String,
        step_id: String,
        confidence: f64,
    },
    /// Step failed for good (retries exhausted or abandoned)
    StepFailed {
        task_id: String,
        step_id: String,
        error: String,
    },
    /// Plan reached its terminal status
    TaskFinished {
        task_id: String,
        status: PlanStatus,
        error: Option<String>,
        duration_ms: u64,
    },
}

impl EngineEvent {
    pub fn task_id(&self) -> &str {
        match self {
            EngineEvent::TaskStarted { task_id, .. }
            | EngineEvent::PlanReady { task_id, .. }
            | EngineEvent::StepStarted { task_id, .. }
            | EngineEvent::StepRetrying { task_id, .. }
            | EngineEvent::StepCompleted { task_id, .. }
            | EngineEvent::StepFailed { task_id, .. }
            | EngineEvent::TaskFinished { task_id, .. } => task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::TaskFinished { .. })
    }
}

/// Runtime trait for task submission and control.
/// Gives CLI and embedding callers one API over the orchestrator.
#[async_trait]
pub trait ReasoningRuntime: Send + Sync {
    /// Validate and start a task; returns before any step runs
    fn submit(&self, request: TaskRequest) -> EngineResult<SubmitReceipt>;

    /// Current progress of a task
    fn status(&self, task_id: &str) -> EngineResult<StatusReport>;

    /// Request cooperative cancellation
    fn abort(&self, task_id: &str) -> EngineResult<AbortOutcome>;

    /// Wait until the task reaches a terminal status
    async fn wait(&self, task_id: &str) -> EngineResult<StatusReport>;
}

// ============================================================================
// Console Logging Macros (for the CLI)
// ============================================================================
// Colored human-readable output, complementing the structured EngineEvent
// stream and the tracing logs of the engine library.

/// Logs a submitted task.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_task_submitted;
/// log_task_submitted!("task_1", "create config file");
/// ```
///
/// Outputs:
/// ```text
/// ═══ TASK task_1 ═══
/// Goal: create config file
/// ```
#[macro_export]
macro_rules! log_task_submitted {
    ($task_id:expr, $goal:expr) => {
        println!("\x1b[1;36m═══ TASK {} ═══\x1b[0m", $task_id);
        println!("\x1b[36mGoal: {}\x1b[0m", $goal);
    };
}

/// Logs the start of a step attempt.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_step_start;
/// log_step_start!("step_1", "analysis", 1);
/// ```
///
/// Outputs:
/// ```text
/// → step_1 [analysis] attempt 1
/// ```
#[macro_export]
macro_rules! log_step_start {
    ($step_id:expr, $kind:expr, $attempt:expr) => {
        println!(
            "\x1b[36m→ {} [{}] attempt {}\x1b[0m",
            $step_id, $kind, $attempt
        );
    };
}

/// Logs a completed step with its confidence.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_step_complete;
/// log_step_complete!("step_2", 0.85);
/// ```
///
/// Outputs:
/// ```text
/// ✓ step_2 complete (confidence 0.85)
/// ```
#[macro_export]
macro_rules! log_step_complete {
    ($step_id:expr, $confidence:expr) => {
        println!(
            "\x1b[32m✓ {} complete (confidence {:.2})\x1b[0m",
            $step_id, $confidence
        );
    };
}

/// Logs a step retry.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_step_retry;
/// log_step_retry!("step_4", 2, 200, "tool unavailable");
/// ```
///
/// Outputs:
/// ```text
/// ⟳ step_4 retry 2 in 200ms: tool unavailable
/// ```
#[macro_export]
macro_rules! log_step_retry {
    ($step_id:expr, $retry:expr, $delay_ms:expr, $error:expr) => {
        println!(
            "\x1b[33m⟳ {} retry {} in {}ms: {}\x1b[0m",
            $step_id, $retry, $delay_ms, $error
        );
    };
}

/// Logs a step that failed for good.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_step_failed;
/// log_step_failed!("step_4", "tool unavailable");
/// ```
///
/// Outputs:
/// ```text
/// ✗ step_4 failed: tool unavailable
/// ```
#[macro_export]
macro_rules! log_step_failed {
    ($step_id:expr, $error:expr) => {
        println!("\x1b[31m✗ {} failed: {}\x1b[0m", $step_id, $error);
    };
}

/// Logs the terminal summary of a task.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_task_summary;
/// log_task_summary!("completed", 4, 4, 312);
/// ```
///
/// Outputs:
/// ```text
/// Result: completed (4/4 steps, 312ms)
/// ```
#[macro_export]
macro_rules! log_task_summary {
    ($status:expr, $completed:expr, $total:expr, $duration_ms:expr) => {
        println!(
            "\x1b[1mResult: {} ({}/{} steps, {}ms)\x1b[0m",
            $status, $completed, $total, $duration_ms
        );
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use reasoning_engine_sdk::log_warning;
/// log_warning!("Event stream lagged");
/// ```
///
/// Outputs:
/// ```text
/// ⚠ Warning: Event stream lagged
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}
