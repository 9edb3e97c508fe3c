//! Data model for reasoning tasks.
//!
//! A [`Task`] is what a caller submits. The orchestrator turns it into a
//! [`Plan`], a dependency graph of [`Step`]s, and walks that plan to exactly
//! one terminal [`PlanStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form key/value context attached to a task.
///
/// Ordered so that anything derived from it (validation reports, plans) is
/// deterministic for identical input.
pub type Context = BTreeMap<String, serde_json::Value>;

/// Default global timeout for a task, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of retries per step
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ============================================================================
// Task
// ============================================================================

/// Lifecycle status of a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Submitted,
    Planning,
    Executing,
    Completed,
    Failed,
    Timeout,
    Aborted,
}

impl From<PlanStatus> for TaskStatus {
    fn from(status: PlanStatus) -> Self {
        match status {
            PlanStatus::Planning => TaskStatus::Planning,
            PlanStatus::Executing => TaskStatus::Executing,
            PlanStatus::Completed => TaskStatus::Completed,
            PlanStatus::Failed => TaskStatus::Failed,
            PlanStatus::Timeout => TaskStatus::Timeout,
            PlanStatus::Aborted => TaskStatus::Aborted,
        }
    }
}

/// A caller-submitted goal plus its execution time budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub goal: String,
    #[serde(default)]
    pub context: Context,
    pub timeout_ms: u64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, goal: impl Into<String>, context: Context, timeout_ms: u64) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            context,
            timeout_ms,
            status: TaskStatus::Submitted,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Step
// ============================================================================

/// What a step does; decides how the executor dispatches it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Analysis,
    Planning,
    Validation,
    Action,
}

impl StepKind {
    /// Only action steps reach external collaborators
    pub fn is_local(&self) -> bool {
        !matches!(self, StepKind::Action)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Analysis => "analysis",
            StepKind::Planning => "planning",
            StepKind::Validation => "validation",
            StepKind::Action => "action",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

/// One unit of reasoning or action with its own retry and confidence state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub content: String,
    /// Ids of steps in the same plan that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: StepStatus,
    #[serde(default)]
    pub result: String,
    /// Heuristic trust in `result`, in [0, 1]
    pub confidence: f64,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            dependencies: Vec::new(),
            status: StepStatus::Pending,
            result: String::new(),
            confidence: 1.0,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Status of an execution plan. Transitions only move toward a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Planning,
    Executing,
    Completed,
    Failed,
    Timeout,
    Aborted,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Timeout | PlanStatus::Aborted
        )
    }

    fn rank(&self) -> u8 {
        match self {
            PlanStatus::Planning => 0,
            PlanStatus::Executing => 1,
            _ => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planning => "planning",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Timeout => "timeout",
            PlanStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency-graph decomposition of a task into steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub task_id: String,
    pub goal: String,
    pub status: PlanStatus,
    pub steps: Vec<Step>,
    /// Declaration index of the step most recently started
    pub current_step_index: usize,
    #[serde(default)]
    pub context: Context,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Plan {
    /// Empty plan in `planning` status for the given task
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            goal: task.goal.clone(),
            status: PlanStatus::Planning,
            steps: Vec::new(),
            current_step_index: 0,
            context: task.context.clone(),
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    /// Move to `next` if that is a forward transition.
    ///
    /// Terminal statuses are never overwritten; entering one stamps
    /// `completed_at`. Returns whether the status changed.
    pub fn transition(&mut self, next: PlanStatus) -> bool {
        if self.status.is_terminal() || next.rank() < self.status.rank() || next == self.status {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    /// Enter `failed` with `error` unless already terminal
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.transition(PlanStatus::Failed) {
            self.error = Some(error.into());
            true
        } else {
            false
        }
    }

    pub fn steps_completed(&self) -> usize {
        self.steps.iter().filter(|s| s.is_completed()).count()
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}
