//! Error taxonomy shared by the engine and its collaborators.

use thiserror::Error;

/// Errors surfaced by the reasoning engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Malformed submission, rejected before a task exists
    #[error("validation error: {0}")]
    Validation(String),

    /// The plan generator produced no usable plan
    #[error("plan generation failed: {0}")]
    PlanGeneration(String),

    /// A step attempt failed
    #[error("step '{step_id}' failed: {message}")]
    StepExecution { step_id: String, message: String },

    /// The task ran past its time budget
    #[error("task '{task_id}' timed out after {timeout_ms} ms")]
    Timeout { task_id: String, timeout_ms: u64 },

    /// Unknown task id on a status or abort query
    #[error("task not found: {0}")]
    NotFound(String),

    /// A plan is already registered under this task id
    #[error("task already registered: {0}")]
    Duplicate(String),

    /// The flow driving a task went away before its plan became terminal
    #[error("task '{0}' stopped without a terminal status")]
    FlowLost(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn plan_generation(message: impl Into<String>) -> Self {
        EngineError::PlanGeneration(message.into())
    }

    pub fn step(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::StepExecution {
            step_id: step_id.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by a [`crate::ToolInvoker`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("tool unavailable: {0}")]
    Unavailable(String),

    #[error("tool invocation failed: {0}")]
    Failed(String),
}

/// Failure reported by an [`crate::EventNotifier`]; logged, never propagated
#[derive(Debug, Clone, Error, PartialEq)]
#[error("notification failed: {0}")]
pub struct NotifierError(pub String);

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
