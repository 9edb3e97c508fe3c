//! Step execution.
//!
//! [`StepExecutor`] dispatches a step by kind:
//! - **local**: analysis, planning, validation (pure, safely retryable)
//! - **action**: classified into an [`ActionCategory`] and handed to the
//!   [`ToolInvoker`] collaborator

pub mod classifier;
pub mod local;
mod tools;

pub use classifier::{ActionClassifier, KeywordClassifier};
pub use tools::SimulatedToolInvoker;

use reasoning_engine_sdk::{
    ActionCategory, Context, EngineError, EngineResult, Step, StepKind, ToolInvoker,
};
use std::sync::Arc;
use tracing::debug;

/// Confidence reported for a successful action step
pub const ACTION_CONFIDENCE: f64 = 0.85;

/// Read-only view of the task a step runs for
#[derive(Debug, Clone, Copy)]
pub struct ExecutionScope<'a> {
    pub task_id: &'a str,
    pub goal: &'a str,
    pub context: &'a Context,
}

/// What a successful attempt produced
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub result: String,
    pub confidence: f64,
}

pub struct StepExecutor {
    tools: Arc<dyn ToolInvoker>,
    classifier: Arc<dyn ActionClassifier>,
}

impl StepExecutor {
    pub fn new(tools: Arc<dyn ToolInvoker>, classifier: Arc<dyn ActionClassifier>) -> Self {
        Self { tools, classifier }
    }

    pub fn classify(&self, content: &str) -> ActionCategory {
        self.classifier.classify(content)
    }

    /// Run one attempt of `step`
    pub async fn execute(&self, step: &Step, scope: ExecutionScope<'_>) -> EngineResult<StepOutcome> {
        let outcome = match step.kind {
            StepKind::Analysis => StepOutcome {
                result: local::analyze(scope.goal, scope.context),
                confidence: local::ANALYSIS_CONFIDENCE,
            },
            StepKind::Planning => StepOutcome {
                result: local::plan(scope.goal),
                confidence: local::PLANNING_CONFIDENCE,
            },
            StepKind::Validation => StepOutcome {
                result: local::validate(scope.context),
                confidence: local::VALIDATION_CONFIDENCE,
            },
            StepKind::Action => {
                let category = self.classify(&step.content);
                debug!(
                    task_id = scope.task_id,
                    step_id = %step.id,
                    %category,
                    "Invoking tool for action step"
                );
                let result = self
                    .tools
                    .invoke(category, &step.content, scope.context)
                    .await
                    .map_err(|e| EngineError::step(&step.id, e.to_string()))?;
                StepOutcome {
                    result,
                    confidence: ACTION_CONFIDENCE,
                }
            }
        };

        Ok(outcome)
    }
}
