use reasoning_engine_sdk::{
    async_trait, EngineError, EngineResult, Plan, Step, StepKind, Task, DEFAULT_MAX_RETRIES,
};

/// Default planner: analysis → planning → validation → action, each step
/// depending on the one before it.
#[derive(Debug, Clone)]
pub struct LinearPlanner {
    max_retries: u32,
}

impl LinearPlanner {
    pub const ANALYSIS_PRIOR: f64 = 0.90;
    pub const PLANNING_PRIOR: f64 = 0.85;
    pub const VALIDATION_PRIOR: f64 = 0.98;
    pub const ACTION_PRIOR: f64 = 0.85;

    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Build the four-step chain for `task`
    pub fn build(&self, task: &Task) -> EngineResult<Plan> {
        let goal = task.goal.trim();
        if goal.is_empty() {
            return Err(EngineError::plan_generation("goal is empty"));
        }

        let blueprint = [
            (StepKind::Analysis, format!("Analyzing: {}", goal), Self::ANALYSIS_PRIOR),
            (StepKind::Planning, "Decomposing into subtasks".to_string(), Self::PLANNING_PRIOR),
            (StepKind::Validation, "Validating logic".to_string(), Self::VALIDATION_PRIOR),
            (StepKind::Action, format!("Execute: {}", goal), Self::ACTION_PRIOR),
        ];

        let mut steps: Vec<Step> = Vec::with_capacity(blueprint.len());
        for (idx, (kind, content, prior)) in blueprint.into_iter().enumerate() {
            let mut step = Step::new(format!("step_{}", idx + 1), kind, content)
                .with_confidence(prior)
                .with_max_retries(self.max_retries);
            if let Some(previous) = steps.last() {
                step = step.depends_on(previous.id.clone());
            }
            steps.push(step);
        }

        Ok(Plan::for_task(task).with_steps(steps))
    }
}

impl Default for LinearPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

#[async_trait]
impl super::PlanGenerator for LinearPlanner {
    fn name(&self) -> &str {
        "linear"
    }

    async fn generate(&self, task: &Task) -> EngineResult<Plan> {
        self.build(task)
    }
}
