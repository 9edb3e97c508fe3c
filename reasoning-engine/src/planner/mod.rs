//! Plan generation and dependency analysis.
//!
//! - [`PlanGenerator`] turns a task into a plan; [`LinearPlanner`] is the
//!   deterministic default.
//! - [`validate_plan`] checks a generated plan and returns the order in which
//!   the orchestrator walks its steps.

mod linear;

pub use linear::LinearPlanner;

use reasoning_engine_sdk::{async_trait, EngineError, EngineResult, Plan, Task};
use std::collections::{HashMap, HashSet};

/// Goal + context → plan. Substitutable behind this contract: a plan must
/// have at least one step, resolvable dependency ids and no cycles.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn generate(&self, task: &Task) -> EngineResult<Plan>;
}

/// Validate a plan and compute its execution order.
///
/// The order is topological with ties broken by declaration order: each
/// round takes the first not-yet-scheduled step whose dependencies are all
/// scheduled. Returns indices into `plan.steps`.
pub fn validate_plan(plan: &Plan) -> EngineResult<Vec<usize>> {
    if plan.steps.is_empty() {
        return Err(EngineError::plan_generation("plan has no steps"));
    }

    let mut index_by_id: HashMap<&str, usize> = HashMap::new();
    for (idx, step) in plan.steps.iter().enumerate() {
        if index_by_id.insert(step.id.as_str(), idx).is_some() {
            return Err(EngineError::plan_generation(format!(
                "duplicate step id '{}'",
                step.id
            )));
        }
    }

    for step in &plan.steps {
        if !(0.0..=1.0).contains(&step.confidence) {
            return Err(EngineError::plan_generation(format!(
                "step '{}' has confidence {} outside [0, 1]",
                step.id, step.confidence
            )));
        }
        if step.retry_count > step.max_retries {
            return Err(EngineError::plan_generation(format!(
                "step '{}' has retry_count {} above max_retries {}",
                step.id, step.retry_count, step.max_retries
            )));
        }
        for dep in &step.dependencies {
            if dep == &step.id {
                return Err(EngineError::plan_generation(format!(
                    "step '{}' depends on itself",
                    step.id
                )));
            }
            if !index_by_id.contains_key(dep.as_str()) {
                return Err(EngineError::plan_generation(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                )));
            }
        }
    }

    let mut scheduled: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(plan.steps.len());

    while order.len() < plan.steps.len() {
        let next = plan.steps.iter().enumerate().find(|(_, step)| {
            !scheduled.contains(step.id.as_str())
                && step
                    .dependencies
                    .iter()
                    .all(|dep| scheduled.contains(dep.as_str()))
        });

        match next {
            Some((idx, step)) => {
                scheduled.insert(step.id.as_str());
                order.push(idx);
            }
            None => {
                let remaining: Vec<&str> = plan
                    .steps
                    .iter()
                    .filter(|s| !scheduled.contains(s.id.as_str()))
                    .map(|s| s.id.as_str())
                    .collect();
                return Err(EngineError::plan_generation(format!(
                    "circular dependency among steps: {}",
                    remaining.join(", ")
                )));
            }
        }
    }

    Ok(order)
}
