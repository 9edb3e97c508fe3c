//! Task orchestration.
//!
//! [`TaskOrchestrator`] accepts tasks, registers a plan for each one and
//! drives it on its own Tokio task. Callers poll with `status`, block with
//! `wait`, or stop a task with `abort`.

mod flow;
mod retry;

pub use retry::RetryPolicy;

use reasoning_engine_sdk::{
    async_trait, AbortOutcome, EngineError, EngineResult, EventNotifier, Plan, ReasoningRuntime,
    StatusReport, SubmitReceipt, SubmitStatus, Task, TaskRequest, ToolInvoker,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::executor::{ActionClassifier, KeywordClassifier, SimulatedToolInvoker, StepExecutor};
use crate::notifier::{EventSink, TracingNotifier};
use crate::planner::{LinearPlanner, PlanGenerator};
use crate::registry::PlanRegistry;
use flow::TaskFlow;

/// Join handles of running flows, keyed by task id
#[derive(Default)]
struct FlowHandles {
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl FlowHandles {
    fn register(&self, task_id: String, handle: JoinHandle<()>) {
        let mut handles = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handles.retain(|_, handle| !handle.is_finished());
        handles.insert(task_id, handle);
    }

    fn drain(&self) -> Vec<(String, JoinHandle<()>)> {
        let mut handles = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handles.drain().collect()
    }
}

/// Builder for [`TaskOrchestrator`]; every collaborator has a default
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: EngineConfig,
    generator: Option<Arc<dyn PlanGenerator>>,
    tools: Option<Arc<dyn ToolInvoker>>,
    classifier: Option<Arc<dyn ActionClassifier>>,
    notifier: Option<Arc<dyn EventNotifier>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn plan_generator(mut self, generator: Arc<dyn PlanGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn tool_invoker(mut self, tools: Arc<dyn ToolInvoker>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ActionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> anyhow::Result<TaskOrchestrator> {
        self.config.validate()?;

        let max_retries = self.config.retry.max_retries;
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(LinearPlanner::new(max_retries)));
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(SimulatedToolInvoker::new()));
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordClassifier::default()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        Ok(TaskOrchestrator {
            registry: PlanRegistry::new(self.config.registry.clone()),
            policy: RetryPolicy::from(&self.config.retry),
            executor: Arc::new(StepExecutor::new(tools, classifier)),
            generator,
            notifier,
            config: self.config,
            flows: FlowHandles::default(),
        })
    }
}

/// Accepts reasoning tasks and runs one flow per task
pub struct TaskOrchestrator {
    registry: PlanRegistry,
    generator: Arc<dyn PlanGenerator>,
    executor: Arc<StepExecutor>,
    notifier: Arc<dyn EventNotifier>,
    policy: RetryPolicy,
    config: EngineConfig,
    flows: FlowHandles,
}

impl TaskOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlanRegistry {
        &self.registry
    }

    /// Validate `request`, register a placeholder plan and spawn the flow.
    ///
    /// Must be called inside a Tokio runtime. Returns before any step runs.
    pub fn submit(&self, request: TaskRequest) -> EngineResult<SubmitReceipt> {
        if request.goal.trim().is_empty() {
            return Err(EngineError::validation("goal must be a non-empty string"));
        }
        let timeout_ms = request.timeout_ms.unwrap_or(self.config.default_timeout_ms);
        if timeout_ms == 0 {
            return Err(EngineError::validation(
                "timeout must be a positive number of milliseconds",
            ));
        }

        let task_id = format!("task_{}", Uuid::new_v4().simple());
        let task = Task::new(task_id.clone(), request.goal, request.context, timeout_ms);
        let placeholder = Plan::for_task(&task);
        let writer = self.registry.insert(task.clone(), placeholder.clone())?;

        info!(task_id = %task_id, goal = %task.goal, timeout_ms, "Task submitted");

        let flow = TaskFlow::new(
            task,
            placeholder,
            writer,
            Arc::clone(&self.generator),
            Arc::clone(&self.executor),
            self.policy,
            EventSink::spawn(Arc::clone(&self.notifier)),
        );
        self.flows.register(task_id.clone(), tokio::spawn(flow.run()));

        Ok(SubmitReceipt {
            task_id,
            status: SubmitStatus::ReasoningStarted,
        })
    }

    pub fn status(&self, task_id: &str) -> EngineResult<StatusReport> {
        self.registry
            .get(task_id)
            .map(StatusReport::from)
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))
    }

    /// The submitted task with its current status
    pub fn task(&self, task_id: &str) -> EngineResult<Task> {
        self.registry
            .task(task_id)
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))
    }

    /// Request cooperative cancellation; a terminal plan is left untouched
    pub fn abort(&self, task_id: &str) -> EngineResult<AbortOutcome> {
        let outcome = self
            .registry
            .signal_abort(task_id)
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))?;
        info!(task_id = %task_id, ?outcome, "Abort requested");
        Ok(outcome)
    }

    /// Wait for the task's plan to reach a terminal status
    pub async fn wait(&self, task_id: &str) -> EngineResult<StatusReport> {
        let mut rx = self
            .registry
            .subscribe(task_id)
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))?;

        let result = match rx.wait_for(|plan| plan.status.is_terminal()).await {
            Ok(plan) => Ok(StatusReport::from(plan.clone())),
            Err(_) => {
                warn!(task_id = %task_id, "Flow ended before a terminal status");
                Err(EngineError::FlowLost(task_id.to_string()))
            }
        };
        result
    }

    /// Abort every live task and wait for all flows to exit
    pub async fn shutdown(&self) {
        let signalled = self.registry.abort_all();
        let flows = self.flows.drain();
        info!(signalled, flows = flows.len(), "Shutting down orchestrator");

        let results = futures::future::join_all(flows.into_iter().map(|(task_id, handle)| async move {
            (task_id, handle.await)
        }))
        .await;

        for (task_id, result) in results {
            if let Err(e) = result {
                warn!(task_id = %task_id, error = %e, "Flow did not exit cleanly");
            }
        }
    }
}

#[async_trait]
impl ReasoningRuntime for TaskOrchestrator {
    fn submit(&self, request: TaskRequest) -> EngineResult<SubmitReceipt> {
        TaskOrchestrator::submit(self, request)
    }

    fn status(&self, task_id: &str) -> EngineResult<StatusReport> {
        TaskOrchestrator::status(self, task_id)
    }

    fn abort(&self, task_id: &str) -> EngineResult<AbortOutcome> {
        TaskOrchestrator::abort(self, task_id)
    }

    async fn wait(&self, task_id: &str) -> EngineResult<StatusReport> {
        TaskOrchestrator::wait(self, task_id).await
    }
}
