//! Plan registry shared between task flows and status readers.
//!
//! Each plan has exactly one writer, the flow that owns it, which publishes
//! whole-plan snapshots through a watch channel. Readers (status polling,
//! waiters) only ever see complete snapshots, never a half-applied step
//! update. The map itself is the only structure touched by several flows.

use chrono::Utc;
use reasoning_engine_sdk::{
    AbortOutcome, EngineError, EngineResult, Plan, PlanStatus, Task, TaskStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RegistryConfig;

/// Registered task with its plan channel
struct Entry {
    task: Task,
    plan: watch::Receiver<Plan>,
    abort: CancellationToken,
    last_access: Instant,
}

impl Entry {
    fn is_terminal(&self) -> bool {
        self.plan.borrow().status.is_terminal()
    }

    fn is_expired(&self, ttl: std::time::Duration) -> bool {
        let plan = self.plan.borrow();
        match (plan.status.is_terminal(), plan.completed_at) {
            (true, Some(completed_at)) => Utc::now()
                .signed_duration_since(completed_at)
                .to_std()
                .map(|age| age >= ttl)
                .unwrap_or(ttl.is_zero()),
            _ => false,
        }
    }
}

/// Write half of a registered plan, owned by the task's flow
#[derive(Debug)]
pub struct PlanWriter {
    task_id: String,
    tx: watch::Sender<Plan>,
    abort: CancellationToken,
}

impl PlanWriter {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Replace the visible snapshot with `plan`
    pub fn publish(&self, plan: &Plan) {
        self.tx.send_replace(plan.clone());
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Resolves once an abort has been requested
    pub async fn aborted(&self) {
        self.abort.cancelled().await
    }

    /// Move `plan` to `completed`, or `aborted` if an abort is pending, and
    /// publish it.
    ///
    /// The decision is taken under the channel's write lock, and
    /// [`PlanRegistry::signal_abort`] checks status and cancels under the
    /// read lock, so a reported `Signalled` always ends in `aborted`.
    pub fn finish(&self, plan: &mut Plan) -> PlanStatus {
        self.tx.send_modify(|shared| {
            if self.abort.is_cancelled() {
                plan.transition(PlanStatus::Aborted);
            } else {
                plan.transition(PlanStatus::Completed);
            }
            *shared = plan.clone();
        });
        plan.status
    }
}

impl Drop for PlanWriter {
    // A flow that unwinds or returns early must not leave its plan live
    fn drop(&mut self) {
        let failed = self
            .tx
            .send_if_modified(|plan| plan.fail("flow ended without reaching a terminal status"));
        if failed {
            warn!(task_id = %self.task_id, "Plan writer dropped while live; marked failed");
        }
    }
}

/// Concurrent task id → plan map with bounded retention
pub struct PlanRegistry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    config: RegistryConfig,
}

impl PlanRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries stay consistent even if a holder panicked; no invariant spans the lock.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `plan` for `task` and hand back its single writer
    pub fn insert(&self, task: Task, plan: Plan) -> EngineResult<PlanWriter> {
        let mut entries = self.lock();

        if entries.contains_key(&task.id) {
            return Err(EngineError::Duplicate(task.id));
        }

        Self::evict_locked(&mut entries, &self.config);

        let task_id = task.id.clone();
        let (tx, rx) = watch::channel(plan);
        let abort = CancellationToken::new();

        entries.insert(
            task_id.clone(),
            Entry {
                task,
                plan: rx,
                abort: abort.clone(),
                last_access: Instant::now(),
            },
        );

        Ok(PlanWriter { task_id, tx, abort })
    }

    /// Latest plan snapshot
    pub fn get(&self, task_id: &str) -> Option<Plan> {
        let mut entries = self.lock();
        let entry = entries.get_mut(task_id)?;
        entry.last_access = Instant::now();
        let plan = entry.plan.borrow().clone();
        Some(plan)
    }

    /// The submitted task, with its status taken from the current plan
    pub fn task(&self, task_id: &str) -> Option<Task> {
        let entries = self.lock();
        let entry = entries.get(task_id)?;
        let mut task = entry.task.clone();
        task.status = TaskStatus::from(entry.plan.borrow().status);
        Some(task)
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self, task_id: &str) -> Option<watch::Receiver<Plan>> {
        let entries = self.lock();
        entries.get(task_id).map(|entry| entry.plan.clone())
    }

    /// Ask the owning flow to stop at its next step boundary
    pub fn signal_abort(&self, task_id: &str) -> Option<AbortOutcome> {
        let mut entries = self.lock();
        let entry = entries.get_mut(task_id)?;
        entry.last_access = Instant::now();

        // Hold the read lock so a concurrent `PlanWriter::finish` sees the token
        let plan = entry.plan.borrow();
        if plan.status.is_terminal() {
            return Some(AbortOutcome::AlreadyTerminal(plan.status));
        }
        entry.abort.cancel();
        Some(AbortOutcome::Signalled)
    }

    /// Signal abort to every live plan; returns how many were signalled
    pub fn abort_all(&self) -> usize {
        let entries = self.lock();
        let mut signalled = 0;
        for entry in entries.values().filter(|entry| !entry.is_terminal()) {
            entry.abort.cancel();
            signalled += 1;
        }
        signalled
    }

    /// Drop terminal plans past their retention period
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.lock();
        let ttl = self.config.terminal_ttl();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(ttl));
        before - entries.len()
    }

    fn evict_locked(entries: &mut HashMap<String, Entry>, config: &RegistryConfig) {
        let ttl = config.terminal_ttl();
        entries.retain(|task_id, entry| {
            let expired = entry.is_expired(ttl);
            if expired {
                debug!(task_id = %task_id, "Evicting expired plan");
            }
            !expired
        });

        // Make room for one more, oldest-accessed terminal plans first
        while entries.len() >= config.max_plans {
            let victim = entries
                .iter()
                .filter(|(_, entry)| entry.is_terminal())
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(task_id, _)| task_id.clone());

            match victim {
                Some(task_id) => {
                    debug!(task_id = %task_id, "Evicting least recently used plan");
                    entries.remove(&task_id);
                }
                None => {
                    warn!(
                        live = entries.len(),
                        max_plans = config.max_plans,
                        "Plan registry over capacity with only live plans"
                    );
                    break;
                }
            }
        }
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Clone for PlanRegistry {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            config: self.config.clone(),
        }
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
