use reasoning_engine_sdk::{async_trait, ActionCategory, Context, ToolError, ToolInvoker};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process tool invoker that reports what it would have done.
///
/// Stands in for a real kernel/tool backend; can be told to fail every call.
#[derive(Debug, Default)]
pub struct SimulatedToolInvoker {
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl SimulatedToolInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoker whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolInvoker for SimulatedToolInvoker {
    async fn invoke(
        &self,
        category: ActionCategory,
        _content: &str,
        _context: &Context,
    ) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_with {
            return Err(ToolError::Failed(message.clone()));
        }

        let action = match category {
            ActionCategory::Create => "creation",
            ActionCategory::Update => "update",
            ActionCategory::Delete => "deletion",
            ActionCategory::Monitor => "monitoring",
            ActionCategory::Generic => "generic",
        };
        Ok(format!("Action executed: {}", action))
    }
}
