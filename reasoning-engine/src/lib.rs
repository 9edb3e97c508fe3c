// CLI argument parsing
pub mod cli;

// Engine configuration
pub mod config;

// Step execution
pub mod executor;

// Event notifiers
pub mod notifier;

// Task orchestration
pub mod orchestrator;

// Plan generation and validation
pub mod planner;

// Plan registry
pub mod registry;

pub use config::EngineConfig;
pub use orchestrator::{OrchestratorBuilder, TaskOrchestrator};
