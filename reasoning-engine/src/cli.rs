//! CLI argument parsing for the reasoning engine binary

use anyhow::Result;
use clap::Parser;
use reasoning_engine_sdk::{Context, TaskRequest};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::EngineConfig;

/// Reasoning Engine CLI Arguments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "reasoning-engine",
    about = "Decompose a goal into a plan of reasoning steps and execute it"
)]
pub struct Args {
    /// Natural-language goal to reason about
    #[arg(short, long)]
    pub goal: String,

    /// Context entry as key=value (repeatable); JSON values are parsed, anything else is a string
    #[arg(short, long = "context", value_parser = parse_context_entry)]
    pub context: Vec<(String, Value)>,

    /// Global time budget in milliseconds (default from config)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// YAML engine config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Make every action step fail, to exercise retries
    #[arg(long)]
    pub fail_actions: bool,

    /// Print the final status report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a `key=value` context entry
pub fn parse_context_entry(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty context key in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Resolved run settings
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub goal: String,
    pub context: Context,
    pub timeout_ms: Option<u64>,
    pub config_path: Option<PathBuf>,
    pub fail_actions: bool,
    pub json: bool,
}

impl RunConfig {
    /// Engine config from the optional file, then environment overrides
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = match &self.config_path {
            Some(path) => EngineConfig::from_yaml_file(path)?,
            None => EngineConfig::default(),
        };
        config.with_env_overrides()
    }

    pub fn request(&self) -> TaskRequest {
        let request = TaskRequest::new(self.goal.clone()).with_context(self.context.clone());
        match self.timeout_ms {
            Some(timeout_ms) => request.with_timeout_ms(timeout_ms),
            None => request,
        }
    }
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig {
            goal: args.goal,
            context: args.context.into_iter().collect(),
            timeout_ms: args.timeout,
            config_path: args.config,
            fail_actions: args.fail_actions,
            json: args.json,
        }
    }
}
