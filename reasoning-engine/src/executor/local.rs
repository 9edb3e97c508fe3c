//! Local (side-effect free) step computations.
//!
//! Each is a pure function of goal and context, so re-running one after a
//! failure yields the same text and confidence.

use reasoning_engine_sdk::Context;
use serde_json::Value;

pub const ANALYSIS_CONFIDENCE: f64 = 0.95;
pub const PLANNING_CONFIDENCE: f64 = 0.90;
pub const VALIDATION_CONFIDENCE: f64 = 0.98;

/// Rough goal complexity by word count
pub fn estimate_complexity(goal: &str) -> &'static str {
    match goal.split_whitespace().count() {
        n if n < 5 => "Low",
        n if n < 15 => "Medium",
        _ => "High",
    }
}

pub fn analyze(goal: &str, context: &Context) -> String {
    format!(
        "Analysis of: \"{}\"\nContext items: {}\nComplexity: {}\n",
        goal,
        context.len(),
        estimate_complexity(goal)
    )
}

/// Canned subtask list keyed on the goal's verb
pub fn decompose_goal(goal: &str) -> [&'static str; 4] {
    let lower = goal.to_lowercase();

    if lower.contains("create") {
        ["Validate requirements", "Prepare resources", "Execute creation", "Verify result"]
    } else if lower.contains("monitor") {
        ["Collect metrics", "Analyze data", "Compare thresholds", "Report status"]
    } else if lower.contains("update") {
        ["Check version", "Download update", "Verify integrity", "Apply update"]
    } else if lower.contains("delete") {
        ["Validate permissions", "Backup data", "Execute deletion", "Confirm cleanup"]
    } else {
        ["Plan approach", "Gather information", "Execute action", "Evaluate outcome"]
    }
}

pub fn plan(goal: &str) -> String {
    let mut planning = String::from("Plan decomposed into subtasks:\n");
    for (i, subtask) in decompose_goal(goal).iter().enumerate() {
        planning.push_str(&format!("{}. {}\n", i + 1, subtask));
    }
    planning
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

pub fn validate(context: &Context) -> String {
    let mut validation = String::from("Logical validation:\n");

    let missing: Vec<&String> = context
        .iter()
        .filter(|(_, value)| is_falsy(value))
        .map(|(key, _)| key)
        .collect();

    if missing.is_empty() {
        validation.push_str("- All contexts valid\n");
    } else {
        for key in missing {
            validation.push_str(&format!("- Missing context: {}\n", key));
        }
        validation.push_str("- Some contexts missing, proceeding anyway\n");
    }

    validation
}
