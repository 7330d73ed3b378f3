use std::path::Path;

use colored::Colorize;
use dramatis_narration::{RunContext, ToolOutcome, normalize};
use serde_json::Value;

pub fn run(file: &Path, context: Option<&Path>) -> Result<(), String> {
    let content = super::read_file(file)?;
    // Anything that is not JSON goes through as text, which may hold a fenced block.
    let raw = serde_json::from_str::<Value>(&content).unwrap_or(Value::String(content));

    let mut run_context = RunContext::new();
    if let Some(path) = context {
        let outcomes: Vec<ToolOutcome> = super::read_json(path)?;
        for outcome in outcomes {
            run_context.record(outcome);
        }
    }

    let turn = normalize(&raw, &run_context);
    for diagnostic in &turn.diagnostics {
        eprintln!("  {} {}", format!("{}:", diagnostic.stage).yellow(), diagnostic.message);
    }
    if turn.is_fallback() {
        eprintln!("  {}", "narration replaced by fallback".yellow().bold());
    }

    let out = serde_json::to_string_pretty(&turn.payload).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(())
}
