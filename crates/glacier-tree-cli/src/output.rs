//! Output formatting utilities

use anyhow::Context;
use serde::Serialize;

use crate::scenario::{Outcome, RunReport};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize output as JSON")
}

/// Render a scenario report
pub fn format_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Table => Ok(render_table(report)),
    }
}

fn render_table(report: &RunReport) -> String {
    let mut out = String::new();

    for step in &report.steps {
        let status = match &step.outcome {
            Outcome::Accepted => "accepted".to_string(),
            Outcome::Rejected { reason } => format!("rejected: {}", reason),
        };
        out.push_str(&format!("[{}] {} ... {}\n", step.index, step.description, status));

        for observed in &step.observed {
            let changes: Vec<String> = observed
                .changes
                .iter()
                .map(|c| format!("{}{}", c.sign(), c.node))
                .collect();
            out.push_str(&format!("      {}: {}\n", observed.watcher, changes.join(" ")));
        }
    }

    out.push_str("\nTree:\n");
    if report.tree.is_empty() {
        out.push_str("  (empty)\n");
    }
    for line in &report.tree {
        out.push_str(&format!(
            "  {}{} ({})\n",
            "  ".repeat(line.depth),
            line.name,
            line.kind
        ));
    }
    out
}
