//! CLI commands and argument parsing.

pub mod diff;
pub mod sanitize;
pub mod trace;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use ticketry_audit::State;

/// Ticketry - audit trail and trace context tools
#[derive(Parser)]
#[command(name = "ticketry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Mint or inspect traceparent headers
    Trace(trace::TraceArgs),

    /// Show field changes between two JSON snapshots
    Diff(diff::DiffArgs),

    /// Redact credentials from a JSON document
    Sanitize(sanitize::SanitizeArgs),

    /// Print version information
    Version,
}

/// Reads a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Reads a JSON file that must hold an object.
pub fn read_state(path: &Path) -> Result<State> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!(
            "{} must contain a JSON object, found {}",
            path.display(),
            kind(&other)
        ),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_state_rejects_non_objects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();

        let err = read_state(file.path()).unwrap_err();
        assert!(err.to_string().contains("found an array"));
    }

    #[test]
    fn test_read_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = read_json(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }
}
