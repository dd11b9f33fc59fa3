//! Diff command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use tracing::info;

use ticketry_audit::{calculate_changes, ChangeType, FieldChange};

use super::read_state;

/// Arguments for the diff command.
#[derive(Args)]
pub struct DiffArgs {
    /// Snapshot before the change
    pub before: PathBuf,

    /// Snapshot after the change
    pub after: PathBuf,

    /// Print changes as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the diff command.
pub fn run(args: &DiffArgs) -> Result<()> {
    info!(before = ?args.before, after = ?args.after, "Diffing snapshots");

    let before = read_state(&args.before)?;
    let after = read_state(&args.after)?;
    let changes = calculate_changes(&before, &after);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(());
    }

    if changes.is_empty() {
        println!("No changes");
        return Ok(());
    }
    for change in &changes {
        println!("{}", render(change));
    }
    println!("\n{} field(s) changed", changes.len());
    Ok(())
}

fn show(value: Option<&Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), Value::to_string)
}

/// Formats a change as one line.
pub fn render(change: &FieldChange) -> String {
    let old = show(change.old_value.as_ref());
    let new = show(change.new_value.as_ref());
    match change.change_type {
        ChangeType::Added => format!("+ {}: {new}", change.field),
        ChangeType::Removed => format!("- {}: {old}", change.field),
        ChangeType::Modified => format!("~ {}: {old} -> {new}", change.field),
        ChangeType::Reordered => format!("↕ {}: {old} -> {new}", change.field),
    }
}
