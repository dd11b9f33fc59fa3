//! Sanitize command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use tracing::info;

use ticketry_audit::AuditEvent;
use ticketry_core::{RedactionStats, Redactor};

use super::read_json;

/// Arguments for the sanitize command.
#[derive(Args)]
pub struct SanitizeArgs {
    /// JSON document to redact
    pub input: PathBuf,

    /// Treat the input as a serialized audit event and validate it
    #[arg(long)]
    pub event: bool,

    /// Print redaction counts to stderr
    #[arg(long)]
    pub stats: bool,
}

/// Runs the sanitize command.
pub fn run(args: &SanitizeArgs) -> Result<()> {
    info!(path = ?args.input, "Sanitizing document");

    let document = read_json(&args.input)?;
    let (clean, stats) = if args.event {
        (sanitize_event(&document)?, None)
    } else {
        let (clean, stats) = sanitize_document(&document);
        (clean, Some(stats))
    };

    println!("{}", serde_json::to_string_pretty(&clean)?);
    if let (true, Some(stats)) = (args.stats, stats) {
        eprintln!("redacted: {}, dropped: {}", stats.redacted, stats.dropped);
    }
    Ok(())
}

/// Redacts an arbitrary JSON document.
pub fn sanitize_document(document: &Value) -> (Value, RedactionStats) {
    let mut redactor = Redactor::new();
    let clean = redactor.redact_value(document);
    (clean, redactor.stats())
}

/// Parses, validates and redacts a serialized audit event.
pub fn sanitize_event(document: &Value) -> Result<Value> {
    let event = AuditEvent::from_json(&document.to_string())?;
    Ok(serde_json::to_value(event.sanitized())?)
}
