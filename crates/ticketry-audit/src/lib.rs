//! Audit trail for Ticketry.
//!
//! This crate records who did what to which entity, and when:
//!
//! - [`AuditEvent`] - one completed create, read, update or delete, with the
//!   entity state it touched and the trace it belongs to
//! - [`calculate_changes`] - top-level field diffs for updates
//! - [`sanitize`] - redaction of credentials before events leave the process
//! - [`AuditFilter`] / [`calculate_statistics`] - querying and summarizing
//! - [`LogEntry`] - free-form diagnostics correlated by trace ID
//! - [`AuditLogger`] - delivery to pluggable [`AuditBackend`]s
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use ticketry_audit::{
//!     Actor, AuditEvent, AuditLogger, EventOptions, InMemoryBackend, REDACTION_MARKER,
//! };
//!
//! let backend = Arc::new(InMemoryBackend::new());
//! let logger = AuditLogger::builder()
//!     .with_backend(backend.clone())
//!     .build();
//!
//! let event = AuditEvent::update(
//!     Actor::ai("assistant", "alice"),
//!     "ticket",
//!     "T-42",
//!     json!({ "status": "open", "token": "abc" }),
//!     json!({ "status": "closed", "token": "abc" }),
//!     "mcp",
//!     EventOptions::new(),
//! )
//! .unwrap();
//! assert_eq!(event.changes().len(), 1);
//!
//! logger.log_event(&event).unwrap();
//!
//! let stored = &backend.events()[0];
//! assert_eq!(stored.before().unwrap()["token"], REDACTION_MARKER);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod actor;
mod diff;
mod event;
mod filter;
mod log_entry;
mod logger;
mod stats;


pub use actor::{Actor, ActorType};
pub use diff::{calculate_changes, ChangeType, FieldChange};
pub use event::{
    sanitize, AuditEvent, AuditEventBuilder, AuditPayload, EventContext, EventOptions, Operation,
    State,
};
pub use filter::{AuditFilter, DateRange};
pub use log_entry::{LogEntry, LogFilter, LogLevel, SPAN_ID_KEY, TRACE_ID_KEY};
pub use logger::{
    AuditBackend, AuditLogger, AuditLoggerBuilder, InMemoryBackend, LoggerError, TracingBackend,
};
pub use stats::{calculate_statistics, AuditStatistics, StatisticsPeriod};
pub use ticketry_core::REDACTION_MARKER;

/// Returns true if `event` satisfies every clause of `filter`.
#[must_use]
pub fn matches(event: &AuditEvent, filter: &AuditFilter) -> bool {
    filter.matches(event)
}
