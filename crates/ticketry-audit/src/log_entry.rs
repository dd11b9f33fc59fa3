//! Diagnostic log entries.
//!
//! A [`LogEntry`] is a free-form message emitted while an operation runs. It
//! is not linked to any audit event; the two are correlated through the
//! `trace_id` key in the entry's metadata, which [`LogEntry::new`] fills from
//! the current trace context.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ticketry_core::{Error, Redactor};
use ticketry_trace::{current_context, TraceContext, TraceId};
use uuid::Uuid;

use crate::event::{new_event_id, State};
use crate::filter::DateRange;

/// Metadata key holding the trace ID.
pub const TRACE_ID_KEY: &str = "trace_id";

/// Metadata key holding the span ID.
pub const SPAN_ID_KEY: &str = "span_id";

const TRACE_ID_ALIASES: &[&str] = &[TRACE_ID_KEY, "traceId"];

/// Severity of a log entry, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Developer detail.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Something unexpected that was handled.
    Warn,
    /// An operation failed.
    Error,
    /// The process cannot continue.
    Fatal,
}

impl LogLevel {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(Error::InvalidInput {
                reason: format!("unknown log level '{other}'"),
            }),
        }
    }
}

/// Writes the trace and span IDs of `ctx` into a metadata map.
pub(crate) fn trace_metadata(ctx: &TraceContext) -> State {
    let mut metadata = State::new();
    metadata.insert(TRACE_ID_KEY.into(), Value::String(ctx.trace_id().to_string()));
    metadata.insert(SPAN_ID_KEY.into(), Value::String(ctx.span_id().to_string()));
    metadata
}

/// Reads a trace ID back out of metadata written by [`trace_metadata`] or a
/// collaborator using the camel-case key.
pub(crate) fn extract_trace_id(metadata: &State) -> Option<TraceId> {
    TRACE_ID_ALIASES
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| value.as_str()?.parse().ok())
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    id: Uuid,
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<State>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time and, if one is active,
    /// the current trace context.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: new_event_id(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            metadata: current_context().as_ref().map(trace_metadata),
        }
    }

    /// Creates a `debug` entry.
    #[must_use]
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, message)
    }

    /// Creates an `info` entry.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    /// Creates a `warn` entry.
    #[must_use]
    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    /// Creates an `error` entry.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Creates a `fatal` entry.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Fatal, message)
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(State::new)
            .insert(key.into(), value.into());
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Entry ID.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// When the entry was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Severity.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attached metadata.
    #[must_use]
    pub const fn metadata(&self) -> Option<&State> {
        self.metadata.as_ref()
    }

    /// The trace this entry belongs to, if its metadata names one.
    #[must_use]
    pub fn trace_id(&self) -> Option<TraceId> {
        self.metadata.as_ref().and_then(extract_trace_id)
    }

    /// Returns a copy with sensitive metadata redacted.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let Some(metadata) = &self.metadata else {
            return self.clone();
        };
        let mut redactor = Redactor::new();
        let metadata = redactor.redact_object(metadata);
        redactor.report(&self.id.to_string());
        Self {
            metadata: Some(metadata),
            ..self.clone()
        }
    }

    /// Returns true if this entry satisfies every clause of `filter`.
    #[must_use]
    pub fn matches(&self, filter: &LogFilter) -> bool {
        filter.matches(self)
    }
}

/// A conjunction of optional clauses over log entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    /// Allowed levels.
    pub levels: BTreeSet<LogLevel>,
    /// Lowest allowed level.
    pub min_level: Option<LogLevel>,
    /// Case-insensitive substring of the message.
    pub message_contains: Option<String>,
    /// Allowed trace IDs.
    pub trace_ids: BTreeSet<TraceId>,
    /// Allowed time window.
    pub date_range: Option<DateRange>,
}

impl LogFilter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an allowed level.
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.levels.insert(level);
        self
    }

    /// Requires at least `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Requires the message to contain `needle`, ignoring case.
    #[must_use]
    pub fn message_contains(mut self, needle: impl Into<String>) -> Self {
        self.message_contains = Some(needle.into());
        self
    }

    /// Adds an allowed trace ID.
    #[must_use]
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_ids.insert(trace_id);
        self
    }

    /// Restricts matches to a time window.
    #[must_use]
    pub const fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Returns true if `entry` satisfies every clause.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        let level_ok = self.levels.is_empty() || self.levels.contains(&entry.level);
        let min_ok = self.min_level.map_or(true, |min| entry.level >= min);
        let message_ok = match self.message_contains.as_deref().filter(|n| !n.is_empty()) {
            None => true,
            Some(needle) => entry
                .message
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        };
        let trace_ok = self.trace_ids.is_empty()
            || entry
                .trace_id()
                .is_some_and(|id| self.trace_ids.contains(&id));
        let date_ok = self
            .date_range
            .map_or(true, |range| range.contains(entry.timestamp));

        level_ok && min_ok && message_ok && trace_ok && date_ok
    }
}
