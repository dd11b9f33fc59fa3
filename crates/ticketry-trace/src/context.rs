//! The trace context value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::{SpanId, TraceId};
use crate::traceparent;

/// Correlation identifiers for one operation within a trace.
///
/// A context is never mutated in place. [`child`](Self::child) and the
/// `with_*` methods return new values; baggage and flags are copied, so a
/// child can add entries without affecting its parent or siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_span_id: Option<SpanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sampled: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    baggage: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    flags: BTreeSet<String>,
}

impl TraceContext {
    /// Starts a new trace with fresh IDs and no sampling decision.
    #[must_use]
    pub fn root() -> Self {
        Self::from_ids(TraceId::generate(), SpanId::generate())
    }

    /// Builds a context from known IDs, e.g. ones received from a caller.
    #[must_use]
    pub fn from_ids(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            sampled: None,
            baggage: BTreeMap::new(),
            flags: BTreeSet::new(),
        }
    }

    /// Derives the context of a sub-operation.
    ///
    /// The child keeps the trace ID and sampling decision, gets a fresh span
    /// ID, records this context's span as its parent, and owns its own copy of
    /// the baggage and flags.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::generate(),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
            baggage: self.baggage.clone(),
            flags: self.flags.clone(),
        }
    }

    /// Returns a copy with an explicit sampling decision.
    #[must_use]
    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.sampled = Some(sampled);
        self
    }

    /// Returns a copy with a parent span recorded.
    #[must_use]
    pub const fn with_parent_span_id(mut self, parent: SpanId) -> Self {
        self.parent_span_id = Some(parent);
        self
    }

    /// Returns a copy with a baggage entry added or replaced.
    #[must_use]
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }

    /// Returns a copy with a flag set.
    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    /// The trace this context belongs to.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// This operation's span.
    #[must_use]
    pub const fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The span of the context this one was derived from, if any.
    #[must_use]
    pub const fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    /// The sampling decision, if one has been made.
    #[must_use]
    pub const fn sampled(&self) -> Option<bool> {
        self.sampled
    }

    /// Returns true only if the context was explicitly sampled.
    #[must_use]
    pub fn is_sampled(&self) -> bool {
        self.sampled == Some(true)
    }

    /// Returns true if this context has no parent span.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// All baggage entries.
    #[must_use]
    pub const fn baggage(&self) -> &BTreeMap<String, String> {
        &self.baggage
    }

    /// Looks up a single baggage entry.
    #[must_use]
    pub fn baggage_item(&self, key: &str) -> Option<&str> {
        self.baggage.get(key).map(String::as_str)
    }

    /// All flags.
    #[must_use]
    pub const fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// Returns true if `flag` is set.
    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// The one-byte trace-flags field of the wire format.
    #[must_use]
    pub fn trace_flags(&self) -> u8 {
        if self.is_sampled() {
            traceparent::SAMPLED_FLAG
        } else {
            0
        }
    }

    /// Encodes this context as a traceparent header value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        traceparent::create_traceparent_header(self)
    }

    /// Decodes a traceparent header value, returning `None` if it is malformed.
    #[must_use]
    pub fn from_traceparent(header: &str) -> Option<Self> {
        traceparent::parse_traceparent_header(header)
    }
}

/// Derives a child context from `parent`.
///
/// Equivalent to [`TraceContext::child`].
#[must_use]
pub fn create_child_context(parent: &TraceContext) -> TraceContext {
    parent.child()
}
