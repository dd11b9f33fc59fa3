//! Trace context management for Ticketry.
//!
//! This crate generates, encodes and propagates the correlation identifiers
//! that tie audit events and log entries back to one logical request:
//!
//! - [`TraceId`] / [`SpanId`] - 128-bit and 64-bit identifiers rendered as
//!   lowercase hex
//! - [`TraceContext`] - an immutable trace/span pair with baggage and flags;
//!   [`TraceContext::child`] derives sub-operation contexts
//! - [`traceparent`] - the `00-<trace>-<span>-<flags>` wire format
//! - [`Sampler`] - sticky, rate-based sampling decisions
//! - [`scope`] - task-scoped "current context" propagation
//!
//! # Example
//!
//! ```rust
//! use ticketry_trace::{current_context, with_context, TraceContext};
//!
//! let root = TraceContext::root().with_sampled(true);
//! let header = root.to_traceparent();
//!
//! let seen = with_context(root.child(), || current_context());
//! let seen = seen.unwrap();
//! assert_eq!(seen.trace_id(), root.trace_id());
//! assert_eq!(seen.parent_span_id(), Some(root.span_id()));
//!
//! // outside the scope there is no current context
//! assert!(current_context().is_none());
//! assert!(header.starts_with("00-"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod error;
mod id;
mod sampling;
pub mod scope;
pub mod traceparent;


pub use context::{create_child_context, TraceContext};
pub use error::{Result, TraceError};
pub use id::{fill_random, generate_span_id, generate_trace_id, SpanId, TraceId};
pub use sampling::{Sampler, SamplingConfig, SamplingConfigBuilder};
pub use scope::{
    current_context, current_trace_id, propagate, start_span, with_context, with_context_async,
    with_span,
};
pub use traceparent::{create_traceparent_header, parse_traceparent_header};
