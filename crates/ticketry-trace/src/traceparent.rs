//! The traceparent wire format.
//!
//! A context travels between processes as four dash-separated fields:
//!
//! ```text
//! 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^ ^^
//! |  trace ID (32 hex)                span ID (16 hex) flags (bit 0 = sampled)
//! version
//! ```
//!
//! Parsing is strict: anything other than version `00`, lowercase hex of the
//! exact widths, and a two-digit flags field yields `None`. Headers arrive from
//! untrusted callers, so failures are not errors; the caller starts a new root
//! context instead.

use tracing::debug;

use crate::context::TraceContext;
use crate::id::{SpanId, TraceId};

/// The only supported traceparent version.
pub const VERSION: &str = "00";

/// Trace-flags bit that marks a context as sampled.
pub const SAMPLED_FLAG: u8 = 0x01;

/// Encodes `ctx` as a traceparent header value.
///
/// The sampled bit is set only for an explicit `sampled = true`, so a context
/// with no decision decodes as `sampled = Some(false)`.
#[must_use]
pub fn create_traceparent_header(ctx: &TraceContext) -> String {
    format!(
        "{VERSION}-{}-{}-{:02x}",
        ctx.trace_id(),
        ctx.span_id(),
        ctx.trace_flags()
    )
}

/// Decodes a traceparent header value.
///
/// The decoded context has no parent span, baggage or flags; its sampling
/// decision is taken from bit 0 of the flags field.
#[must_use]
pub fn parse_traceparent_header(header: &str) -> Option<TraceContext> {
    let parts: Vec<&str> = header.trim().split('-').collect();
    let [version, trace_id, span_id, flags] = parts.as_slice() else {
        debug!(header, fields = parts.len(), "Rejected traceparent: wrong field count");
        return None;
    };

    if *version != VERSION {
        debug!(header, version, "Rejected traceparent: unsupported version");
        return None;
    }

    let trace_id = match trace_id.parse::<TraceId>() {
        Ok(id) => id,
        Err(e) => {
            debug!(header, error = %e, "Rejected traceparent");
            return None;
        }
    };
    let span_id = match span_id.parse::<SpanId>() {
        Ok(id) => id,
        Err(e) => {
            debug!(header, error = %e, "Rejected traceparent");
            return None;
        }
    };

    if flags.len() != 2 || !flags.bytes().all(|b| b.is_ascii_hexdigit()) {
        debug!(header, flags, "Rejected traceparent: malformed flags");
        return None;
    }
    let flags = u8::from_str_radix(flags, 16).ok()?;

    Some(TraceContext::from_ids(trace_id, span_id).with_sampled(flags & SAMPLED_FLAG != 0))
}
