//! Scoped "current context" propagation.
//!
//! The current context lives in task-local storage. It can only be set for
//! the dynamic extent of a unit of work through [`with_context`] or
//! [`with_context_async`]; there is no way to push or pop it directly. The
//! previous value is restored when the work finishes, whether it returns,
//! errors or panics.
//!
//! Because the value is bound to the future it wraps, operations interleaved
//! on one thread (for example two branches of `tokio::join!`) each observe
//! their own context across every `.await`.
//!
//! Tasks spawned with `tokio::spawn` start without a context. Wrap the future
//! in [`propagate`] to carry the caller's context into it.

use std::future::Future;

use tracing::debug;

use crate::context::TraceContext;
use crate::id::TraceId;
use crate::sampling::Sampler;

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// Returns the context established by the innermost enclosing scope, if any.
#[must_use]
pub fn current_context() -> Option<TraceContext> {
    CURRENT.try_with(Clone::clone).ok()
}

/// Returns the trace ID of the current context, if any.
#[must_use]
pub fn current_trace_id() -> Option<TraceId> {
    CURRENT.try_with(TraceContext::trace_id).ok()
}

/// Runs synchronous `work` with `ctx` as the current context.
pub fn with_context<F, R>(ctx: TraceContext, work: F) -> R
where
    F: FnOnce() -> R,
{
    debug!(trace_id = %ctx.trace_id(), span_id = %ctx.span_id(), "Entering trace scope");
    CURRENT.sync_scope(ctx, work)
}

/// Runs `work` to completion with `ctx` as the current context, including
/// across its suspension points.
pub async fn with_context_async<F>(ctx: TraceContext, work: F) -> F::Output
where
    F: Future,
{
    debug!(trace_id = %ctx.trace_id(), span_id = %ctx.span_id(), "Entering async trace scope");
    CURRENT.scope(ctx, work).await
}

/// Wraps `work` so it runs under the context that is current right now.
///
/// Use this when handing work to another task:
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use ticketry_trace::{current_context, propagate, with_context_async, TraceContext};
///
/// let ctx = TraceContext::root();
/// let expected = ctx.trace_id();
///
/// let seen = with_context_async(ctx, async {
///     tokio::spawn(propagate(async { current_context() })).await
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(seen.map(|c| c.trace_id()), Some(expected));
/// # }
/// ```
pub fn propagate<F>(work: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let captured = current_context();
    async move {
        match captured {
            Some(ctx) => CURRENT.scope(ctx, work).await,
            None => work.await,
        }
    }
}

/// Derives the context for a new sub-operation.
///
/// Returns a child of the current context, or a new root if there is none,
/// with a sampling decision for `operation` recorded.
#[must_use]
pub fn start_span(operation: &str, sampler: &Sampler) -> TraceContext {
    let ctx = current_context().map_or_else(TraceContext::root, |parent| parent.child());
    sampler.decide(ctx, operation)
}

/// Runs `work` inside a new span for `operation`.
pub async fn with_span<F>(operation: &str, sampler: &Sampler, work: F) -> F::Output
where
    F: Future,
{
    let ctx = start_span(operation, sampler);
    with_context_async(ctx, work).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_context_outside_scope() {
        assert!(current_context().is_none());
        assert!(current_trace_id().is_none());
    }

    #[test]
    fn test_sync_scope_sets_and_restores() {
        let ctx = TraceContext::root();
        let expected = ctx.clone();

        let seen = with_context(ctx, current_context);
        assert_eq!(seen, Some(expected));
        assert!(current_context().is_none());
    }

    #[test]
    fn test_nested_sync_scopes() {
        let outer = TraceContext::root();
        let inner = outer.child();
        let (outer_id, inner_id) = (outer.span_id(), inner.span_id());

        with_context(outer, || {
            assert_eq!(current_context().map(|c| c.span_id()), Some(outer_id));
            with_context(inner, || {
                assert_eq!(current_context().map(|c| c.span_id()), Some(inner_id));
            });
            assert_eq!(current_context().map(|c| c.span_id()), Some(outer_id));
        });
        assert!(current_context().is_none());
    }

    #[test]
    fn test_sync_scope_restores_after_panic() {
        let outer = TraceContext::root();
        let outer_id = outer.span_id();

        with_context(outer, || {
            let result = std::panic::catch_unwind(|| {
                with_context(TraceContext::root(), || panic!("operation failed"));
            });
            assert!(result.is_err());
            assert_eq!(current_context().map(|c| c.span_id()), Some(outer_id));
        });
        assert!(current_context().is_none());
    }

    #[test]
    fn test_start_span_without_parent_is_root() {
        let ctx = start_span("ticket.create", &Sampler::always_on());
        assert!(ctx.is_root());
        assert_eq!(ctx.sampled(), Some(true));
    }

    #[test]
    fn test_start_span_derives_from_current() {
        let parent = TraceContext::root().with_sampled(false);
        let expected_parent = parent.span_id();
        let expected_trace = parent.trace_id();

        let child = with_context(parent, || start_span("ticket.update", &Sampler::always_on()));
        assert_eq!(child.trace_id(), expected_trace);
        assert_eq!(child.parent_span_id(), Some(expected_parent));
        assert_eq!(child.sampled(), Some(false));
    }

    #[tokio::test]
    async fn test_async_scope_survives_await() {
        let ctx = TraceContext::root();
        let expected = ctx.span_id();

        let seen = with_context_async(ctx, async {
            tokio::task::yield_now().await;
            current_context().map(|c| c.span_id())
        })
        .await;

        assert_eq!(seen, Some(expected));
        assert!(current_context().is_none());
    }

    #[tokio::test]
    async fn test_async_scope_restores_after_error() {
        let outer = TraceContext::root();
        let outer_id = outer.span_id();

        with_context_async(outer, async {
            let result: Result<(), &str> = with_context_async(TraceContext::root(), async {
                tokio::task::yield_now().await;
                Err("storage unavailable")
            })
            .await;
            assert!(result.is_err());
            assert_eq!(current_context().map(|c| c.span_id()), Some(outer_id));
        })
        .await;
    }

    #[tokio::test]
    async fn test_spawned_task_without_propagate_has_no_context() {
        let seen = with_context_async(TraceContext::root(), async {
            tokio::spawn(async { current_context() }).await.unwrap()
        })
        .await;
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn test_with_span_creates_child() {
        let parent = TraceContext::root().with_sampled(true);
        let parent_span = parent.span_id();

        let child = with_context_async(parent, async {
            with_span("ticket.read", &Sampler::always_on(), async { current_context() }).await
        })
        .await
        .unwrap();

        assert_eq!(child.parent_span_id(), Some(parent_span));
    }
}
