//! Integration tests for scoped trace context propagation.

use std::time::Duration;

use tokio::sync::oneshot;
use ticketry_trace::{
    current_context, parse_traceparent_header, propagate, start_span, with_context,
    with_context_async, Sampler, TraceContext,
};

/// Two operations interleaved on one thread never see each other's context.
#[tokio::test(flavor = "current_thread")]
async fn test_interleaved_operations_are_isolated() {
    let ca = TraceContext::root();
    let cb = TraceContext::root();
    let (a_span, b_span) = (ca.span_id(), cb.span_id());

    let (resume_a, a_waits) = oneshot::channel::<()>();
    let (b_started, wait_for_b) = oneshot::channel::<()>();

    let op_a = with_context_async(ca, async move {
        let before = current_context().map(|c| c.span_id());
        // suspend A until B has run
        a_waits.await.unwrap();
        let after = current_context().map(|c| c.span_id());
        (before, after)
    });

    let op_b = with_context_async(cb, async move {
        let seen = current_context().map(|c| c.span_id());
        b_started.send(()).unwrap();
        tokio::task::yield_now().await;
        let seen_again = current_context().map(|c| c.span_id());
        resume_a.send(()).unwrap();
        (seen, seen_again)
    });

    let waiter = async {
        wait_for_b.await.unwrap();
        current_context()
    };

    let ((a_before, a_after), (b_seen, b_again), outside) = tokio::join!(op_a, op_b, waiter);

    assert_eq!(a_before, Some(a_span));
    assert_eq!(a_after, Some(a_span));
    assert_eq!(b_seen, Some(b_span));
    assert_eq!(b_again, Some(b_span));
    assert!(outside.is_none());
}

/// Many concurrent tasks on a multi-threaded runtime each keep their own context.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_keep_their_context() {
    let mut handles = Vec::new();

    for i in 0..32u64 {
        let ctx = TraceContext::root().with_baggage("request", i.to_string());
        let expected = ctx.trace_id();
        handles.push(tokio::spawn(with_context_async(ctx, async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(i % 3)).await;
                let current = current_context().unwrap();
                assert_eq!(current.trace_id(), expected);
                assert_eq!(current.baggage_item("request"), Some(i.to_string().as_str()));
            }
        })));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

/// A request arriving with a traceparent header continues that trace.
#[tokio::test]
async fn test_incoming_header_continues_trace() {
    let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
    let incoming = parse_traceparent_header(header).unwrap();
    let sampler = Sampler::always_on();

    let (handler_span, outgoing) = with_context_async(incoming, async {
        let span = start_span("ticket.update", &sampler);
        let outgoing = with_context_async(span.clone(), async {
            tokio::spawn(propagate(async { current_context().unwrap().to_traceparent() }))
                .await
                .unwrap()
        })
        .await;
        (span, outgoing)
    })
    .await;

    assert_eq!(
        handler_span.trace_id().to_string(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_eq!(
        handler_span.parent_span_id().map(|s| s.to_string()),
        Some("00f067aa0ba902b7".to_string())
    );
    assert_eq!(outgoing, handler_span.to_traceparent());
}

/// Malformed headers fall back to a new root context.
#[test]
fn test_malformed_header_falls_back_to_root() {
    let ctx = parse_traceparent_header("garbage").unwrap_or_else(TraceContext::root);
    assert!(ctx.is_root());

    let seen = with_context(ctx.clone(), current_context).unwrap();
    assert_eq!(seen.trace_id(), ctx.trace_id());
}
