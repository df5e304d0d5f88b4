//! Per-request tracing span.

use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, field, info, info_span, warn};

use crate::context::RequestContext;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::stage::Stage;

/// Opens a per-request span and logs the outcome.
///
/// The span carries `method` and `path`; `status` and `latency_ms` are
/// recorded once the rest of the pipeline returns. Register it first so the
/// span covers every later stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Trace {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Trace {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(TraceHandler { next })
    }
}

struct TraceHandler {
    next: BoxedHandler,
}

impl Handler for TraceHandler {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let span = info_span!(
                "request",
                method = %ctx.method(),
                path = ctx.path(),
                status = field::Empty,
                latency_ms = field::Empty,
            );
            let start = Instant::now();
            let outcome = self.next.call(ctx).instrument(span.clone()).await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            span.record("latency_ms", latency_ms);
            if let Some(status) = ctx.status() {
                span.record("status", status.as_u16());
            }

            match &outcome {
                Ok(()) => info!(parent: &span, bytes = ctx.response().len(), latency_ms, "request completed"),
                Err(e) => warn!(parent: &span, latency_ms, "request failed: {e}"),
            }
            outcome
        })
    }
}
