//! Rejecting requests that lack a header.

use std::sync::Arc;

use http::{HeaderName, StatusCode};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::response::ContentType;
use crate::stage::Stage;

/// Rejects requests that lack a header, without running later stages.
///
/// The rejection status defaults to `400 Bad Request`. Typical use is a
/// gate in front of stages that expect an upstream proxy to have set an
/// identity or forwarding header.
///
/// ```rust
/// use http::{HeaderName, StatusCode};
/// use weft::middleware::RequireHeader;
///
/// let gate = RequireHeader::new(HeaderName::from_static("x-forwarded-user"))
///     .rejecting_with(StatusCode::UNAUTHORIZED);
/// # let _ = gate;
/// ```
#[derive(Clone, Debug)]
pub struct RequireHeader {
    name: HeaderName,
    status: StatusCode,
}

impl RequireHeader {
    pub fn new(name: HeaderName) -> Self {
        Self { name, status: StatusCode::BAD_REQUEST }
    }

    pub fn rejecting_with(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Stage for RequireHeader {
    fn name(&self) -> &'static str {
        "require-header"
    }

    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(RequireHeaderHandler { gate: self.clone(), next })
    }
}

struct RequireHeaderHandler {
    gate: RequireHeader,
    next: BoxedHandler,
}

impl Handler for RequireHeaderHandler {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if ctx.headers().contains_key(&self.gate.name) {
                return self.next.call(ctx).await;
            }

            debug!(header = %self.gate.name, status = %self.gate.status, "required header missing");
            let sink = ctx.response_mut();
            sink.set_status(self.gate.status);
            sink.content_type(ContentType::Text);
            sink.write_str(&format!("missing header: {}\n", self.gate.name));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{HeaderMap, HeaderValue, Method};

    use super::*;
    use crate::middleware::from_fn;
    use crate::{Body, Pipeline};

    fn gated(reached: Arc<AtomicUsize>) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline
            .register(RequireHeader::new(HeaderName::from_static("x-token")).rejecting_with(StatusCode::UNAUTHORIZED))
            .unwrap();
        pipeline
            .register(from_fn("inner", move |ctx, next| {
                reached.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    ctx.write_str("welcome");
                    next.call(ctx).await
                })
            }))
            .unwrap();
        pipeline
    }

    #[tokio::test]
    async fn missing_header_short_circuits() {
        let reached = Arc::new(AtomicUsize::new(0));
        let pipeline = gated(Arc::clone(&reached));

        let mut ctx = RequestContext::new(Method::GET, "/", HeaderMap::new(), Body::empty());
        pipeline.handle(&mut ctx).await.unwrap();

        assert_eq!(reached.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(ctx.response().body(), b"missing header: x-token\n");
    }

    #[tokio::test]
    async fn present_header_passes_through() {
        let reached = Arc::new(AtomicUsize::new(0));
        let pipeline = gated(Arc::clone(&reached));

        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("secret"));
        let mut ctx = RequestContext::new(Method::GET, "/", headers, Body::empty());
        pipeline.handle(&mut ctx).await.unwrap();

        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.status(), None);
        assert_eq!(ctx.response().body(), b"welcome");
    }
}
