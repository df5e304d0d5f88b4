//! Fixed response bodies.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;

use crate::context::RequestContext;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::response::ContentType;
use crate::stage::Stage;

/// Writes a fixed body, then calls the rest of the pipeline.
///
/// Status and content type are only applied when nothing has been written
/// yet, so several of these can be stacked to concatenate fragments.
///
/// ```rust
/// use weft::middleware::StaticContent;
///
/// let hello = StaticContent::html("<h1>Hello from My First Middleware</h1>");
/// # let _ = hello;
/// ```
#[derive(Clone, Debug)]
pub struct StaticContent {
    body: Bytes,
    content_type: ContentType,
    status: Option<StatusCode>,
}

impl StaticContent {
    pub fn new(content_type: ContentType, body: impl Into<Bytes>) -> Self {
        Self { body: body.into(), content_type, status: None }
    }

    pub fn html(body: &'static str) -> Self {
        Self::new(ContentType::Html, body)
    }

    pub fn text(body: &'static str) -> Self {
        Self::new(ContentType::Text, body)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl Stage for StaticContent {
    fn name(&self) -> &'static str {
        "static-content"
    }

    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(StaticContentHandler { content: self.clone(), next })
    }
}

struct StaticContentHandler {
    content: StaticContent,
    next: BoxedHandler,
}

impl Handler for StaticContentHandler {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let sink = ctx.response_mut();
            if !sink.has_started() {
                if let Some(status) = self.content.status {
                    sink.set_status(status);
                }
                sink.content_type(self.content.content_type);
            }
            sink.write(&self.content.body);
            self.next.call(ctx).await
        })
    }
}
