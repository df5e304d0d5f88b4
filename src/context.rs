//! Per-request state carried through the pipeline.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use hyper::body::Body as HttpBody;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::body::Body;
use crate::error::{BoxError, Error, Result};
use crate::extensions::Extensions;
use crate::pipeline::Traversal;
use crate::response::ResponseSink;

/// One in-flight HTTP exchange.
///
/// The listener creates a context right before calling
/// [`Pipeline::handle`](crate::Pipeline::handle) and flushes its response
/// sink after the call returns. Stages receive it as `&mut`, so a context is
/// only ever touched by the one traversal processing its request.
///
/// ```rust
/// use http::{HeaderMap, Method};
/// use weft::{Body, RequestContext};
///
/// let mut ctx = RequestContext::new(Method::GET, "/hello", HeaderMap::new(), Body::empty());
/// ctx.extensions_mut().insert("greeting", "hi");
/// ctx.write_str("<h1>hi</h1>");
///
/// assert_eq!(ctx.path(), "/hello");
/// assert_eq!(ctx.response().body(), b"<h1>hi</h1>");
/// ```
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Body,
    response: ResponseSink,
    extensions: Extensions,
    cancel: CancellationToken,
    pub(crate) traversal: Traversal,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers,
            body,
            response: ResponseSink::new(),
            extensions: Extensions::new(),
            cancel: CancellationToken::new(),
            traversal: Traversal::NotStarted,
        }
    }

    /// Builds a context from a parsed `http::Request`, as a listener would.
    pub fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let mut ctx = Self::new(parts.method, parts.uri.path(), parts.headers, Body::new(body));
        ctx.query = parts.uri.query().map(str::to_owned);
        ctx
    }

    /// Replaces the cancellation token, typically with a child of a
    /// listener-wide token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// reported as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Takes the body stream out, leaving an empty one in its place.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Reads the whole request body.
    ///
    /// Returns [`Error::Cancelled`] if the request is cancelled while waiting
    /// for body bytes; the partially read stream is dropped either way.
    pub async fn read_body(&mut self) -> Result<Bytes> {
        let body = self.take_body();
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            read = body.collect_bytes() => read.map_err(|e| Error::stage("request-body", e)),
        }
    }

    // ── Response ──────────────────────────────────────────────────────────────

    pub fn response(&self) -> &ResponseSink { &self.response }
    pub fn response_mut(&mut self) -> &mut ResponseSink { &mut self.response }

    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        self.response.write(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.response.write_str(text);
    }

    /// Sets the response status. Ignored once the body has started.
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.status()
    }

    /// Consumes the context, handing the response sink back to the listener.
    pub fn into_response(self) -> ResponseSink {
        self.response
    }

    // ── Extensions ────────────────────────────────────────────────────────────

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    // ── Cancellation ──────────────────────────────────────────────────────────

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the request is cancelled. Stages awaiting their own I/O
    /// can `select!` on this to unwind early.
    ///
    /// The future owns a clone of the token, so it borrows nothing from the
    /// context and can sit next to `next.call(ctx)` in the same `select!`.
    pub fn cancelled(&self) -> WaitForCancellationFutureOwned {
        self.cancel.clone().cancelled_owned()
    }

    /// Where this request currently is in the pipeline.
    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Drops the request body and marks the traversal finished.
    pub(crate) fn finish(&mut self) {
        self.body = Body::empty();
        self.traversal = Traversal::Completed;
    }
}
