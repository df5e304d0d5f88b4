//! The response sink stages write into.
//!
//! Stages never build a response value. They append to the sink owned by the
//! [`RequestContext`](crate::RequestContext); the listener flushes it to the
//! network once the pipeline returns.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseSink::content_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    EventStream,  // text/event-stream  (SSE)
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventStream => "text/event-stream",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── ResponseSink ──────────────────────────────────────────────────────────────

/// Append-only response body plus the status line and headers.
///
/// Writes are buffered in order. Status and headers belong to the head of
/// the response, so once the first body byte has been written they are
/// frozen: later changes are dropped with a warning.
///
/// ```rust
/// use weft::{ContentType, ResponseSink};
/// use http::StatusCode;
///
/// let mut sink = ResponseSink::new();
/// sink.set_status(StatusCode::CREATED);
/// sink.content_type(ContentType::Text);
/// sink.write_str("made ");
/// sink.write_str("it");
///
/// sink.set_status(StatusCode::IM_A_TEAPOT); // too late, ignored
/// assert_eq!(sink.status(), Some(StatusCode::CREATED));
/// assert_eq!(sink.body(), b"made it");
/// ```
#[derive(Debug, Default)]
pub struct ResponseSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    started: bool,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status chosen so far. `None` until a stage sets one.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if self.started {
            warn!(%status, "status set after the response body started; ignored");
            return;
        }
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a response header, replacing any previous value under `name`.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.started {
            warn!(header = %name, "header set after the response body started; ignored");
            return;
        }
        self.headers.insert(name, value);
    }

    /// Appends a value under `name`, keeping earlier ones.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.started {
            warn!(header = %name, "header set after the response body started; ignored");
            return;
        }
        self.headers.append(name, value);
    }

    pub fn content_type(&mut self, content_type: ContentType) {
        self.insert_header(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return;
        }
        self.started = true;
        self.body.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// `true` once any body byte has been written.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// `true` if no stage touched the response at all.
    pub fn is_untouched(&self) -> bool {
        self.status.is_none() && self.headers.is_empty() && self.body.is_empty()
    }

    /// Converts the buffered response into an `http::Response`, using
    /// `default_status` when no stage picked one.
    pub(crate) fn into_http(self, default_status: StatusCode) -> http::Response<Full<Bytes>> {
        let body = self.body.freeze();
        let mut headers = self.headers;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = self.status.unwrap_or(default_status);
        *response.headers_mut() = headers;
        response
    }
}
