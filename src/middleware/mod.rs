//! Built-in stages.
//!
//! Stages are the right place for cross-cutting concerns: structured
//! tracing, header checks, canned responses. Register them on a
//! [`Pipeline`](crate::Pipeline) in the order they should see the request.
//!
//! - [`Trace`]: per-request span with method, path, status, latency
//! - [`StaticContent`]: writes a fixed body, then delegates
//! - [`RequireHeader`]: short-circuits requests missing a header
//! - [`from_fn`]: a stage from a closure

mod from_fn;
mod require_header;
mod static_content;
mod trace;

pub use from_fn::{FromFn, from_fn};
pub use require_header::RequireHeader;
pub use static_content::StaticContent;
pub use trace::Trace;
