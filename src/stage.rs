//! The middleware unit.
//!
//! A [`Stage`] receives the rest of the pipeline as a handler and returns a
//! new handler that does its own work around it. Folding every registered
//! stage this way yields the composed handler the pipeline runs per request.
//!
//! # Writing a stage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use weft::{BoxFuture, BoxedHandler, Handler, RequestContext, Result, Stage};
//!
//! /// Writes a banner, then lets the rest of the pipeline run.
//! struct Banner(&'static str);
//!
//! struct BannerHandler {
//!     text: &'static str,
//!     next: BoxedHandler,
//! }
//!
//! impl Stage for Banner {
//!     fn name(&self) -> &'static str { "banner" }
//!
//!     fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
//!         Arc::new(BannerHandler { text: self.0, next })
//!     }
//! }
//!
//! impl Handler for BannerHandler {
//!     fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
//!         Box::pin(async move {
//!             ctx.write_str(self.text);
//!             self.next.call(ctx).await
//!         })
//!     }
//! }
//! ```
//!
//! # Rules
//!
//! - Call `next` at most once per request. A second call fails the request
//!   with [`Error::DoubleInvocation`](crate::Error::DoubleInvocation).
//! - Pass `next` the context your handler was given. A context built inside
//!   the stage (a sub-request, say) never went through the earlier links,
//!   and the continuation rejects it with
//!   [`Error::Configuration`](crate::Error::Configuration).
//! - Not calling `next` at all short-circuits the pipeline. That is legal.
//! - Work done after `next` returns runs in reverse registration order.
//! - Keep per-request state in the context, never in the stage or handler:
//!   one composed handler serves every concurrent request.

use crate::handler::BoxedHandler;

pub trait Stage: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Wraps the continuation `next` with this stage's logic.
    ///
    /// Called once per [`Pipeline::build`](crate::Pipeline::build), never per
    /// request.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}
