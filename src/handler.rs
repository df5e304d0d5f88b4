//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The pipeline folds stages of *different* concrete types into one chain.
//! Each link is hidden behind a trait object (`dyn Handler`) so the chain can
//! be stored and shared uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! |ctx| Box::pin(async move { … })          ← user writes this
//!        ↓ handler_fn(…)
//! Arc::new(FnHandler(f))                    ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn Handler>
//! handler.call(&mut ctx)  at request time   ← one vtable dispatch per link
//!        ↓
//! BoxFuture<'_, Result<()>>
//! ```
//!
//! Handlers borrow the context for the duration of the call instead of
//! owning it. That is what lets a stage keep using the context after its
//! continuation returns.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Result;

/// A heap-allocated, type-erased future borrowing the request context.
///
/// `Send` lets tokio move it across worker threads between polls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A function of the shape `(&mut RequestContext) -> Result<()>`.
///
/// This is both what a stage receives as its continuation and what it
/// returns from [`Stage::wrap`](crate::Stage::wrap).
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>>;
}

/// A shared, type-erased handler.
///
/// `Arc` because one composed chain serves every concurrent request.
pub type BoxedHandler = Arc<dyn Handler>;

/// Adapts a closure into a [`BoxedHandler`].
///
/// The closure must box its own future so the borrow of the context can be
/// expressed in the return type:
///
/// ```rust
/// use weft::handler_fn;
///
/// let hello = handler_fn(|ctx| Box::pin(async move {
///     ctx.write_str("hello");
///     weft::Result::Ok(())
/// }));
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> BoxedHandler
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Newtype wrapper bridging a closure to the trait-object world.
struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        (self.0)(ctx)
    }
}

/// The end of every chain: performs no writes and returns immediately.
pub(crate) struct Terminal;

impl Handler for Terminal {
    fn call<'a>(&'a self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Result::Ok(()) })
    }
}
