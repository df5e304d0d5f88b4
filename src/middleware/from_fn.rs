//! Stages from closures.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::stage::Stage;

/// Creates a stage from a closure taking the context and the continuation.
///
/// ```rust
/// use weft::{Pipeline, middleware::from_fn};
///
/// let mut pipeline = Pipeline::new();
/// pipeline.register(from_fn("wrap", |ctx, next| Box::pin(async move {
///     ctx.write_str("<main>");
///     let res = next.call(ctx).await;
///     ctx.write_str("</main>");
///     res
/// }))).unwrap();
/// ```
pub fn from_fn<F>(name: &'static str, f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext, &'a dyn Handler) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    FromFn { name, f: Arc::new(f) }
}

/// A stage built by [`from_fn`].
pub struct FromFn<F> {
    name: &'static str,
    f: Arc<F>,
}

struct FnLink<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F> Stage for FromFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext, &'a dyn Handler) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(FnLink { f: Arc::clone(&self.f), next })
    }
}

impl<F> Handler for FnLink<F>
where
    F: for<'a> Fn(&'a mut RequestContext, &'a dyn Handler) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        (self.f)(ctx, self.next.as_ref())
    }
}
