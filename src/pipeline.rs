//! Ordered stage registration and right-fold composition.
//!
//! Given stages `[s0, s1, …, sn-1]` the composed handler is
//! `s0(s1(…sn-1(terminal)…))`. Continuations are captured when the pipeline
//! is built, so serving a request allocates its context and nothing else
//! chain-related.
//!
//! Every link of the chain is wrapped in a guard that advances the request's
//! [`Traversal`]. The guard is what turns a second call to the same
//! continuation into [`Error::DoubleInvocation`] instead of a second,
//! duplicated downstream traversal. A context that never reached the link's
//! caller is refused as a configuration error.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{Instrument, debug, debug_span, error, trace};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::handler::{BoxFuture, BoxedHandler, Handler, Terminal};
use crate::stage::Stage;

// ── Traversal ─────────────────────────────────────────────────────────────────

/// Progress of one request through the pipeline.
///
/// `InStage(i)` is the deepest stage entered so far. For a pipeline of `n`
/// stages, `InStage(n)` means the terminal handler was reached. Indices only
/// ever grow by one; there are no backward transitions.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Traversal {
    #[default]
    NotStarted,
    InStage(usize),
    Completed,
}

impl Traversal {
    /// Tries to move into chain position `index`.
    fn enter(&mut self, index: usize) -> Entry {
        let expected = match *self {
            Self::NotStarted => 0,
            Self::InStage(current) => current + 1,
            Self::Completed => return Entry::Foreign,
        };
        if index == expected {
            *self = Self::InStage(index);
            Entry::Entered
        } else if index < expected {
            // The request already went past `index`.
            Entry::Repeated
        } else {
            Entry::Foreign
        }
    }
}

/// Result of [`Traversal::enter`].
#[derive(Debug, Eq, PartialEq)]
enum Entry {
    Entered,
    /// The continuation was already called for this request.
    Repeated,
    /// The context never reached the caller of this continuation.
    Foreign,
}

// ── Guard ─────────────────────────────────────────────────────────────────────

/// Entry point of chain position `index`.
struct Guarded {
    index: usize,
    /// Name of whoever holds this link as its continuation.
    caller: &'static str,
    inner: BoxedHandler,
}

impl Handler for Guarded {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match ctx.traversal.enter(self.index) {
                Entry::Entered => {}
                Entry::Repeated => {
                    error!(stage = self.caller, index = self.index, "continuation invoked more than once");
                    return Err(Error::DoubleInvocation { stage: self.caller });
                }
                Entry::Foreign => {
                    error!(stage = self.caller, index = self.index, traversal = ?ctx.traversal, "continuation given a foreign context");
                    return Err(Error::Configuration(format!(
                        "continuation of `{}` called with a context that did not pass through it",
                        self.caller
                    )));
                }
            }
            trace!(index = self.index, "entering");
            self.inner.call(ctx).await
        })
    }
}

// ── ComposedHandler ───────────────────────────────────────────────────────────

/// The single handler produced by folding every registered stage.
///
/// Cheap to clone and safe to share between concurrent requests: it holds
/// no per-request state.
#[derive(Clone)]
pub struct ComposedHandler {
    entry: BoxedHandler,
    stages: usize,
}

impl ComposedHandler {
    /// Number of stages folded into this handler.
    pub fn stage_count(&self) -> usize {
        self.stages
    }

    /// Runs one request through the chain.
    ///
    /// Stage errors are returned unchanged. If the context's cancellation
    /// token fires first, the in-flight stages are dropped at their current
    /// suspension point and [`Error::Cancelled`] is returned. The request
    /// body is released on every exit path.
    pub async fn handle(&self, ctx: &mut RequestContext) -> Result<()> {
        if ctx.traversal != Traversal::NotStarted {
            return Err(Error::Configuration("request context was already handled".into()));
        }

        let token = ctx.cancellation().clone();
        let span = debug_span!("pipeline", method = %ctx.method(), path = ctx.path());
        let run = self.entry.call(ctx).instrument(span);

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            res = run => res,
        };

        ctx.finish();
        match &outcome {
            Ok(()) => debug!(bytes = ctx.response().len(), "pipeline completed"),
            Err(e) if e.is_defect() => error!("pipeline aborted: {e}"),
            Err(e) => debug!("pipeline failed: {e}"),
        }
        outcome
    }
}

impl fmt::Debug for ComposedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedHandler").field("stages", &self.stages).finish()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// An ordered list of stages.
///
/// Register stages during setup, then hand the pipeline to the listener.
/// The first [`build`](Pipeline::build) (or the first
/// [`handle`](Pipeline::handle), which builds lazily) freezes it.
///
/// ```rust
/// use weft::{Pipeline, middleware::StaticContent};
///
/// let mut pipeline = Pipeline::new();
/// pipeline.register(StaticContent::html("<h1>Hello</h1>")).unwrap();
///
/// let handler = pipeline.build();
/// assert_eq!(handler.stage_count(), 1);
/// assert!(pipeline.register(StaticContent::html("<p>late</p>")).is_err());
/// ```
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    built: OnceLock<ComposedHandler>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `stage` to the end of the pipeline.
    ///
    /// Fails with [`Error::Configuration`] once the pipeline has been built.
    pub fn register(&mut self, stage: impl Stage) -> Result<()> {
        if self.is_built() {
            return Err(Error::Configuration(format!(
                "cannot register stage `{}` after the pipeline was built",
                stage.name()
            )));
        }
        debug!(stage = stage.name(), position = self.stages.len(), "stage registered");
        self.stages.push(Box::new(stage));
        Ok(())
    }

    /// Folds the registered stages into a fresh composed handler and freezes
    /// the pipeline.
    ///
    /// Each call folds again; the handlers it returns are equivalent.
    pub fn build(&self) -> ComposedHandler {
        let composed = self.compose();
        // Only the first build is kept for `handle`; later ones are equivalent.
        let _ = self.built.set(composed.clone());
        composed
    }

    /// Runs `ctx` through the pipeline, building it first if needed.
    pub async fn handle(&self, ctx: &mut RequestContext) -> Result<()> {
        self.built.get_or_init(|| self.compose()).handle(ctx).await
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in registration order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    fn compose(&self) -> ComposedHandler {
        let count = self.stages.len();
        let mut next: BoxedHandler = Arc::new(Guarded {
            index: count,
            caller: self.caller_of(count),
            inner: Arc::new(Terminal),
        });

        for (index, stage) in self.stages.iter().enumerate().rev() {
            next = Arc::new(Guarded {
                index,
                caller: self.caller_of(index),
                inner: stage.wrap(next),
            });
        }

        debug!(stages = count, "pipeline composed");
        ComposedHandler { entry: next, stages: count }
    }

    /// The stage that holds chain position `index` as its continuation.
    fn caller_of(&self, index: usize) -> &'static str {
        match index.checked_sub(1) {
            Some(prev) => self.stages[prev].name(),
            None => "pipeline",
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("built", &self.is_built())
            .finish()
    }
}
