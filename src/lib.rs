//! # weft
//!
//! A composable request pipeline for lightweight HTTP servers.
//! Stages in, one handler out.
//!
//! ## The contract
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Each stage receives the
//! rest of the pipeline as its continuation and decides, per request,
//! whether to call it. Building the pipeline folds the stages right to left
//! into one [`ComposedHandler`]:
//!
//! ```text
//! handler = s0(s1(…sn-1(terminal)…))
//! ```
//!
//! so work a stage does before calling its continuation runs in
//! registration order, and work it does after runs in reverse. A stage that
//! never calls its continuation short-circuits the request.
//!
//! Per-request state lives in the [`RequestContext`]: method, path,
//! headers, the body stream, the [`ResponseSink`] stages write into, and a
//! string-keyed [`Extensions`] bag for data one stage leaves for another.
//! The composed handler itself holds no per-request state and is shared by
//! every concurrent request.
//!
//! What weft leaves to the layer above:
//!
//! - **Routing**: register a stage that inspects `ctx.path()` if you need it
//! - **TLS termination**: put a proxy in front
//! - **Sessions / persistence**: keep them in your own stages
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use weft::middleware::{StaticContent, Trace};
//! use weft::{Pipeline, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), weft::Error> {
//!     let mut pipeline = Pipeline::new();
//!     pipeline.register(Trace::new())?;
//!     pipeline.register(StaticContent::html("<h1>Hello from My First Middleware</h1>"))?;
//!
//!     Server::bind(([127, 0, 0, 1], 8080).into()).serve(pipeline).await
//! }
//! ```

mod body;
mod config;
mod context;
mod error;
mod extensions;
mod handler;
mod pipeline;
mod response;
mod server;
mod stage;

pub mod middleware;

pub use body::Body;
pub use config::ServerConfig;
pub use context::RequestContext;
pub use error::{BoxError, Error, Result};
pub use extensions::Extensions;
pub use handler::{BoxFuture, BoxedHandler, Handler, handler_fn};
pub use pipeline::{ComposedHandler, Pipeline, Traversal};
pub use response::{ContentType, ResponseSink};
pub use server::Server;
pub use stage::Stage;
