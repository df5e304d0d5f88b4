//! The smallest useful weft server: one stage writing a static page.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example hello
//!
//! Try:
//!   curl -i http://localhost:8080/
//!
//! Override the listener through the environment:
//!   HELLO_ADDR=0.0.0.0:3000 HELLO_REQUEST_TIMEOUT_MS=5000 cargo run --example hello

use http::HeaderValue;
use http::header::SERVER;
use tracing_subscriber::EnvFilter;
use weft::middleware::{StaticContent, Trace, from_fn};
use weft::{Pipeline, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), weft::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::default().with_env("HELLO")?;

    // Stages run in the order they are registered.
    let mut pipeline = Pipeline::new();
    pipeline.register(Trace::new())?;
    pipeline.register(from_fn("server-header", |ctx, next| Box::pin(async move {
        ctx.response_mut().insert_header(SERVER, HeaderValue::from_static("weft"));
        next.call(ctx).await
    })))?;
    pipeline.register(StaticContent::html("<h1>Hello from My First Middleware</h1>"))?;

    Server::new(config).serve(pipeline).await
}
