//! HTTP listener and graceful shutdown.
//!
//! The server owns everything the pipeline does not: binding the socket,
//! parsing HTTP (hyper, HTTP/1.1 and HTTP/2), building one
//! [`RequestContext`] per request, and flushing the response sink once
//! [`ComposedHandler::handle`] returns.
//!
//! # Outcome mapping
//!
//! | Pipeline outcome | Response |
//! |---|---|
//! | `Ok`, nothing written, no status | `404 Not Found` |
//! | `Ok` | sink status (default `200`), headers, body |
//! | `Err(Cancelled)` | `503 Service Unavailable` |
//! | any other `Err` | `500 Internal Server Error`, error logged |
//!
//! # Graceful shutdown
//!
//! On SIGTERM / Ctrl-C the server:
//! 1. Stops `listener.accept()` immediately.
//! 2. Asks every open connection to finish its in-flight requests and close.
//! 3. Waits up to `shutdown_timeout_secs` for them, then cancels whatever is
//!    still running through each request's cancellation token.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::pipeline::{ComposedHandler, Pipeline};
use crate::response::ResponseSink;

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
}

/// State shared by every connection task.
struct Shared {
    handler: ComposedHandler,
    request_timeout: Option<Duration>,
    /// Parent of every request token. Cancelled when the drain deadline passes.
    requests: CancellationToken,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// A server on `addr` with default timeouts.
    ///
    /// ```rust,no_run
    /// use weft::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 8080).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self::new(ServerConfig { addr, ..ServerConfig::default() })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves `pipeline` until SIGTERM or Ctrl-C, then shuts down gracefully.
    pub async fn serve(self, pipeline: Pipeline) -> Result<()> {
        self.serve_with_shutdown(pipeline, shutdown_signal()).await
    }

    /// Serves `pipeline` until `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        pipeline: Pipeline,
        signal: impl Future<Output = ()>,
    ) -> Result<()> {
        let listener = TcpListener::bind(self.config.addr).await?;
        self.serve_on(listener, pipeline, signal).await
    }

    /// Serves `pipeline` on an already bound listener until `signal` resolves.
    ///
    /// The configured `addr` is ignored.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        pipeline: Pipeline,
        signal: impl Future<Output = ()>,
    ) -> Result<()> {
        self.config.validate()?;

        // Freeze the pipeline before the first connection arrives.
        let handler = pipeline.build();
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, stages = ?pipeline.stage_names(), "weft listening");

        let shared = Arc::new(Shared {
            handler,
            request_timeout: self.config.request_timeout(),
            requests: CancellationToken::new(),
        });
        // Cancelled on the shutdown signal: connections stop keep-alive and close.
        let draining = CancellationToken::new();

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let shared = Arc::clone(&shared);
                    let draining = draining.clone();
                    tasks.spawn(serve_connection(shared, TokioIo::new(stream), peer, draining));
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        draining.cancel();
        let grace = self.config.shutdown_timeout();
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(in_flight = tasks.len(), ?grace, "drain deadline passed, cancelling in-flight requests");
            shared.requests.cancel();
            tasks.shutdown().await;
        }

        info!("weft stopped");
        Ok(())
    }
}

async fn serve_connection(
    shared: Arc<Shared>,
    io: TokioIo<tokio::net::TcpStream>,
    peer: SocketAddr,
    draining: CancellationToken,
) {
    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| {
        let shared = Arc::clone(&shared);
        async move { dispatch(shared, req, peer).await }
    });

    // `auto::Builder` serves both HTTP/1.1 and HTTP/2, whichever the client speaks.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = draining.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = res {
        error!(%peer, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one request through the pipeline and produces one response.
///
/// The error type is [`Infallible`]: every pipeline failure is mapped to a
/// status code here, so hyper never sees an error.
async fn dispatch(
    shared: Arc<Shared>,
    req: hyper::Request<hyper::body::Incoming>,
    peer: SocketAddr,
) -> std::result::Result<http::Response<Full<Bytes>>, Infallible> {
    let token = shared.requests.child_token();
    // hyper drops this future when the client goes away; the guard turns
    // that drop into a cancellation stages can observe.
    let guard = token.clone().drop_guard();

    let mut ctx = RequestContext::from_http(req).with_cancellation(token.clone());
    let method = ctx.method().clone();
    let path = ctx.path().to_owned();

    let outcome = {
        let handle = shared.handler.handle(&mut ctx);
        tokio::pin!(handle);
        match shared.request_timeout {
            None => handle.await,
            Some(limit) => tokio::select! {
                res = &mut handle => res,
                () = tokio::time::sleep(limit) => {
                    warn!(%peer, %method, %path, ?limit, "request timed out");
                    token.cancel();
                    handle.await
                }
            },
        }
    };
    guard.disarm();

    let sink = ctx.into_response();
    let response = match outcome {
        Ok(()) if sink.is_untouched() => {
            debug!(%method, %path, "pipeline produced no response");
            sink.into_http(StatusCode::NOT_FOUND)
        }
        Ok(()) => sink.into_http(StatusCode::OK),
        Err(Error::Cancelled) => ResponseSink::new().into_http(StatusCode::SERVICE_UNAVAILABLE),
        Err(e) => {
            error!(%peer, %method, %path, "request failed: {e}");
            ResponseSink::new().into_http(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(response)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by orchestrators such as
/// Kubernetes) and **SIGINT** (Ctrl-C, for local dev). On Windows only
/// Ctrl-C is available. A signal that cannot be installed is logged and
/// never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
