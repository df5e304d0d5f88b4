use std::net::SocketAddr;
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use weft::middleware::{RequireHeader, StaticContent, Trace, from_fn};
use weft::{Error, Pipeline, Result, Server, ServerConfig};

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl Running {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap().unwrap();
    }
}

async fn start(pipeline: Pipeline, config: ServerConfig) -> Running {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(Server::new(config).serve_on(listener, pipeline, async {
        let _ = rx.await;
    }));
    Running { addr, shutdown, task }
}

/// Sends a bare HTTP/1.1 request and returns the status code and body.
async fn get(addr: SocketAddr, path: &str, extra_headers: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n{extra_headers}\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, body.to_owned())
}

#[tokio::test]
async fn serves_the_greeting_stage() {
    let mut pipeline = Pipeline::new();
    pipeline.register(Trace::new()).unwrap();
    pipeline.register(StaticContent::html("<h1>Hello from My First Middleware</h1>")).unwrap();
    let server = start(pipeline, ServerConfig::default()).await;

    let (status, body) = get(server.addr, "/", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "<h1>Hello from My First Middleware</h1>");

    server.stop().await;
}

#[tokio::test]
async fn empty_pipeline_answers_not_found() {
    let server = start(Pipeline::new(), ServerConfig::default()).await;

    let (status, body) = get(server.addr, "/anything", "").await;
    assert_eq!(status, 404);
    assert!(body.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn failing_stage_answers_internal_error() {
    let mut pipeline = Pipeline::new();
    pipeline.register(from_fn("broken", |ctx, _next| Box::pin(async move {
        ctx.write_str("half a page");
        Result::<()>::Err(Error::stage("broken", std::io::Error::other("upstream gone")))
    }))).unwrap();
    let server = start(pipeline, ServerConfig::default()).await;

    let (status, body) = get(server.addr, "/", "").await;
    assert_eq!(status, 500);
    assert!(body.is_empty(), "partial output must not leak: {body:?}");

    server.stop().await;
}

#[tokio::test]
async fn short_circuit_status_reaches_the_client() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register(RequireHeader::new(http::HeaderName::from_static("x-user")).rejecting_with(StatusCode::UNAUTHORIZED))
        .unwrap();
    pipeline.register(StaticContent::text("secret")).unwrap();
    let server = start(pipeline, ServerConfig::default()).await;

    let (status, _) = get(server.addr, "/", "").await;
    assert_eq!(status, 401);

    let (status, body) = get(server.addr, "/", "x-user: alice\r\n").await;
    assert_eq!(status, 200);
    assert_eq!(body, "secret");

    server.stop().await;
}

#[tokio::test]
async fn slow_request_is_cancelled_at_the_deadline() {
    let mut pipeline = Pipeline::new();
    pipeline.register(from_fn("slow", |ctx, next| Box::pin(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        next.call(ctx).await
    }))).unwrap();
    let config = ServerConfig { request_timeout_ms: 50, ..ServerConfig::default() };
    let server = start(pipeline, config).await;

    let (status, _) = get(server.addr, "/", "").await;
    assert_eq!(status, 503);

    server.stop().await;
}

#[tokio::test]
async fn invalid_config_fails_startup() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig { shutdown_timeout_secs: 0, ..ServerConfig::default() };

    let err = Server::new(config)
        .serve_on(listener, Pipeline::new(), std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
