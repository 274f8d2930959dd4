//! Application ties a [`Router`] to a TCP listener and owns the process
//! lifecycle.
//!
//! Shutdown runs in a fixed order whatever triggered it: stop accepting,
//! wait for every in-flight request, then run the registered shutdown
//! callbacks one after another. A failing callback is logged and the rest
//! still run.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis::app::Application;
//! use trellis::config::ServerConfig;
//! use trellis::handler::Completion;
//! use trellis::http::{Request, Response};
//! use trellis::context::Context;
//! use trellis::router::Router;
//!
//! let mut router = Router::default();
//! router.get("/hello", |_req: Arc<Request>, _ctx: Arc<Context>| {
//!     Completion::ready(Response::text("Hello webserver"))
//! });
//!
//! let mut app = Application::new(router, ServerConfig::default());
//! app.on_shutdown(|| async {
//!     println!("bye");
//!     Ok::<_, trellis::error::ServerError>(())
//! });
//! app.listen().unwrap();
//! ```

use crate::config::ServerConfig;
use crate::dispatch::dispatch;
use crate::error::{ServerError, ServerResult};
use crate::http::{Body, Method, Request, Response};
use crate::router::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::io::{Error, ErrorKind};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

type ShutdownCallback = Box<dyn Fn() -> BoxFuture<'static, ServerResult<()>> + Send + Sync>;

pub struct Application {
    router: Arc<Router>,
    config: ServerConfig,
    shutdown_callbacks: Vec<ShutdownCallback>,
}

impl Application {
    pub fn new(router: Router, config: ServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            config,
            shutdown_callbacks: Vec::new(),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registers a callback to run after the server has drained. Callbacks
    /// run in registration order.
    pub fn on_shutdown<F, Fut>(&mut self, callback: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<()>> + Send + 'static,
    {
        self.shutdown_callbacks
            .push(Box::new(move || callback().boxed()));
        self
    }

    /// Binds `config.addr` and serves until SIGINT, SIGTERM or SIGUSR1.
    pub fn listen(self) -> ServerResult<()> {
        let runtime = Runtime::new()?;
        runtime.block_on(async {
            let listener = TcpListener::bind(self.config.addr).await?;
            self.serve_with_shutdown(listener, shutdown_signal()).await
        })
    }

    /// Serves connections from `listener` until `signal` completes, then
    /// drains and runs the shutdown callbacks.
    pub async fn serve_with_shutdown<S>(self, listener: TcpListener, signal: S) -> ServerResult<()>
    where
        S: Future<Output = ()>,
    {
        let issues = self.router.issues();
        if self.config.strict_routes {
            self.router.validate()?;
        } else if !issues.is_empty() {
            warn!("Serving with {} route validation issue(s)", issues.len());
        }

        info!(
            "Server started at http://{} with run mode: {:?}",
            listener.local_addr()?,
            self.config.run_mode
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let mut tasks = JoinSet::new();
        tokio::pin!(signal);

        loop {
            let permit = tokio::select! {
                _ = &mut signal => break,
                permit = Arc::clone(&semaphore).acquire_owned() => permit
                    .map_err(|e| ServerError::InternalError(e.to_string()))?,
            };
            let (stream, peer) = tokio::select! {
                _ = &mut signal => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Connection failed: {e}");
                        continue;
                    }
                },
            };

            let router = Arc::clone(&self.router);
            let config = self.config.clone();
            tasks.spawn(async move {
                let _permit = permit;
                if let Err(e) = handle_connection(stream, &router, &config).await {
                    debug!("Connection error from {peer}: {e}");
                }
            });
            while tasks.try_join_next().is_some() {}
        }

        drop(listener);
        info!("Server closing, waiting for {} in-flight connection(s)", tasks.len());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Connection task failed during shutdown: {e}");
            }
        }

        for callback in &self.shutdown_callbacks {
            match AssertUnwindSafe(callback()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Caught error during closing: {e}"),
                Err(_) => error!("Shutdown callback panicked"),
            }
        }
        info!("Server closed");
        Ok(())
    }
}

/// Completes on the first SIGINT, SIGTERM or SIGUSR1.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::user_defined1(), "SIGUSR1"),
    ];
    let mut streams = Vec::new();
    for (kind, name) in kinds {
        match signal(kind) {
            Ok(stream) => streams.push((stream, name)),
            Err(e) => error!("Failed to listen for {name}: {e}"),
        }
    }
    if streams.is_empty() {
        return std::future::pending().await;
    }

    let waits = streams
        .iter_mut()
        .map(|(stream, name)| Box::pin(async move {
            stream.recv().await;
            *name
        }));
    let (name, _, _) = futures::future::select_all(waits).await;
    info!("Received {name} signal - Starting shutdown");
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C - Starting shutdown"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await
        }
    }
}

/// Reads one request from `stream`, dispatches it and writes the response.
/// The connection is closed after a single exchange.
///
/// A request that is malformed or breaks the size limits in `config` is
/// answered with the matching 4xx status without reaching the router.
pub async fn handle_connection<S>(stream: S, router: &Router, config: &ServerConfig) -> ServerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let request = match read_request(&mut reader, config).await {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()),
        Err(err) if err.status_code() < 500 => {
            let mut response = Response::new(err.status_code());
            let reason = response.reason_phrase();
            response
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(reason);
            write_response(reader.get_mut(), &response, false).await?;
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let head_only = request.method == Method::HEAD;
    let response = dispatch(router, request).await;
    write_response(reader.get_mut(), &response, head_only).await?;
    Ok(())
}

async fn read_request<R>(reader: &mut BufReader<R>, config: &ServerConfig) -> ServerResult<Option<Request>>
where
    R: AsyncRead + Unpin,
{
    let mut budget = config.max_header_size;
    let request_line = read_head_line(reader, &mut budget, config.max_header_size).await?;
    if request_line.is_empty() {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(ServerError::ParseError(format!(
            "invalid request line: {}",
            request_line.trim_end()
        )));
    };
    let method: Method = method.parse().unwrap_or_else(|never| match never {});

    let mut headers = HashMap::new();
    loop {
        let line = read_head_line(reader, &mut budget, config.max_header_size).await?;
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.trim().split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let mut data = Vec::new();
    if let Some(content_length) = headers.get("content-length") {
        let length = content_length
            .parse::<u64>()
            .map_err(|_| ServerError::ParseError(format!("invalid content-length: {content_length}")))?;
        if length > config.max_body_size as u64 {
            return Err(ServerError::PayloadTooLarge {
                length,
                limit: config.max_body_size,
            });
        }
        (&mut *reader).take(length).read_to_end(&mut data).await?;
    }
    let content_type = headers.get("content-type").cloned().unwrap_or_default();

    Ok(Some(Request {
        method,
        target: target.to_string(),
        headers,
        body: Body::from_bytes(data).with_content_type(&content_type),
    }))
}

/// Reads one line of the request head, charging it against `budget`.
/// Returns an empty string at end of stream.
async fn read_head_line<R>(reader: &mut BufReader<R>, budget: &mut usize, limit: usize) -> ServerResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    let read = (&mut *reader)
        .take(*budget as u64)
        .read_line(&mut line)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidData => ServerError::ParseError("request head is not valid UTF-8".into()),
            _ => ServerError::IoError(e),
        })?;
    if read == *budget && !line.ends_with('\n') {
        return Err(ServerError::HeadersTooLarge(limit));
    }
    *budget -= read;
    Ok(line)
}

async fn write_response<W>(stream: &mut W, response: &Response, head_only: bool) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, response.reason_phrase());
    for (name, value) in &response.headers {
        if matches!(name.as_str(), "content-length" | "connection" | "date") {
            continue;
        }
        head += &format!("{name}: {value}\r\n");
    }
    head += &format!("date: {}\r\n", httpdate::fmt_http_date(SystemTime::now()));
    if !response.is_bodiless() {
        head += &format!("content-length: {}\r\n", response.body.len());
    }
    head += "connection: close\r\n\r\n";

    stream.write_all(head.as_bytes()).await?;
    if !head_only && !response.is_bodiless() {
        stream.write_all(&response.body).await?;
    }
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::handler::Completion;
    use std::sync::Mutex;
    use tokio::io::duplex;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn router() -> Router {
        let mut router = Router::default();
        router
            .get("/hello", |_req: Arc<Request>, _ctx: Arc<Context>| {
                Completion::ready(Response::html("Hello webserver"))
            })
            .head("/hello", |_req: Arc<Request>, _ctx: Arc<Context>| {
                Completion::ready(Response::html("Hello webserver"))
            })
            .post("/echo", |req: Arc<Request>, _ctx: Arc<Context>| {
                Completion::ready(Response::text(req.body.as_string()))
            });
        router
    }

    async fn exchange(router: &Router, raw: &[u8]) -> String {
        exchange_with(router, &ServerConfig::default(), raw).await
    }

    async fn exchange_with(router: &Router, config: &ServerConfig, raw: &[u8]) -> String {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(raw).await.unwrap();
        let _ = handle_connection(server, router, config).await;
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).to_string()
    }

    #[tokio::test]
    async fn serves_get_request() {
        let out = exchange(&router(), b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("content-type: text/html; charset=utf-8\r\n"));
        assert!(out.contains("content-length: 15\r\n"));
        assert!(out.ends_with("\r\n\r\nHello webserver"));
    }

    #[tokio::test]
    async fn head_response_has_no_body() {
        let out = exchange(&router(), b"HEAD /hello HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let out = exchange(
            &router(),
            b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\nhello",
        )
        .await;
        assert!(out.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let out = exchange(&router(), b"PATCH /hello HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn malformed_request_line_is_bad_request() {
        let out = exchange(&router(), b"GARBAGE\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        let out = exchange(&router(), b"POST /echo HTTP/1.1\r\nContent-Length: five\r\n\r\nhello").await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn huge_content_length_is_rejected_without_reading() {
        let out = exchange(
            &router(),
            b"POST /echo HTTP/1.1\r\nContent-Length: 1000000000000\r\n\r\nhi",
        )
        .await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn body_limit_is_inclusive() {
        let config = ServerConfig {
            max_body_size: 5,
            ..ServerConfig::default()
        };
        let out = exchange_with(
            &router(),
            &config,
            b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
        )
        .await;
        assert!(out.ends_with("\r\n\r\nhello"));

        let out = exchange_with(
            &router(),
            &config,
            b"POST /echo HTTP/1.1\r\nContent-Length: 6\r\n\r\nhello!",
        )
        .await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn oversized_request_head_is_rejected() {
        let config = ServerConfig {
            max_header_size: 64,
            ..ServerConfig::default()
        };

        let mut raw = b"GET /hello HTTP/1.1\r\nX-Padding: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(200));
        raw.extend_from_slice(b"\r\n\r\n");
        let out = exchange_with(&router(), &config, &raw).await;
        assert!(out.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));

        let mut raw = b"GET /".to_vec();
        raw.extend(std::iter::repeat(b'a').take(200));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        let out = exchange_with(&router(), &config, &raw).await;
        assert!(out.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));

        let out = exchange_with(&router(), &config, b"GET /hello HTTP/1.1\r\nHost: a\r\n\r\n").await;
        assert!(out.ends_with("Hello webserver"));
    }

    #[tokio::test]
    async fn shutdown_drains_then_runs_callbacks_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut app = Application::new(router(), ServerConfig::default());
        for step in ["first", "failing", "last"] {
            let calls = Arc::clone(&calls);
            app.on_shutdown(move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(step);
                    if step == "failing" {
                        Err(ServerError::InternalError("cleanup failed".into()))
                    } else {
                        Ok(())
                    }
                }
            });
        }

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(app.serve_with_shutdown(listener, async move {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /hello HTTP/1.1\r\n\r\n").await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert!(String::from_utf8_lossy(&out).ends_with("Hello webserver"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["first", "failing", "last"]);
    }

    #[tokio::test]
    async fn strict_routes_refuse_to_start() {
        let mut router = router();
        router.get("/files/*/meta", |_req: Arc<Request>, _ctx: Arc<Context>| {
            Completion::ready(Response::new(200))
        });
        let config = ServerConfig {
            strict_routes: true,
            ..ServerConfig::default()
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let result = Application::new(router, config)
            .serve_with_shutdown(listener, async {})
            .await;
        assert!(matches!(result, Err(ServerError::InvalidRoutes(_))));
    }
}
