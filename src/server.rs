//! HTTP server implementation using hyper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::http::HeaderValue;
use hyper::service::service_fn;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SharedConfig;
use crate::cors::{self, Decision};
use crate::handlers::system::serve_static;
use crate::response::{self, HttpResponse};
use crate::router::{Context, Next, RouteMatch, RouterHandle};

/// Maximum request body size in bytes (1 MB).
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Maximum number of concurrent connections.
pub const MAX_CONNECTIONS: usize = 128;

/// Timeout for reading request headers (slowloris protection).
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// How long shutdown waits for open connections to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state.
pub struct State {
    pub config: SharedConfig,
    pub router: Arc<RouterHandle>,
}

/// Handle to a running server instance.
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<crate::Result<()>>,
}

impl Server {
    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, let open connections drain, and wait for the loop to
    /// finish.
    pub async fn shutdown(self) -> crate::Result<()> {
        let _ = self.shutdown_tx.send(());
        self.task.await.unwrap_or(Ok(()))
    }
}

/// Add security headers to a response.
fn add_security_headers(response: &mut HttpResponse) {
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
}

fn log_request(method: &Method, path: &str, status: StatusCode, started: Instant) {
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = status.as_u16();
    if status >= 500 {
        error!(%method, path, status, latency_ms, "request");
    } else if status >= 400 {
        warn!(%method, path, status, latency_ms, "request");
    } else {
        info!(%method, path, status, latency_ms, "request");
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<State>,
) -> Result<HttpResponse, std::convert::Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = dispatch(req, &state).await;
    add_security_headers(&mut response);
    log_request(&method, &path, response.status(), started);
    Ok(response)
}

async fn dispatch(req: Request<Incoming>, state: &State) -> HttpResponse {
    let (parts, body) = req.into_parts();

    let allow_origin = match cors::check(&state.config.server, &parts.headers, &parts.uri) {
        Decision::Pass => None,
        Decision::Allow(origin) => Some(origin),
        Decision::Reject => {
            warn!(
                origin = ?parts.headers.get(hyper::header::ORIGIN),
                "Cross-origin request rejected"
            );
            return response::error(StatusCode::FORBIDDEN, "Cross-origin requests not allowed");
        }
    };

    let mut response = if allow_origin.is_some() && parts.method == Method::OPTIONS {
        response::no_content()
    } else {
        route(parts, body, state).await
    };

    if let Some(origin) = allow_origin {
        cors::apply(response.headers_mut(), origin);
    }
    response
}

async fn route(
    parts: hyper::http::request::Parts,
    body: Incoming,
    state: &State,
) -> HttpResponse {
    // Reject oversized bodies early via Content-Length header
    let declared = parts
        .headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_SIZE) {
        return crate::Error::PayloadTooLarge.into_response();
    }

    // Read body with size limit (fallback for chunked encoding)
    let body = match Limited::new(body, MAX_BODY_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Request body rejected: {e}");
            return crate::Error::PayloadTooLarge.into_response();
        }
    };

    let path = parts.uri.path().to_string();
    match state.router.match_route(&parts.method, &path) {
        RouteMatch::Matched { chain, params } => {
            let mut ctx = Context::new(
                parts.method,
                parts.uri,
                parts.headers,
                body,
                state.config.clone(),
            );
            ctx.params = params;

            match Next::new(chain).run(ctx).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            }
        }
        RouteMatch::MethodNotAllowed => {
            response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        RouteMatch::NotFound => {
            serve_static(&state.config.server, Request::from_parts(parts, ())).await
        }
    }
}

fn overloaded() -> HttpResponse {
    let mut response = response::error(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable");
    add_security_headers(&mut response);
    response
}

/// Bind, start accepting connections, and return a handle.
///
/// The returned [`Server`] exposes the bound address and a
/// [`shutdown`](Server::shutdown) method for graceful termination.
pub async fn start(config: SharedConfig, router: Arc<RouterHandle>) -> crate::Result<Server> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let state = Arc::new(State { config, router });

    info!("Server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    let task = tokio::spawn(async move {
        tokio::pin!(shutdown_rx);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept connection: {e}");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);

                    match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => {
                            let state = Arc::clone(&state);
                            tokio::spawn(async move {
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    handle_request(req, state)
                                });

                                let mut builder = auto::Builder::new(TokioExecutor::new());
                                builder.http1()
                                    .timer(TokioTimer::new())
                                    .header_read_timeout(HEADER_READ_TIMEOUT);

                                if let Err(e) = builder.serve_connection(io, service).await {
                                    debug!("Error serving connection from {}: {}", remote_addr, e);
                                }

                                drop(permit);
                            });
                        }
                        Err(_) => {
                            warn!("Connection limit reached, rejecting {}", remote_addr);
                            tokio::spawn(async move {
                                let service = service_fn(|_req: Request<Incoming>| async {
                                    Ok::<_, std::convert::Infallible>(overloaded())
                                });

                                let mut builder = auto::Builder::new(TokioExecutor::new());
                                builder.http1()
                                    .keep_alive(false)
                                    .timer(TokioTimer::new())
                                    .header_read_timeout(HEADER_READ_TIMEOUT);

                                let _ = builder.serve_connection(io, service).await;
                            });
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        drop(listener);
        info!("Server stopped accepting, draining connections");
        let all = MAX_CONNECTIONS as u32;
        if tokio::time::timeout(DRAIN_TIMEOUT, semaphore.acquire_many(all)).await.is_err() {
            warn!(
                open = MAX_CONNECTIONS - semaphore.available_permits(),
                "Drain timed out, closing remaining connections"
            );
        }

        Ok(())
    });

    Ok(Server {
        addr,
        shutdown_tx,
        task,
    })
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn run(config: SharedConfig, router: Arc<RouterHandle>) -> crate::Result<()> {
    let server = start(config, router).await?;
    shutdown_signal().await;
    info!("Shutdown signal received");
    server.shutdown().await
}
