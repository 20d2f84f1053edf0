//! HTTP server implementation using hyper.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::SharedConfig;
use crate::response::{self, HttpResponse};
use crate::router::{Context, RouterHandle};

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

    /// Shut down the accept loop and wait for it to finish.
    pub async fn shutdown(self) -> crate::Result<()> {
        let _ = self.shutdown_tx.send(());
        join(self.task).await
    }
}

async fn join(task: JoinHandle<crate::Result<()>>) -> crate::Result<()> {
    task.await
        .map_err(|e| crate::Error::Internal(format!("Server task failed: {e}")))?
}

/// Add security headers to a response.
fn add_standard_headers(response: &mut HttpResponse) {
    let headers = response.headers_mut();
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'"),
    );
}

fn payload_too_large() -> HttpResponse {
    let mut response = response::error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
    add_standard_headers(&mut response);
    response
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<State>,
) -> Result<HttpResponse, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let max_body = state.config.limits.max_body_bytes;

    // Reject oversized bodies early via Content-Length header
    if let Some(cl) = parts.headers.get(hyper::header::CONTENT_LENGTH)
        && let Ok(len) = cl.to_str().unwrap_or("0").parse::<usize>()
        && len > max_body
    {
        return Ok(payload_too_large());
    }

    // Read body with size limit (fallback for chunked encoding)
    let body_bytes = match BodyExt::collect(Limited::new(body, max_body)).await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Ok(payload_too_large()),
    };

    let ctx = Context::new(parts.method, parts.uri, Arc::clone(&state.config))
        .with_headers(parts.headers)
        .with_body(body_bytes);

    let mut response = state.router.dispatch(ctx).await;
    add_standard_headers(&mut response);
    Ok(response)
}

/// Bind, start accepting connections, and return a handle.
///
/// The returned [`Server`] exposes the bound address and a
/// [`shutdown`](Server::shutdown) method for graceful termination.
pub async fn start(config: SharedConfig, router: Arc<RouterHandle>) -> crate::Result<Server> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let max_connections = config.limits.max_connections;
    let header_timeout = config.limits.header_timeout();
    let state = Arc::new(State { config, router });

    info!("Server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let task = tokio::spawn(async move {
        tokio::pin!(shutdown_rx);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = result?;
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
                                    .header_read_timeout(header_timeout);

                                if let Err(e) = builder.serve_connection(io, service).await {
                                    error!("Error serving connection from {}: {}", remote_addr, e);
                                }

                                drop(permit);
                            });
                        }
                        Err(_) => {
                            warn!("Connection limit reached, rejecting {}", remote_addr);
                            tokio::spawn(async move {
                                let service = service_fn(|_req: Request<Incoming>| async {
                                    let mut response = response::error(
                                        StatusCode::SERVICE_UNAVAILABLE,
                                        "Service unavailable",
                                    );
                                    add_standard_headers(&mut response);
                                    Ok::<_, std::convert::Infallible>(response)
                                });

                                let mut builder = auto::Builder::new(TokioExecutor::new());
                                builder.http1()
                                    .timer(TokioTimer::new())
                                    .header_read_timeout(header_timeout);

                                let _ = builder.serve_connection(io, service).await;
                            });
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("Server on {} shutting down", addr);
                    break;
                }
            }
        }

        Ok(())
    });

    Ok(Server {
        addr,
        shutdown_tx,
        task,
    })
}

/// Run the HTTP server until the accept loop stops.
///
/// # Arguments
/// * `config` - Server configuration
/// * `router` - Router handle with registered routes
pub async fn run(config: SharedConfig, router: Arc<RouterHandle>) -> crate::Result<()> {
    let server = start(config, router).await?;
    join(server.task).await
}
