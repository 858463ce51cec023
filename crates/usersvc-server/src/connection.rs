//! Per-connection request service.

use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use usersvc_core::{
    respond_error, respond_internal_error, respond_message, ApiError, HttpResponse,
};

use crate::config::{ServerLifecycleConfig, HANDLER_TIMEOUT_MESSAGE};
use crate::dispatch::Dispatcher;
use crate::io::{ConnPhase, IoTimeouts, Phase, TimedIo};
use crate::shutdown::ShutdownSignal;

/// State shared by every connection of one lifecycle.
pub(crate) struct ConnectionContext {
    dispatcher: Arc<dyn Dispatcher>,
    handler_timeout: Duration,
    io_timeouts: IoTimeouts,
}

impl ConnectionContext {
    pub(crate) fn new(config: &ServerLifecycleConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            handler_timeout: config.handler_timeout(),
            io_timeouts: IoTimeouts {
                read: config.read_timeout(),
                write: config.write_timeout(),
                idle: config.idle_timeout(),
            },
        }
    }

    /// Runs one request under the handler timeout.
    ///
    /// A panicking handler answers `500` and leaves the connection usable.
    async fn handle(&self, req: Request<Incoming>, phase: &ConnPhase) -> HttpResponse {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        // Pipelined requests are parsed from hyper's buffer without new reads.
        phase.enter_reading();

        let supervised = AssertUnwindSafe(self.process(req, phase)).catch_unwind();
        let response = match tokio::time::timeout(self.handler_timeout, supervised).await {
            Ok(Ok(response)) => response,
            Ok(Err(panic)) => {
                tracing::error!(
                    method = %method,
                    path = %path,
                    panic = panic_message(&*panic),
                    "Handler panicked"
                );
                respond_internal_error()
            }
            Err(_) => {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    timeout = ?self.handler_timeout,
                    "Handler timed out"
                );
                respond_message(StatusCode::SERVICE_UNAVAILABLE, HANDLER_TIMEOUT_MESSAGE)
            }
        };
        phase.set(Phase::Idle);

        tracing::debug!(
            http.method = %method,
            http.path = %path,
            http.status_code = response.status().as_u16(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Request completed"
        );
        response
    }

    async fn process(&self, req: Request<Incoming>, phase: &ConnPhase) -> HttpResponse {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return respond_error(&ApiError::simple("failed to read request body"));
            }
        };

        phase.set(Phase::Handling);
        self.dispatcher
            .dispatch(Request::from_parts(parts, body))
            .await
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Serves HTTP/1.1 on `stream` until the peer leaves or shutdown asks the
/// connection to finish its current request and close.
pub(crate) async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    ctx: Arc<ConnectionContext>,
    shutdown: ShutdownSignal,
) {
    let phase = Arc::new(ConnPhase::new());
    let io = TokioIo::new(TimedIo::new(stream, ctx.io_timeouts, Arc::clone(&phase)));

    let service = service_fn(move |req: Request<Incoming>| {
        let ctx = Arc::clone(&ctx);
        let phase = Arc::clone(&phase);
        async move { Ok::<_, Infallible>(ctx.handle(req, &phase).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            tracing::debug!(remote_addr = %remote_addr, "Closing connection for shutdown");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(remote_addr = %remote_addr, error = %e, "Connection closed with error");
    }
}
