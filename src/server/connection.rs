// Connection handling module
// Serves one accepted TCP connection and writes the access log per request

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::header::{HeaderName, CONTENT_LENGTH, RANGE, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, Version};
use hyper_util::rt::{TokioIo, TokioTimer};

use crate::config::{AppState, PerformanceConfig};
use crate::handler::{self, RequestOutcome};
use crate::http::ResponseBody;
use crate::logger::{self, AccessLogEntry};

/// Accept a connection unless the connection limit is reached
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    handle_connection(stream, peer_addr, Arc::clone(state), Arc::clone(conn_counter));
}

/// Serve a connection on the local task set.
///
/// `performance.connection_timeout` bounds how long the client may take to
/// send request headers; 0 disables it. Response bodies are never cut off.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);
        let builder = connection_builder(&state.config.performance);

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| serve_request(req, Arc::clone(&state), peer_addr)),
        );

        if let Err(err) = conn.await {
            if err.is_timeout() {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} closed after header read timeout"
                ));
            } else {
                logger::log_connection_error(&err);
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

fn connection_builder(performance: &PerformanceConfig) -> http1::Builder {
    let mut builder = http1::Builder::new();
    builder.keep_alive(performance.keep_alive);
    if performance.connection_timeout > 0 {
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(performance.connection_timeout));
    }
    builder
}

async fn serve_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let entry = state
        .config
        .logging
        .access_log
        .then(|| request_entry(&req, peer_addr));
    let started = Instant::now();

    let response = handler::handle_request(req, Arc::clone(&state)).await?;

    if let Some(mut entry) = entry {
        finish_entry(&mut entry, &response, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

fn request_entry(req: &Request<Incoming>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        _ => "1.1",
    }
    .to_string();
    entry.range = header(RANGE);
    entry.user_agent = header(USER_AGENT);
    entry
}

fn finish_entry(entry: &mut AccessLogEntry, response: &Response<ResponseBody>, started: Instant) {
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if let Some(outcome) = response.extensions().get::<RequestOutcome>() {
        entry.object_key.clone_from(&outcome.object_key);
        entry.cache_status = outcome.cache_status;
    }
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
}
