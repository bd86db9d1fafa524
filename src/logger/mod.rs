//! Logger module
//!
//! Logging utilities for the gateway:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Backend retry and edge cache events
//! - File-based logging support
//!
//! Everything is a no-op while logging is disabled in configuration.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::Config;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    set_enabled(config.logging.enabled);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn write_info(message: &str) {
    if !is_enabled() {
        return;
    }
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    if !is_enabled() {
        return;
    }
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Gateway started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Storage root: {}", config.storage.root));
    write_info(&format!(
        "Retry budget: {}",
        config
            .retry_policy()
            .max_retries()
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    ));
    if config.edge_cache_enabled() {
        write_info(&format!(
            "Edge cache: enabled ({} entries, {} bytes)",
            config.cache.max_entries, config.cache.max_total_bytes
        ));
    } else {
        write_info("Edge cache: disabled");
    }
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_shutdown_signal(signal: &str) {
    write_info(&format!("[Signal] {signal} received, shutting down"));
}

pub fn log_shutdown_started(open_connections: usize, pending_tasks: usize) {
    write_info(&format!(
        "[Shutdown] Stopped accepting connections, closed {open_connections} open connection(s), waiting for {pending_tasks} background task(s)"
    ));
}

pub fn log_shutdown_complete() {
    write_info("[Shutdown] All background tasks finished");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_info(&entry.format(format));
}

pub fn log_backend_retry(operation: &str, key: &str, attempt: usize, delay: Duration, err: &impl Display) {
    write_error(&format!(
        "[Backend] {operation} {key} failed (attempt {attempt}): {err}; retrying in {}ms",
        delay.as_millis()
    ));
}

pub fn log_backend_exhausted(operation: &str, key: &str, err: &impl Display) {
    write_error(&format!(
        "[Backend] {operation} {key} failed, giving up: {err}"
    ));
}

pub fn log_range_rejected(key: &str, header: &str, reason: &impl Display) {
    write_info(&format!("[Range] {key}: rejected '{header}': {reason}"));
}

pub fn log_cache_hit(key: &impl Display) {
    write_info(&format!("[Cache] HIT {key}"));
}

pub fn log_cache_store(key: &impl Display, bytes: usize) {
    write_info(&format!("[Cache] STORE {key} ({bytes} bytes)"));
}

pub fn log_cache_skip(key: &impl Display, reason: &str) {
    write_info(&format!("[Cache] SKIP {key}: {reason}"));
}
