//! HTTP gateway for immutable ISO images, checksums and keyrings
//!
//! Requests are resolved to object keys, run through range negotiation and
//! precondition evaluation against a retrying blob store client, and served
//! through a read-through edge cache.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod storage;

#[cfg(test)]
mod testing;
