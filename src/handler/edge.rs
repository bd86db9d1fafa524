//! Edge cache bridge
//!
//! Serves hits before the object pipeline runs and populates the cache
//! afterwards. Population runs on the state's `TaskTracker`: the task owns
//! the response body, forwards each chunk to the client through a channel
//! and keeps reading after the client goes away, so a finished transfer is
//! always stored.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream;
use http_body_util::BodyExt;
use hyper::header::CONTENT_LENGTH;
use hyper::Response;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::cache::{CacheKey, CachedResponse, EdgeCache};
use crate::http::body::{self, ResponseBody};
use crate::logger;

/// Chunks buffered between the population task and the client
const CHANNEL_DEPTH: usize = 8;

/// Cached response for `key`, if one exists and may be replayed
pub async fn lookup(cache: &dyn EdgeCache, key: &CacheKey) -> Option<Response<ResponseBody>> {
    let cached = cache.lookup(key).await?;
    if !cached.is_servable() {
        return None;
    }
    logger::log_cache_hit(key);
    Some(cached.to_response())
}

fn declared_length(response: &Response<ResponseBody>) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Hand `response` back to the client while a tracked task stores a copy
pub fn store_in_background(
    tasks: &TaskTracker,
    cache: Arc<dyn EdgeCache>,
    key: CacheKey,
    response: Response<ResponseBody>,
    max_entry_bytes: usize,
) -> Response<ResponseBody> {
    if declared_length(&response).is_some_and(|len| len > max_entry_bytes as u64) {
        logger::log_cache_skip(&key, "body exceeds max_entry_bytes");
        return response;
    }

    let (parts, mut source) = response.into_parts();
    let status = parts.status;
    let headers = parts.headers.clone();
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(CHANNEL_DEPTH);

    tasks.spawn(async move {
        let mut client = Some(tx);
        let mut buffer = Some(BytesMut::new());

        while let Some(frame) = source.frame().await {
            let data = match frame {
                Ok(frame) => match frame.into_data() {
                    Ok(data) => data,
                    Err(_) => continue,
                },
                Err(err) => {
                    logger::log_cache_skip(&key, &format!("body stream failed: {err}"));
                    if let Some(sender) = client.take() {
                        let _ = sender.send(Err(err)).await;
                    }
                    return;
                }
            };

            if let Some(buf) = buffer.as_mut() {
                if buf.len() + data.len() > max_entry_bytes {
                    logger::log_cache_skip(&key, "body exceeds max_entry_bytes");
                    buffer = None;
                } else {
                    buf.extend_from_slice(&data);
                }
            }

            if let Some(sender) = client.as_ref() {
                if sender.send(Ok(data)).await.is_err() {
                    client = None;
                }
            }

            if client.is_none() && buffer.is_none() {
                return;
            }
        }
        // Close the client stream before the cache write
        drop(client);

        let Some(buffer) = buffer else {
            return;
        };
        let body = buffer.freeze();
        let size = body.len();
        let cached = CachedResponse {
            status,
            headers,
            body,
        };
        if cache.store(key.clone(), cached).await {
            logger::log_cache_store(&key, size);
        } else {
            logger::log_cache_skip(&key, "refused by cache");
        }
    });

    let forwarded = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    Response::from_parts(parts, body::from_stream(Box::pin(forwarded)))
}
