// Server loop module
// Accepts connections until shutdown is requested

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::LocalSet;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept loop; returns the number of connections still open at shutdown
///
/// Must run inside a `LocalSet`: connections are served with `spawn_local`.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> usize {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                break;
            }
        }
    }

    drop(listener);
    active_connections.load(Ordering::SeqCst)
}

/// Serve until shutdown, then wait for background cache writes
///
/// Connections still open at shutdown are closed before waiting: a cache
/// write blocked on a stalled client only finishes once that client's side
/// of the body channel is dropped.
pub async fn serve_until_shutdown(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> usize {
    let local = LocalSet::new();
    let open_connections = local
        .run_until(start_server_loop(listener, Arc::clone(&state), shutdown))
        .await;
    drop(local);

    state.tasks.close();
    logger::log_shutdown_started(open_connections, state.tasks.len());
    state.tasks.wait().await;
    open_connections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EdgeCache, MemoryEdgeCache};
    use crate::config::Config;
    use crate::testing::{sample_time, RecordingStore};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_shutdown_finishes_with_stalled_client() {
        const SIZE: usize = 32 * 1024 * 1024;

        let store = RecordingStore::new();
        store.put("keyring.gpg", vec![7u8; SIZE], sample_time()).await;
        let cache = Arc::new(MemoryEdgeCache::new(SIZE));
        let mut config = Config::default();
        config.logging.access_log = false;
        let state = Arc::new(AppState::new(
            config,
            store,
            Some(Arc::clone(&cache) as Arc<dyn EdgeCache>),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());

        let client = async {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /keyring.gpg HTTP/1.1\r\nHost: gateway\r\n\r\n")
                .await
                .unwrap();
            let mut first = [0u8; 1024];
            stream.read_exact(&mut first).await.unwrap();
            shutdown.notify_one();
            // Returned so the connection stays open and unread
            stream
        };

        let (open_connections, _stalled) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(
                serve_until_shutdown(listener, Arc::clone(&state), Arc::clone(&shutdown)),
                client
            )
        })
        .await
        .expect("shutdown did not finish");

        assert_eq!(open_connections, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.total_bytes().await, SIZE);
    }
}
