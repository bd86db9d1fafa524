// Application state module
// Everything a request handler needs, shared across connections

use std::sync::Arc;

use tokio_util::task::TaskTracker;

use super::types::Config;
use crate::backend::ResilientClient;
use crate::cache::EdgeCache;
use crate::storage::BlobStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub client: ResilientClient,
    /// `None` when edge caching is disabled
    pub edge_cache: Option<Arc<dyn EdgeCache>>,
    /// Background cache writes, drained on shutdown
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn BlobStore>,
        edge_cache: Option<Arc<dyn EdgeCache>>,
    ) -> Self {
        let client = ResilientClient::new(store, config.retry_policy());
        let edge_cache = edge_cache.filter(|_| config.gateway.caching_enabled());
        Self {
            config,
            client,
            edge_cache,
            tasks: TaskTracker::new(),
        }
    }
}
