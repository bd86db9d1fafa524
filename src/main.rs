use std::sync::Arc;

use isogate::cache::{EdgeCache, MemoryEdgeCache};
use isogate::config::{AppState, Config};
use isogate::logger;
use isogate::server::{self, SignalHandler};
use isogate::storage::FsBlobStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config file path without extension, e.g. `isogate /etc/isogate/config`
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;

    // Create Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    logger::init(&cfg)?;

    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let store = Arc::new(FsBlobStore::new(&cfg.storage.root));
    let edge_cache = cfg
        .edge_cache_enabled()
        .then(|| Arc::new(MemoryEdgeCache::from_config(&cfg.cache)) as Arc<dyn EdgeCache>);

    logger::log_server_start(&addr, &cfg);
    let state = Arc::new(AppState::new(cfg, store, edge_cache));

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    server::serve_until_shutdown(listener, state, Arc::clone(&signals.shutdown)).await;
    logger::log_shutdown_complete();

    Ok(())
}
