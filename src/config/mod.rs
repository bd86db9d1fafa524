// Configuration module entry point
// Loads and validates gateway configuration, and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

use crate::backend::RetryPolicy;

// Re-export public types
pub use state::AppState;
pub use types::{
    CacheConfig, Config, GatewayConfig, LoggingConfig, PerformanceConfig, RoutesConfig,
    ServerConfig, StorageConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Values from `ISOGATE__<SECTION>__<KEY>` environment variables override
    /// the file, e.g. `ISOGATE__GATEWAY__RETRY_ATTEMPTS=-1`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("ISOGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the gateway cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.gateway.retry_attempts < -1 {
            return Err(config::ConfigError::Message(format!(
                "gateway.retry_attempts must be -1 or greater, got {}",
                self.gateway.retry_attempts
            )));
        }
        for (name, path) in [
            ("routes.download_path", &self.routes.download_path),
            ("routes.checksum_path", &self.routes.checksum_path),
        ] {
            if !path.starts_with('/') {
                return Err(config::ConfigError::Message(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }
        if self.routes.keyring_file.is_empty() || self.routes.keyring_file.contains('/') {
            return Err(config::ConfigError::Message(format!(
                "routes.keyring_file must be a bare file name, got '{}'",
                self.routes.keyring_file
            )));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(config::ConfigError::Message(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_budget(self.gateway.retry_attempts)
    }

    /// Whether responses may be stored in the edge cache
    pub fn edge_cache_enabled(&self) -> bool {
        self.cache.enabled && self.gateway.caching_enabled()
    }
}
