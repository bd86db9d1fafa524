// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub gateway: GatewayConfig,
    pub routes: RoutesConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Master switch for all log output
    pub enabled: bool,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            access_log: true,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds a client may take to send request headers; 0 disables
    pub connection_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            connection_timeout: 300,
            max_connections: None,
        }
    }
}

/// Gateway behaviour
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// `Access-Control-Allow-Origin` value
    pub cors_origin: String,
    /// Default `Cache-Control`; the literal `no-store` disables edge caching
    pub cache_control: String,
    /// Object served with a 404 when the requested one is absent; empty disables
    pub not_found_key: String,
    /// Build stamp used in download keys
    pub build_stamp: String,
    /// Retries per backend call: 0 = none, -1 = unbounded
    pub retry_attempts: i64,
}

impl GatewayConfig {
    pub fn caching_enabled(&self) -> bool {
        self.cache_control != "no-store"
    }

    pub fn not_found_key(&self) -> Option<&str> {
        (!self.not_found_key.is_empty()).then_some(self.not_found_key.as_str())
    }
}

/// Request shapes mapped to object keys
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    /// Product name leading every image key
    pub product: String,
    pub download_path: String,
    pub checksum_path: String,
    /// Keyring object, served at `/<keyring_file>`
    pub keyring_file: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            product: "os".to_string(),
            download_path: "/download".to_string(),
            checksum_path: "/download-checksum".to_string(),
            keyring_file: "keyring.gpg".to_string(),
        }
    }
}

/// Filesystem blob store
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
        }
    }
}

/// In-memory edge cache
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Responses with larger bodies are streamed but never stored
    pub max_entry_bytes: usize,
    /// Entry count bound; least recently used entries are evicted
    pub max_entries: usize,
    /// Bound on the sum of stored body sizes
    pub max_total_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entry_bytes: 64 * 1024 * 1024,
            max_entries: 1024,
            max_total_bytes: 512 * 1024 * 1024,
        }
    }
}
