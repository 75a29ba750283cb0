//! API configuration.

/// Configuration for the ingestion HTTP server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5003,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("VOX_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("VOX_API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5003),
            max_upload_bytes: std::env::var("VOX_API_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(512 * 1024 * 1024),
        }
    }
}
