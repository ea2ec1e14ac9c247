//! Client configuration
//!
//! Runtime configuration is limited to a handful of environment variables;
//! the API base URL is the only one a deployment normally sets.

/// Configuration for the API gateway and services
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Default TTL for cached GET responses, in seconds
    pub cache_ttl_secs: i64,
}

impl ClientConfig {
    /// Create a new ClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SUBASTA_API_BASE_URL`: API base URL (default: "https://api.subasta30.com")
    /// - `SUBASTA_REQUEST_TIMEOUT`: per-request timeout in seconds (default: 30)
    /// - `SUBASTA_CACHE_TTL`: GET cache TTL in seconds (default: 300)
    pub fn from_env() -> Self {
        let base_url = std::env::var("SUBASTA_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.subasta30.com".to_string());

        let timeout_secs = std::env::var("SUBASTA_REQUEST_TIMEOUT")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let cache_ttl_secs = std::env::var("SUBASTA_CACHE_TTL")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            cache_ttl_secs,
        }
    }

    /// Configuration pointed at a specific base URL, defaults elsewhere
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: 30,
            cache_ttl_secs: 300,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_base_url("https://api.subasta30.com")
    }
}
