use std::time::Duration;

/// Connection settings for the REST fallback transport.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("STORE_BASE_URL").unwrap_or_else(|_| Self::default().base_url),
            request_timeout: std::env::var("STORE_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(10)),
        }
    }
}
