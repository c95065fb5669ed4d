//! OneMap service configuration.
//!
//! Endpoints and limits live in `services/onemap.toml`, embedded at
//! compile time. The concurrency ceiling and per-request timeout can be
//! overridden from the command line without touching the file.

use std::time::Duration;

use serde::Deserialize;

/// Geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (`"onemap"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// API origin, e.g. `"https://www.onemap.gov.sg"`.
    pub base_url: String,
    /// Path of the credential-for-token exchange endpoint.
    pub token_path: String,
    /// Path of the search endpoint.
    pub search_path: String,
    /// Maximum number of in-flight search requests.
    #[serde(default = "default_concurrent")]
    pub concurrent_requests: usize,
    /// Time budget for a single search request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Time budget for the token exchange.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
}

const fn default_concurrent() -> usize {
    15
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_auth_timeout_secs() -> u64 {
    15
}

impl GeocodingService {
    /// Per-request search timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Token exchange timeout.
    #[must_use]
    pub const fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Full URL of the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.token_path)
    }

    /// Full URL of the search endpoint (without query parameters).
    #[must_use]
    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.search_path)
    }
}

const ONEMAP_TOML: &str = include_str!("../services/onemap.toml");

/// Returns the OneMap service configuration.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (compile-time data, covered
/// by tests).
#[must_use]
pub fn onemap() -> GeocodingService {
    toml::de::from_str(ONEMAP_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse geocoding service 'onemap': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_onemap() {
        let svc = onemap();
        assert_eq!(svc.id, "onemap");
        assert!(!svc.name.is_empty());
        assert!(svc.base_url.starts_with("https://"));
        assert!(svc.concurrent_requests > 0);
        assert_eq!(svc.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn builds_urls() {
        let svc = onemap();
        assert_eq!(
            svc.token_url(),
            "https://www.onemap.gov.sg/api/auth/post/getToken"
        );
        assert_eq!(
            svc.search_url(),
            "https://www.onemap.gov.sg/api/common/elastic/search"
        );
    }
}
