#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address resolution for HDB resale transactions.
//!
//! 1. [`address`] turns raw block + street pairs into `%20`-encoded
//!    OneMap query strings using a curated correction table, flags
//!    queries on the exclusion list, and deduplicates them.
//! 2. [`onemap`] authenticates against the OneMap API and resolves one
//!    query to its top-ranked candidate.
//! 3. [`batch`] fans the unique queries out over a bounded number of
//!    concurrent lookups. Every query yields exactly one
//!    [`GeocodeResult`], empty when the lookup failed or found nothing.
//! 4. [`filter`] drops results whose building name marks them as
//!    non-residential.
//!
//! The correction table and the non-residential taxonomy are TOML data
//! under `rules/`, embedded at compile time and replaceable at runtime.

pub mod address;
pub mod batch;
pub mod filter;
pub mod onemap;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;

/// The top-ranked candidate returned for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceMatch {
    /// Building name, `None` when the geocoder reports none (`"NIL"`).
    pub building: Option<String>,
    /// Formatted address text.
    pub address: Option<String>,
    /// Block number as understood by the geocoder.
    pub block: Option<String>,
    /// Road name as understood by the geocoder.
    pub road: Option<String>,
    /// Six-digit postal code.
    pub postal: Option<String>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
}

/// Geocoding outcome for one unique query string.
///
/// `query` is the provenance key used to join results back onto
/// transactions; completion order under concurrency is arbitrary.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    /// The query string that produced this result.
    pub query: String,
    /// The top candidate, or `None` if the lookup failed or was empty.
    pub place: Option<PlaceMatch>,
}

impl GeocodeResult {
    /// An empty result that only carries its query string.
    #[must_use]
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            place: None,
        }
    }

    /// Building name of the top candidate, if any.
    #[must_use]
    pub fn building(&self) -> Option<&str> {
        self.place.as_ref().and_then(|p| p.building.as_deref())
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// The status code received.
        status: reqwest::StatusCode,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The lookup exceeded its time budget.
    #[error("Request timed out")]
    Timeout,

    /// A required credential variable is not set.
    #[error("Missing credentials: {var} is not set")]
    MissingCredentials {
        /// Name of the missing environment variable.
        var: &'static str,
    },

    /// The token exchange was rejected or returned no token.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Description of the failure.
        message: String,
    },

    /// A rule table could not be read or compiled.
    #[error("Invalid rule table: {message}")]
    Rules {
        /// Description of the failure.
        message: String,
    },

    /// I/O error while reading a rule file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves a single query string to its top candidate.
///
/// [`onemap::OneMapClient`] is the production implementation; tests plug
/// in mocks to exercise [`batch::geocode_all`] without the network.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Looks up `query`.
    ///
    /// Returns `Ok(None)` when the service found nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport, status, or payload errors.
    async fn search(&self, query: &str) -> Result<Option<PlaceMatch>, GeocodeError>;
}
