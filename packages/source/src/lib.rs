#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HDB resale dataset acquisition and raw transaction parsing.
//!
//! [`download`] fetches the resale dataset from the government open-data
//! API (with an on-disk cache), and [`parsing`] turns the cached CSV into
//! [`hdb_resale_transaction_models::Transaction`] rows.

pub mod download;
pub mod parsing;
pub mod progress;

/// Errors that can occur while acquiring or parsing the dataset.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row could not be converted into a transaction.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// The open-data API never produced a download URL.
    #[error("Dataset {dataset_id} download timed out")]
    DownloadTimedOut {
        /// The dataset that was being fetched.
        dataset_id: String,
    },
}
