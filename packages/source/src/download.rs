//! Dataset download with an on-disk cache.
//!
//! The government open-data API does not serve datasets directly. A
//! download is first *initiated*, then *polled* until the response
//! carries a short-lived file URL, which is fetched into a `.tmp` sibling
//! and renamed onto the cache path. A cache file larger than `min_cache_bytes` short-circuits
//! the whole exchange.
//!
//! See <https://guide.data.gov.sg/developer-guide/api-overview>

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::SourceError;

/// Dataset definition, loaded from `datasets/*.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Open-data dataset identifier (e.g. `"d_8b84..."`).
    pub id: String,
    /// Human-readable dataset name.
    pub name: String,
    /// API base URL, without the dataset id.
    pub base_url: String,
    /// File name of the cached CSV under the raw data directory.
    pub cache_file: String,
    /// How many times to poll before giving up.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    /// Delay between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Timeout for each API request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for fetching the exported file itself.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Cache files at or below this size are treated as missing.
    #[serde(default = "default_min_cache_bytes")]
    pub min_cache_bytes: u64,
}

const fn default_poll_attempts() -> u32 {
    10
}

const fn default_poll_interval_secs() -> u64 {
    3
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_download_timeout_secs() -> u64 {
    300
}

const fn default_min_cache_bytes() -> u64 {
    100
}

const HDB_RESALE_TOML: &str = include_str!("../datasets/hdb_resale.toml");

/// Returns the HDB resale dataset definition.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. The file is compiled into
/// the binary, so this is caught by the registry test.
#[must_use]
pub fn hdb_resale_dataset() -> DatasetConfig {
    toml::de::from_str(HDB_RESALE_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse dataset 'hdb_resale': {e}"))
}

/// Returns `Some(path)` if a usable cache file exists at `path`.
#[must_use]
pub fn cached_path(path: &Path, min_bytes: u64) -> Option<PathBuf> {
    let meta = std::fs::metadata(path).ok()?;
    (meta.is_file() && meta.len() > min_bytes).then(|| path.to_path_buf())
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    data: PollData,
}

#[derive(Debug, Deserialize)]
struct PollData {
    url: Option<String>,
}

/// Ensures the dataset is present at `dst`, downloading it if needed.
///
/// # Errors
///
/// Returns [`SourceError`] if any request fails, the poll response is
/// malformed, the file cannot be written, or no download URL appears
/// within `poll_attempts`.
pub async fn cache_dataset(
    client: &reqwest::Client,
    dataset: &DatasetConfig,
    dst: &Path,
) -> Result<PathBuf, SourceError> {
    if let Some(path) = cached_path(dst, dataset.min_cache_bytes) {
        log::info!("{} found locally, skipping download", path.display());
        return Ok(path);
    }

    log::info!("Downloading dataset {} ({})", dataset.id, dataset.name);

    let timeout = Duration::from_secs(dataset.request_timeout_secs);
    let base = format!("{}/{}", dataset.base_url.trim_end_matches('/'), dataset.id);

    client
        .get(format!("{base}/initiate-download"))
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    for attempt in 1..=dataset.poll_attempts {
        let body = client
            .get(format!("{base}/poll-download"))
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if let Some(url) = parse_poll_url(&body)? {
            let download_timeout = Duration::from_secs(dataset.download_timeout_secs);
            return download_to(client, &url, dst, download_timeout).await;
        }

        log::debug!(
            "Dataset {} not ready (poll {attempt}/{})",
            dataset.id,
            dataset.poll_attempts
        );
        tokio::time::sleep(Duration::from_secs(dataset.poll_interval_secs)).await;
    }

    Err(SourceError::DownloadTimedOut {
        dataset_id: dataset.id.clone(),
    })
}

/// Extracts the file URL from a poll response, if the export is ready.
fn parse_poll_url(body: &str) -> Result<Option<String>, SourceError> {
    let resp: PollResponse = serde_json::from_str(body)?;
    Ok(resp.data.url.filter(|u| !u.is_empty()))
}

async fn download_to(
    client: &reqwest::Client,
    url: &str,
    dst: &Path,
    timeout: Duration,
) -> Result<PathBuf, SourceError> {
    let bytes = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(dst, &bytes)?;

    log::info!("CSV saved: {} ({} bytes)", dst.display(), bytes.len());

    Ok(dst.to_path_buf())
}

/// Writes `bytes` to a `.tmp` sibling of `dst`, then renames it into
/// place. On failure the temporary file is removed and `dst` is left as
/// it was.
fn write_atomic(dst: &Path, bytes: &[u8]) -> Result<(), SourceError> {
    let mut tmp = dst.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, dst));
    if result.is_err() {
        std::fs::remove_file(&tmp).ok();
    }
    Ok(result?)
}
