//! Bounded concurrent geocoding of unique query strings.
//!
//! Lookups are driven through a buffered stream, so at most
//! `concurrency` searches are in flight at any instant and results are
//! collected by the single task polling the stream. Each lookup is
//! isolated: a timeout, transport error, bad status, or malformed body
//! turns into an empty [`GeocodeResult`] for that query alone.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt as _};
use hdb_resale_source::progress::ProgressCallback;

use crate::{GeocodeError, GeocodeResult, PlaceMatch, PlaceSearch};

/// Limits applied to a geocoding batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Maximum number of in-flight lookups. Values below 1 are raised
    /// to 1.
    pub concurrency: usize,
    /// Time budget for each lookup.
    pub timeout: Duration,
}

/// Counts of how a batch resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Queries that produced a candidate.
    pub matched: usize,
    /// Queries the service answered with no candidates.
    pub no_match: usize,
    /// Queries whose lookup failed.
    pub failed: usize,
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} matched, {} no match, {} failed",
            self.matched, self.no_match, self.failed
        )
    }
}

/// Running [`BatchStats`] updated as lookups complete.
#[derive(Default)]
struct Tally {
    matched: AtomicUsize,
    no_match: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    /// Counts and logs one lookup, turning it into its result row.
    fn record(
        &self,
        query: String,
        outcome: Result<Option<PlaceMatch>, GeocodeError>,
    ) -> GeocodeResult {
        match outcome {
            Ok(Some(place)) => {
                self.matched.fetch_add(1, Ordering::Relaxed);
                GeocodeResult {
                    query,
                    place: Some(place),
                }
            }
            Ok(None) => {
                log::debug!("OneMap: no match for '{query}'");
                self.no_match.fetch_add(1, Ordering::Relaxed);
                GeocodeResult::empty(query)
            }
            Err(e) => {
                log::warn!("OneMap error for '{query}': {e}");
                self.failed.fetch_add(1, Ordering::Relaxed);
                GeocodeResult::empty(query)
            }
        }
    }

    fn snapshot(&self) -> BatchStats {
        BatchStats {
            matched: self.matched.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Geocodes every query, returning exactly one result per query.
///
/// Results come back in completion order, not input order; consumers
/// must join on [`GeocodeResult::query`]. The caller is expected to pass
/// distinct queries. After each lookup the progress message is set to
/// the running [`BatchStats`].
pub async fn geocode_all(
    search: &dyn PlaceSearch,
    queries: &[String],
    options: BatchOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> (Vec<GeocodeResult>, BatchStats) {
    let concurrency = options.concurrency.max(1);

    log::info!(
        "Geocoding {} addresses (concurrency={concurrency}, timeout={:?})...",
        queries.len(),
        options.timeout
    );
    progress.set_total(queries.len() as u64);

    let tally = &Tally::default();
    let results: Vec<GeocodeResult> = stream::iter(queries.iter().map(|query| async move {
        let outcome = match tokio::time::timeout(options.timeout, search.search(query)).await {
            Ok(inner) => inner,
            Err(_elapsed) => Err(GeocodeError::Timeout),
        };
        let result = tally.record(query.clone(), outcome);
        progress.inc(1);
        progress.set_message(tally.snapshot().to_string());
        result
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let stats = tally.snapshot();
    progress.finish(format!("Geocoded {} addresses ({stats})", results.len()));
    log::info!("Geocoding complete: {stats}");

    (results, stats)
}
