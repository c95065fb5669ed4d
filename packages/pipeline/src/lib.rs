#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HDB resale address resolution and zone enrichment.
//!
//! A run moves through fixed stages, each consuming the previous one's
//! table in a [`PipelineContext`]:
//!
//! 1. Key every transaction with its normalized query string.
//! 2. Reduce to unique, non-excluded queries.
//! 3. Geocode the unique queries with bounded concurrency.
//! 4. Drop non-residential matches.
//! 5. Attach subzone, electoral division, and town council.
//! 6. Left-join the results back onto every transaction and write a
//!    dated gzip CSV.
//!
//! Stage 5 starts only after every lookup in stage 3 has completed.

pub mod merge;
pub mod output;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hdb_resale_geocoder::address::{AddressRules, key_transactions, unique_addresses};
use hdb_resale_geocoder::batch::{BatchOptions, BatchStats, geocode_all};
use hdb_resale_geocoder::filter::{FilteredResult, ResidentialFilter};
use hdb_resale_geocoder::onemap::{Credentials, OneMapClient};
use hdb_resale_geocoder::{GeocodeError, GeocodeResult, PlaceSearch, service};
use hdb_resale_source::SourceError;
use hdb_resale_source::download::{cache_dataset, hdb_resale_dataset};
use hdb_resale_source::parsing::read_transactions;
use hdb_resale_source::progress::ProgressCallback;
use hdb_resale_spatial::enrich::{EnrichedRecord, enrich};
use hdb_resale_spatial::registry::{ZoneKind, all_layers};
use hdb_resale_spatial::{SpatialError, SpatialIndex};
use hdb_resale_transaction_models::{KeyedTransaction, Transaction, UniqueAddress};

use merge::{FinalRecord, merge_back};

/// Environment variable overriding the default data directory.
pub const DATA_DIR_VAR: &str = "HDB_RESALE_DATA_DIR";

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Dataset acquisition or parsing failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Credentials, authentication, or rule tables failed.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// A polygon layer could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// HTTP client construction failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Locations and limits for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root data directory (`raw/`, `layers/`, `clean/` live under it).
    pub data_dir: PathBuf,
    /// Input CSV; defaults to the cached dataset under `raw/`.
    pub input: Option<PathBuf>,
    /// Polygon layer directory; defaults to `layers/`.
    pub layers_dir: Option<PathBuf>,
    /// Output directory; defaults to `clean/`.
    pub output_dir: Option<PathBuf>,
    /// Maximum in-flight geocoding requests.
    pub concurrency: usize,
    /// Per-request geocoding timeout.
    pub timeout: Duration,
    /// Cap on transactions read.
    pub limit: Option<u64>,
    /// Use the cached dataset without contacting the open-data API.
    pub skip_download: bool,
    /// Replacement address correction table.
    pub corrections: Option<PathBuf>,
    /// Replacement non-residential taxonomy.
    pub nonresidential: Option<PathBuf>,
}

impl PipelineConfig {
    /// Configuration rooted at `data_dir` with the OneMap service defaults.
    #[must_use]
    pub fn new(data_dir: PathBuf) -> Self {
        let onemap = service::onemap();
        Self {
            data_dir,
            input: None,
            layers_dir: None,
            output_dir: None,
            concurrency: onemap.concurrent_requests,
            timeout: onemap.request_timeout(),
            limit: None,
            skip_download: false,
            corrections: None,
            nonresidential: None,
        }
    }

    /// `$HDB_RESALE_DATA_DIR`, or `data` when unset.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        std::env::var_os(DATA_DIR_VAR).map_or_else(|| PathBuf::from("data"), PathBuf::from)
    }

    /// Where the cached raw dataset lives.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("raw").join(hdb_resale_dataset().cache_file)
    }

    /// The CSV to read transactions from.
    #[must_use]
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_else(|| self.cache_path())
    }

    /// Directory holding the polygon layer files.
    #[must_use]
    pub fn layers_path(&self) -> PathBuf {
        self.layers_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("layers"))
    }

    /// Directory the output file is written to.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("clean"))
    }

    /// The correction table to use.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if an override file is unreadable or invalid.
    pub fn address_rules(&self) -> Result<AddressRules, GeocodeError> {
        self.corrections
            .as_deref()
            .map_or_else(|| Ok(AddressRules::embedded()), AddressRules::load)
    }

    /// The non-residential taxonomy to use.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if an override file is unreadable or invalid.
    pub fn residential_filter(&self) -> Result<ResidentialFilter, GeocodeError> {
        self.nonresidential
            .as_deref()
            .map_or_else(|| Ok(ResidentialFilter::embedded()), ResidentialFilter::load)
    }

    const fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            timeout: self.timeout,
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Transactions read.
    pub transactions: usize,
    /// Distinct queries sent to the geocoder.
    pub unique_queries: usize,
    /// Distinct queries skipped by the exclusion list.
    pub excluded_queries: usize,
    /// Transactions carrying an excluded query.
    pub excluded_transactions: usize,
    /// Geocoding outcomes.
    pub geocoding: BatchStats,
    /// Matches dropped as non-residential.
    pub nonresidential: usize,
    /// Addresses matched to a zone, per layer.
    pub zoned: BTreeMap<ZoneKind, usize>,
    /// Output rows.
    pub records: usize,
}

impl RunSummary {
    /// Logs the summary at `info`.
    pub fn log(&self, output: Option<&Path>) {
        log::info!("Run summary:");
        log::info!("  transactions:           {}", self.transactions);
        log::info!(
            "  unique queries:         {} ({} excluded, covering {} transactions)",
            self.unique_queries,
            self.excluded_queries,
            self.excluded_transactions
        );
        log::info!(
            "  geocoded:               {} matched, {} no match, {} failed",
            self.geocoding.matched,
            self.geocoding.no_match,
            self.geocoding.failed
        );
        log::info!("  non-residential:        {}", self.nonresidential);
        for (kind, count) in &self.zoned {
            log::info!("  {:<23} {count}", format!("{kind}:"));
        }
        log::info!("  output rows:            {}", self.records);
        if let Some(path) = output {
            log::info!("  output:                 {}", path.display());
        }
    }
}

/// Intermediate tables of one run.
///
/// Stages must be called in order: [`Self::geocode`],
/// [`Self::filter_residential`], [`Self::enrich`], [`Self::finish`].
#[derive(Debug)]
pub struct PipelineContext {
    transactions: Vec<KeyedTransaction>,
    addresses: Vec<UniqueAddress>,
    geocoded: Vec<GeocodeResult>,
    filtered: Vec<FilteredResult>,
    enriched: Vec<EnrichedRecord>,
    summary: RunSummary,
}

impl PipelineContext {
    /// Keys every transaction and reduces the keys to unique queries.
    #[must_use]
    pub fn new(rules: &AddressRules, transactions: Vec<Transaction>) -> Self {
        let transactions = key_transactions(rules, transactions);
        let addresses = unique_addresses(&transactions);

        let excluded: Vec<&KeyedTransaction> =
            transactions.iter().filter(|t| t.excluded).collect();
        let excluded_queries = excluded
            .iter()
            .map(|t| t.query.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let summary = RunSummary {
            transactions: transactions.len(),
            unique_queries: addresses.len(),
            excluded_queries,
            excluded_transactions: excluded.len(),
            ..RunSummary::default()
        };

        Self {
            transactions,
            addresses,
            geocoded: Vec::new(),
            filtered: Vec::new(),
            enriched: Vec::new(),
            summary,
        }
    }

    /// Keyed transactions.
    #[must_use]
    pub fn transactions(&self) -> &[KeyedTransaction] {
        &self.transactions
    }

    /// Unique queries awaiting geocoding.
    #[must_use]
    pub fn addresses(&self) -> &[UniqueAddress] {
        &self.addresses
    }

    /// Geocodes every unique query.
    pub async fn geocode(
        &mut self,
        search: &dyn PlaceSearch,
        options: BatchOptions,
        progress: &Arc<dyn ProgressCallback>,
    ) {
        let queries: Vec<String> = self.addresses.iter().map(|a| a.query.clone()).collect();
        let (results, stats) = geocode_all(search, &queries, options, progress).await;
        self.geocoded = results;
        self.summary.geocoding = stats;
    }

    /// Drops non-residential matches.
    pub fn filter_residential(&mut self, filter: &ResidentialFilter) {
        let geocoded = std::mem::take(&mut self.geocoded);
        let total = geocoded.len();
        self.filtered = filter.retain_residential(geocoded);
        self.summary.nonresidential = total - self.filtered.len();
    }

    /// Attaches zone membership to the surviving matches.
    pub fn enrich(&mut self, index: &SpatialIndex) {
        self.enriched = enrich(std::mem::take(&mut self.filtered), index);

        let mut zoned = BTreeMap::new();
        for kind in self.enriched.iter().flat_map(|r| r.zones.keys()) {
            *zoned.entry(*kind).or_default() += 1;
        }
        self.summary.zoned = zoned;
    }

    /// Merges everything back onto the transactions.
    #[must_use]
    pub fn finish(self) -> (Vec<FinalRecord>, RunSummary) {
        let records = merge_back(self.transactions, self.enriched);
        let summary = RunSummary {
            records: records.len(),
            ..self.summary
        };
        (records, summary)
    }
}

/// Runs every in-memory stage over `transactions`.
pub async fn process(
    transactions: Vec<Transaction>,
    rules: &AddressRules,
    search: &dyn PlaceSearch,
    options: BatchOptions,
    filter: &ResidentialFilter,
    index: &SpatialIndex,
    progress: &Arc<dyn ProgressCallback>,
) -> (Vec<FinalRecord>, RunSummary) {
    let mut ctx = PipelineContext::new(rules, transactions);
    ctx.geocode(search, options, progress).await;
    ctx.filter_residential(filter);
    ctx.enrich(index);
    ctx.finish()
}

/// Builds the shared HTTP client.
///
/// # Errors
///
/// Returns [`PipelineError::Http`] if the TLS backend fails to initialize.
pub fn http_client() -> Result<reqwest::Client, PipelineError> {
    Ok(reqwest::Client::builder()
        .user_agent("hdb-resale/1.0")
        .build()?)
}

/// Makes sure the input CSV is on disk, downloading the dataset if it is
/// the default input and not cached.
///
/// # Errors
///
/// Returns [`PipelineError::Source`] if the download fails.
pub async fn ensure_input(
    config: &PipelineConfig,
    client: &reqwest::Client,
) -> Result<PathBuf, PipelineError> {
    if let Some(input) = &config.input {
        return Ok(input.clone());
    }

    let path = config.cache_path();
    if config.skip_download {
        log::info!("Skipping download, using {}", path.display());
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(cache_dataset(client, &hdb_resale_dataset(), &path).await?)
}

/// Runs the full pipeline with OneMap credentials from the environment
/// and returns the output path.
///
/// # Errors
///
/// Returns [`PipelineError`] on any fatal failure. No output file is left
/// behind in that case.
pub async fn run(
    config: &PipelineConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PathBuf, PipelineError> {
    run_with_lookup(config, |var| std::env::var(var).ok(), progress).await
}

/// Runs the full pipeline, reading credentials through `lookup`.
///
/// Credentials are checked before anything else. Every other fatal
/// condition (input, rule tables, polygon layers, token exchange) is
/// checked before the first search is sent.
///
/// # Errors
///
/// Returns [`PipelineError`] on any fatal failure. No output file is left
/// behind in that case.
pub async fn run_with_lookup(
    config: &PipelineConfig,
    lookup: impl Fn(&str) -> Option<String>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PathBuf, PipelineError> {
    let credentials = Credentials::from_lookup(lookup)?;
    let client = http_client()?;

    let input = ensure_input(config, &client).await?;
    let transactions = read_transactions(&input, config.limit)?;
    log::info!(
        "Read {} transactions from {}",
        transactions.len(),
        input.display()
    );

    let rules = config.address_rules()?;
    let filter = config.residential_filter()?;
    let index = SpatialIndex::load(&config.layers_path(), all_layers())?;

    let onemap = OneMapClient::authenticate(client, &service::onemap(), &credentials)
        .await?
        .with_timeout(config.timeout);

    let (records, summary) = process(
        transactions,
        &rules,
        &onemap,
        config.batch_options(),
        &filter,
        &index,
        progress,
    )
    .await;

    let path = output::write_gzip_csv(
        &records,
        &config.output_path(),
        chrono::Utc::now().date_naive(),
    )?;
    summary.log(Some(&path));

    Ok(path)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use hdb_resale_geocoder::PlaceMatch;
    use hdb_resale_source::progress::null_progress;
    use hdb_resale_spatial::layer::ZoneLayer;
    use hdb_resale_spatial::projection::Crs;
    use hdb_resale_spatial::registry::LayerDefinition;
    use hdb_resale_transaction_models::{Period, RemainingLease};

    use super::*;

    pub(crate) fn transaction(block: &str, street: &str) -> Transaction {
        Transaction {
            period: Period {
                year: 2024,
                month: 1,
            },
            town: "SENGKANG".to_string(),
            flat_type: "4 ROOM".to_string(),
            block: block.to_string(),
            street: street.to_string(),
            storey_range: "04 TO 06".to_string(),
            floor_area_sqm: 93.0,
            flat_model: "Model A".to_string(),
            lease_commence: 2001,
            resale_price: 560_000.0,
            remaining_lease: RemainingLease {
                years: 76,
                months: 4,
            },
        }
    }

    pub(crate) fn keyed(block: &str, street: &str, query: &str) -> KeyedTransaction {
        KeyedTransaction {
            transaction: transaction(block, street),
            query: query.to_string(),
            excluded: false,
        }
    }

    pub(crate) fn place(latitude: f64, longitude: f64) -> PlaceMatch {
        PlaceMatch {
            building: None,
            address: None,
            block: None,
            road: None,
            postal: None,
            latitude,
            longitude,
        }
    }

    /// Answers from a fixed table keyed by query; sleeps on `slow`.
    #[derive(Default)]
    struct TableSearch {
        answers: BTreeMap<String, PlaceMatch>,
        slow: BTreeSet<String>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TableSearch {
        fn answer(mut self, query: &str, building: Option<&str>, lat: f64, lon: f64) -> Self {
            let mut p = place(lat, lon);
            p.building = building.map(String::from);
            self.answers.insert(query.to_string(), p);
            self
        }

        fn slow(mut self, query: &str) -> Self {
            self.slow.insert(query.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlaceSearch for TableSearch {
        async fn search(&self, query: &str) -> Result<Option<PlaceMatch>, GeocodeError> {
            self.calls.lock().unwrap().push(query.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if self.slow.contains(query) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            } else {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.answers.get(query).cloned())
        }
    }

    fn layer(kind: ZoneKind, property: &str, name: &str, min: (f64, f64), max: (f64, f64)) -> ZoneLayer {
        let (x0, y0) = min;
        let (x1, y1) = max;
        let geojson = format!(
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{"{property}":"{name}","PLN_AREA_N":"SENGKANG"}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}]}}"#
        );
        let definition = LayerDefinition {
            id: kind.as_ref().to_lowercase(),
            kind,
            name: kind.to_string(),
            file: String::new(),
            crs: Crs::Wgs84,
            name_property: property.to_string(),
            extra_properties: vec!["PLN_AREA_N".to_string()],
        };
        ZoneLayer::from_geojson_str(definition, &geojson).unwrap()
    }

    /// Sengkang subzone and town council; the electoral layer covers a
    /// different area entirely.
    fn index() -> SpatialIndex {
        SpatialIndex::from_layers(vec![
            layer(ZoneKind::Subzone, "SUBZONE_N", "ANCHORVALE", (103.88, 1.38), (103.90, 1.40)),
            layer(ZoneKind::ElectoralDivision, "ED_DESC", "JURONG", (103.70, 1.30), (103.75, 1.35)),
            layer(ZoneKind::TownCouncil, "TOWN_COUNC", "SENGKANG", (103.85, 1.36), (103.92, 1.42)),
        ])
    }

    fn options(concurrency: usize, timeout: Duration) -> BatchOptions {
        BatchOptions {
            concurrency,
            timeout,
        }
    }

    #[tokio::test]
    async fn duplicate_addresses_geocode_once() {
        let search = TableSearch::default().answer(
            "10%20ANCHORVALE%20STREET",
            Some("ANCHORVALE VILLAGE"),
            1.3964,
            103.8893,
        );

        let (records, summary) = process(
            vec![
                transaction("10", "ANCHORVALE STREET"),
                transaction("10", "ANCHORVALE STREET"),
            ],
            &AddressRules::embedded(),
            &search,
            options(15, Duration::from_secs(5)),
            &ResidentialFilter::embedded(),
            &index(),
            &null_progress(),
        )
        .await;

        assert_eq!(search.calls(), ["10%20ANCHORVALE%20STREET"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].place, records[1].place);
        assert!((records[0].place.as_ref().unwrap().latitude - 1.3964).abs() < 1e-9);
        assert_eq!(records[0].zone_name(ZoneKind::Subzone), Some("ANCHORVALE"));
        assert_eq!(records[0].zone_name(ZoneKind::TownCouncil), Some("SENGKANG"));
        assert_eq!(records[0].zone_name(ZoneKind::ElectoralDivision), None);
        assert_eq!(summary.unique_queries, 1);
        assert_eq!(summary.records, 2);
    }

    #[tokio::test]
    async fn excluded_addresses_are_never_sent() {
        let search = TableSearch::default()
            .answer("10%20ANCHORVALE%20STREET", None, 1.39, 103.89)
            .answer("1A%20WOODLANDS%20CTR%20RD", None, 1.43, 103.79);

        let (records, summary) = process(
            vec![
                transaction("1A", "WOODLANDS CTR RD"),
                transaction("10", "ANCHORVALE STREET"),
                transaction("1A", "WOODLANDS CTR RD"),
            ],
            &AddressRules::embedded(),
            &search,
            options(15, Duration::from_secs(5)),
            &ResidentialFilter::embedded(),
            &index(),
            &null_progress(),
        )
        .await;

        assert_eq!(search.calls(), ["10%20ANCHORVALE%20STREET"]);
        assert_eq!(records.len(), 3);
        assert!(records[0].place.is_none());
        assert!(records[0].zones.is_empty());
        assert!(records[1].place.is_some());
        assert!(records[2].place.is_none());
        assert_eq!(summary.excluded_queries, 1);
        assert_eq!(summary.excluded_transactions, 2);
    }

    #[tokio::test]
    async fn timeout_only_affects_its_own_query() {
        let search = TableSearch::default()
            .answer("10%20ANCHORVALE%20STREET", None, 1.39, 103.89)
            .answer("11%20ANCHORVALE%20STREET", None, 1.39, 103.89)
            .slow("11%20ANCHORVALE%20STREET");

        let (records, summary) = process(
            vec![
                transaction("10", "ANCHORVALE STREET"),
                transaction("11", "ANCHORVALE STREET"),
            ],
            &AddressRules::embedded(),
            &search,
            options(15, Duration::from_millis(200)),
            &ResidentialFilter::embedded(),
            &index(),
            &null_progress(),
        )
        .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].zone_name(ZoneKind::Subzone), Some("ANCHORVALE"));
        assert!(records[1].place.is_none());
        assert!(records[1].zones.is_empty());
        assert_eq!(summary.geocoding.failed, 1);
        assert_eq!(summary.geocoding.matched, 1);
    }

    #[tokio::test]
    async fn nonresidential_match_yields_empty_record() {
        let search = TableSearch::default()
            .answer("10%20ANCHORVALE%20STREET", Some("SPARKLETOTS PRESCHOOL"), 1.39, 103.89)
            .answer("11%20ANCHORVALE%20STREET", None, 1.39, 103.89);

        let (records, summary) = process(
            vec![
                transaction("10", "ANCHORVALE STREET"),
                transaction("11", "ANCHORVALE STREET"),
            ],
            &AddressRules::embedded(),
            &search,
            options(15, Duration::from_secs(5)),
            &ResidentialFilter::embedded(),
            &index(),
            &null_progress(),
        )
        .await;

        assert_eq!(records.len(), 2);
        assert!(records[0].place.is_none());
        assert_eq!(records[1].zone_name(ZoneKind::Subzone), Some("ANCHORVALE"));
        assert_eq!(summary.nonresidential, 1);
    }

    #[tokio::test]
    async fn row_count_matches_input_under_load() {
        let transactions: Vec<Transaction> = (0..300)
            .map(|i| transaction(&(i % 75).to_string(), "ANCHORVALE STREET"))
            .collect();
        let search = (0..75).fold(TableSearch::default(), |s, i| {
            s.answer(&format!("{i}%20ANCHORVALE%20STREET"), None, 1.39, 103.89)
        });

        let (records, summary) = process(
            transactions,
            &AddressRules::embedded(),
            &search,
            options(8, Duration::from_secs(5)),
            &ResidentialFilter::embedded(),
            &index(),
            &null_progress(),
        )
        .await;

        assert_eq!(records.len(), 300);
        assert_eq!(summary.unique_queries, 75);
        assert_eq!(search.calls().len(), 75);
        assert!(search.peak.load(Ordering::SeqCst) <= 8);
        assert_eq!(summary.zoned.get(&ZoneKind::Subzone), Some(&75));
        assert!(
            records
                .iter()
                .all(|r| r.zone_name(ZoneKind::Subzone) == Some("ANCHORVALE"))
        );
    }

    #[test]
    fn config_paths_default_under_data_dir() {
        let config = PipelineConfig::new(PathBuf::from("/tmp/hdb"));
        assert_eq!(config.layers_path(), PathBuf::from("/tmp/hdb/layers"));
        assert_eq!(config.output_path(), PathBuf::from("/tmp/hdb/clean"));
        assert!(config.input_path().starts_with("/tmp/hdb/raw"));
        assert_eq!(config.concurrency, 15);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut config = PipelineConfig::new(PathBuf::from("/tmp/hdb"));
        config.input = Some(PathBuf::from("/elsewhere/resale.csv"));
        config.output_dir = Some(PathBuf::from("/out"));
        assert_eq!(config.input_path(), PathBuf::from("/elsewhere/resale.csv"));
        assert_eq!(config.output_path(), PathBuf::from("/out"));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_work() {
        let data_dir = std::env::temp_dir().join("hdb_resale_no_credentials_test");
        std::fs::remove_dir_all(&data_dir).ok();
        let config = PipelineConfig::new(data_dir.clone());

        let err = run_with_lookup(&config, |_| None, &null_progress())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Geocode(GeocodeError::MissingCredentials { var })
                if var == hdb_resale_geocoder::onemap::EMAIL_VAR
        ));
        assert!(!data_dir.exists(), "nothing should be downloaded or written");
    }
}
