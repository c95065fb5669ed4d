#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the HDB resale enrichment pipeline.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser, Subcommand};
use hdb_resale_cli_utils::IndicatifProgress;
use hdb_resale_geocoder::address::{key_transactions, unique_addresses};
use hdb_resale_pipeline::{PipelineConfig, ensure_input, http_client};
use hdb_resale_source::parsing::read_transactions;
use hdb_resale_spatial::registry::all_layers;

#[derive(Parser)]
#[command(name = "hdb_resale", about = "HDB resale geocoding and zone enrichment")]
struct Cli {
    /// Root data directory (defaults to `$HDB_RESALE_DATA_DIR`, then `data`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log more detail (`-v` debug, `-vv` trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the merged output
    Run {
        /// Read transactions from this CSV instead of the cached dataset
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory holding the polygon layer GeoJSON files
        #[arg(long)]
        layers_dir: Option<PathBuf>,
        /// Directory to write the output file to
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Maximum number of concurrent geocoding requests
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-request geocoding timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Maximum number of transactions to read (for testing)
        #[arg(long)]
        limit: Option<u64>,
        /// Use the cached dataset without checking the open-data API
        #[arg(long)]
        skip_download: bool,
        /// Address correction table (TOML) replacing the built-in one
        #[arg(long)]
        corrections: Option<PathBuf>,
        /// Non-residential pattern taxonomy (TOML) replacing the built-in one
        #[arg(long)]
        nonresidential: Option<PathBuf>,
    },
    /// Download and cache the resale dataset
    Download,
    /// Print the unique geocoder queries without geocoding them
    Normalize {
        /// Read transactions from this CSV instead of the cached dataset
        #[arg(long)]
        input: Option<PathBuf>,
        /// Maximum number of transactions to read
        #[arg(long)]
        limit: Option<u64>,
        /// Address correction table (TOML) replacing the built-in one
        #[arg(long)]
        corrections: Option<PathBuf>,
    },
    /// List the configured polygon layers
    Layers {
        /// Directory holding the polygon layer GeoJSON files
        #[arg(long)]
        layers_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = hdb_resale_cli_utils::init_logger(cli.verbose);

    let mut config = PipelineConfig::new(
        cli.data_dir
            .unwrap_or_else(PipelineConfig::default_data_dir),
    );

    match cli.command {
        Commands::Run {
            input,
            layers_dir,
            output_dir,
            concurrency,
            timeout_secs,
            limit,
            skip_download,
            corrections,
            nonresidential,
        } => {
            config.input = input;
            config.layers_dir = layers_dir;
            config.output_dir = output_dir;
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            if let Some(secs) = timeout_secs {
                config.timeout = Duration::from_secs(secs);
            }
            config.limit = limit;
            config.skip_download = skip_download;
            config.corrections = corrections;
            config.nonresidential = nonresidential;

            let start = Instant::now();
            let progress = IndicatifProgress::geocoding_bar(&multi);
            let path = hdb_resale_pipeline::run(&config, &progress).await?;
            log::info!(
                "Pipeline complete in {:.1}s: {}",
                start.elapsed().as_secs_f64(),
                path.display()
            );
        }
        Commands::Download => {
            let path = ensure_input(&config, &http_client()?).await?;
            log::info!("Dataset available at {}", path.display());
        }
        Commands::Normalize {
            input,
            limit,
            corrections,
        } => {
            config.input = input;
            config.corrections = corrections;

            let transactions = read_transactions(&config.input_path(), limit)?;
            let keyed = key_transactions(&config.address_rules()?, transactions);
            let unique = unique_addresses(&keyed);

            println!("{:<8} {:<40} QUERY", "ID", "ADDRESS");
            println!("{}", "-".repeat(90));
            for address in &unique {
                println!(
                    "{:<8} {:<40} {}",
                    address.id,
                    format!("{} {}", address.block, address.street),
                    address.query
                );
            }
        }
        Commands::Layers { layers_dir } => {
            config.layers_dir = layers_dir;
            let dir = config.layers_path();

            println!("{:<20} {:<20} {:<10} FILE", "ID", "KIND", "CRS");
            println!("{}", "-".repeat(80));
            for layer in all_layers() {
                let path = dir.join(&layer.file);
                let status = if path.is_file() { "" } else { " (missing)" };
                println!(
                    "{:<20} {:<20} {:<10} {}{status}",
                    layer.id,
                    layer.kind.as_ref(),
                    layer.crs.as_ref(),
                    path.display()
                );
            }
        }
    }

    Ok(())
}
