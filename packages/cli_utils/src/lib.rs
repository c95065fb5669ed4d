#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the `hdb_resale` binary.
//!
//! [`init_logger`] routes `log` output through `indicatif-log-bridge` so
//! log lines print above the geocoding bar instead of tearing it.
//! [`IndicatifProgress::geocoding_bar`] renders the batch geocoder's
//! progress with its running match counts.

use std::sync::Arc;
use std::time::Duration;

use hdb_resale_source::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

pub use indicatif::MultiProgress;

/// Module prefix shared by every crate in this workspace.
const CRATE_PREFIX: &str = "hdb_resale";

/// An `indicatif` bar driven through [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied when the total becomes known.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Bar for the geocoding stage.
    ///
    /// Spins while addresses are being keyed, then shows queries done out
    /// of the unique total. The message slot carries the running
    /// matched / no match / failed counts.
    #[must_use]
    pub fn geocoding_bar(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::geocoding(multi.add(ProgressBar::new_spinner())))
    }

    fn geocoding(bar: ProgressBar) -> Self {
        bar.set_prefix("Geocoding");
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix} unique addresses...")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let bar_style = ProgressStyle::with_template(
            "{prefix:>10} {wide_bar:.cyan/dim} {pos}/{len} [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self { bar, bar_style }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.disable_steady_tick();
        self.bar.finish_with_message(msg);
    }
}

/// Level applied to this workspace's crates for a `-v` count.
#[must_use]
pub const fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// Workspace crates log at [`verbosity_level`]`(verbose)` and
/// dependencies at `warn`. `RUST_LOG` directives are applied on top.
/// Returns the [`MultiProgress`] every progress bar must be added to.
#[must_use]
pub fn init_logger(verbose: u8) -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Warn)
        .filter_module(CRATE_PREFIX, verbosity_level(verbose))
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Fails only when a logger is already installed.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();
    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(verbosity_level(0), LevelFilter::Info);
        assert_eq!(verbosity_level(1), LevelFilter::Debug);
        assert_eq!(verbosity_level(4), LevelFilter::Trace);
    }

    #[test]
    fn geocoding_bar_tracks_batch() {
        let progress = IndicatifProgress::geocoding(ProgressBar::hidden());

        progress.set_total(75);
        assert_eq!(progress.bar.length(), Some(75));

        progress.inc(3);
        progress.set_message("2 matched, 1 no match, 0 failed".to_string());
        assert_eq!(progress.bar.position(), 3);
        assert_eq!(progress.bar.message(), "2 matched, 1 no match, 0 failed");

        progress.finish("Geocoded 75 addresses".to_string());
        assert!(progress.bar.is_finished());
        assert_eq!(progress.bar.prefix(), "Geocoding");
    }
}
