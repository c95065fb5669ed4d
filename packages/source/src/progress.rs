//! Progress reporting for long-running pipeline stages.
//!
//! [`ProgressCallback`] keeps stages such as geocoding independent of any
//! rendering backend. The binary plugs in `indicatif` bars; tests and
//! headless runs use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a pipeline stage.
///
/// Shared with the concurrent geocoding tasks behind an `Arc`, hence
/// `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Number of units the stage will process.
    fn set_total(&self, total: u64);

    /// Advance by `delta` completed units.
    fn inc(&self, delta: u64);

    /// Replace the label shown next to the indicator.
    fn set_message(&self, msg: String);

    /// The stage is done; `msg` is the summary line to leave behind.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
