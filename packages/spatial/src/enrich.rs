//! Spatial enrichment of filtered geocode results.

use std::collections::BTreeMap;

use hdb_resale_geocoder::GeocodeResult;
use hdb_resale_geocoder::filter::FilteredResult;

use crate::SpatialIndex;
use crate::layer::Zone;
use crate::registry::ZoneKind;

/// A geocode result with the zones that contain its point.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    /// Position of the result before residential filtering.
    pub position: usize,
    /// The geocode result.
    pub result: GeocodeResult,
    /// Containing zone per layer. A missing key means no zone.
    pub zones: BTreeMap<ZoneKind, Zone>,
}

impl EnrichedRecord {
    /// The containing zone of `kind`, if any.
    #[must_use]
    pub fn zone(&self, kind: ZoneKind) -> Option<&Zone> {
        self.zones.get(&kind)
    }

    /// Name of the containing zone of `kind`, if any.
    #[must_use]
    pub fn zone_name(&self, kind: ZoneKind) -> Option<&str> {
        self.zone(kind).map(|z| z.name.as_str())
    }
}

/// Assigns zone membership to every result.
///
/// Output has the same length and order as the input. Results without a
/// coordinate get no zones; each layer is matched independently.
#[must_use]
pub fn enrich(results: Vec<FilteredResult>, index: &SpatialIndex) -> Vec<EnrichedRecord> {
    let mut hits: BTreeMap<ZoneKind, usize> = BTreeMap::new();

    let records: Vec<EnrichedRecord> = results
        .into_iter()
        .map(|FilteredResult { position, result }| {
            let zones: BTreeMap<ZoneKind, Zone> = result
                .place
                .as_ref()
                .map(|place| {
                    index
                        .layers()
                        .iter()
                        .filter_map(|layer| {
                            layer
                                .lookup(place.longitude, place.latitude)
                                .map(|zone| (layer.definition().kind, zone.clone()))
                        })
                        .collect()
                })
                .unwrap_or_default();

            for kind in zones.keys() {
                *hits.entry(*kind).or_default() += 1;
            }

            EnrichedRecord {
                position,
                result,
                zones,
            }
        })
        .collect();

    for layer in index.layers() {
        let kind = layer.definition().kind;
        log::info!(
            "{kind}: {} of {} addresses matched a zone",
            hits.get(&kind).copied().unwrap_or(0),
            records.len()
        );
    }

    records
}
