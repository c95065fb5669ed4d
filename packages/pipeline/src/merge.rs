//! Merge-back of enriched geocode results onto every transaction.

use std::collections::BTreeMap;

use hdb_resale_geocoder::PlaceMatch;
use hdb_resale_spatial::enrich::EnrichedRecord;
use hdb_resale_spatial::layer::Zone;
use hdb_resale_spatial::registry::ZoneKind;
use hdb_resale_transaction_models::{KeyedTransaction, Transaction};

/// A transaction with whatever the pipeline resolved for its address.
///
/// The query string and filter position are dropped here; they only
/// matter inside the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRecord {
    /// The original transaction.
    pub transaction: Transaction,
    /// Top geocoder candidate, `None` if unresolved, excluded, or filtered.
    pub place: Option<PlaceMatch>,
    /// Containing zone per layer.
    pub zones: BTreeMap<ZoneKind, Zone>,
}

impl FinalRecord {
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

/// Left-joins `enriched` onto `transactions` by query string.
///
/// The output has exactly one record per transaction, in input order.
/// Transactions whose query has no enriched record get empty enrichment.
#[must_use]
pub fn merge_back(
    transactions: Vec<KeyedTransaction>,
    enriched: Vec<EnrichedRecord>,
) -> Vec<FinalRecord> {
    let mut by_query: BTreeMap<String, EnrichedRecord> = BTreeMap::new();
    for record in enriched {
        by_query
            .entry(record.result.query.clone())
            .or_insert(record);
    }

    transactions
        .into_iter()
        .map(|KeyedTransaction {
                 transaction, query, ..
             }| {
            let (place, zones) = by_query.get(&query).map_or_else(Default::default, |record| {
                (record.result.place.clone(), record.zones.clone())
            });
            FinalRecord {
                transaction,
                place,
                zones,
            }
        })
        .collect()
}
