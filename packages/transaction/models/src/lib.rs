#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resale transaction and unique address types.
//!
//! A [`Transaction`] is one row of the HDB resale dataset. The pipeline
//! derives a geocoder query string from its block and street, producing a
//! [`KeyedTransaction`]. Transactions sharing a query string collapse into
//! a single [`UniqueAddress`], which is what actually gets geocoded.

use serde::{Deserialize, Serialize};

/// Calendar month a transaction was registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    /// Four-digit year.
    pub year: u16,
    /// Month of year, 1-12.
    pub month: u8,
}

impl Period {
    /// Parses a `YYYY-MM` period string.
    ///
    /// The year is taken from the first four characters and the month
    /// from characters 5..7, so trailing content (e.g. a day) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriodError`] if either component is missing,
    /// non-numeric, or the month is outside 1-12.
    pub fn parse(raw: &str) -> Result<Self, InvalidPeriodError> {
        let raw = raw.trim();
        let err = || InvalidPeriodError {
            value: raw.to_string(),
        };

        let year = raw
            .get(..4)
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(err)?;
        let month = raw
            .get(5..7)
            .and_then(|s| s.parse::<u8>().ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(err)?;

        Ok(Self { year, month })
    }
}

/// Error returned when a transaction period cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period '{value}': expected YYYY-MM")]
pub struct InvalidPeriodError {
    /// The offending raw value.
    pub value: String,
}

/// Remaining lease at the time of sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingLease {
    /// Whole years remaining.
    pub years: u16,
    /// Additional months remaining (0 when the source omits them).
    pub months: u8,
}

impl RemainingLease {
    /// Parses the dataset's remaining lease text.
    ///
    /// Accepts `"61 years 04 months"`, `"61 years"` and a bare `"61"`.
    /// Years are the leading digits; months are read from the fixed
    /// character offset 9..11 and default to zero when absent.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        let digits_end = raw
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(raw.len());
        let years = raw[..digits_end].parse::<u16>().ok()?;

        let months = raw
            .get(9..11)
            .and_then(|s| s.trim().parse::<u8>().ok())
            .unwrap_or(0);

        Some(Self { years, months })
    }
}

/// One resale transaction as read from the raw dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Month of registration.
    pub period: Period,
    /// HDB town (e.g. `"SENGKANG"`).
    pub town: String,
    /// Flat type (e.g. `"4 ROOM"`).
    pub flat_type: String,
    /// Block number, may carry a letter suffix (e.g. `"1A"`).
    pub block: String,
    /// Street name as published (abbreviated, e.g. `"ANCHORVALE ST"`).
    pub street: String,
    /// Storey range (e.g. `"10 TO 12"`).
    pub storey_range: String,
    /// Floor area in square metres.
    pub floor_area_sqm: f64,
    /// Flat model (e.g. `"Model A"`).
    pub flat_model: String,
    /// Year the 99-year lease commenced.
    pub lease_commence: u16,
    /// Resale price in SGD.
    pub resale_price: f64,
    /// Remaining lease at the time of sale.
    pub remaining_lease: RemainingLease,
}

/// A [`Transaction`] paired with its normalized geocoder query string.
///
/// The query string is computed exactly once and is the join key between
/// transactions and geocode results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedTransaction {
    /// The underlying transaction.
    pub transaction: Transaction,
    /// Normalized, `%20`-encoded query string.
    pub query: String,
    /// Whether the query is on the exclusion list and must not be
    /// geocoded.
    pub excluded: bool,
}

/// One distinct query string to be geocoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueAddress {
    /// Dense 1-based ordinal, for traceability only. Never used as a join
    /// key.
    pub id: u64,
    /// Block of the first transaction carrying this query.
    pub block: String,
    /// Street of the first transaction carrying this query.
    pub street: String,
    /// Normalized query string.
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_period() {
        assert_eq!(
            Period::parse("2017-01").unwrap(),
            Period {
                year: 2017,
                month: 1
            }
        );
    }

    #[test]
    fn rejects_bad_period() {
        assert!(Period::parse("2017").is_err());
        assert!(Period::parse("2017-13").is_err());
        assert!(Period::parse("abcd-01").is_err());
    }

    #[test]
    fn period_error_names_value() {
        let err = Period::parse("Jan 2017").unwrap_err();
        assert_eq!(err.value, "Jan 2017");
        assert_eq!(err.to_string(), "invalid period 'Jan 2017': expected YYYY-MM");
    }

    #[test]
    fn parses_lease_with_months() {
        assert_eq!(
            RemainingLease::parse("61 years 04 months"),
            Some(RemainingLease {
                years: 61,
                months: 4
            })
        );
    }

    #[test]
    fn parses_lease_without_months() {
        assert_eq!(
            RemainingLease::parse("61 years"),
            Some(RemainingLease {
                years: 61,
                months: 0
            })
        );
        assert_eq!(
            RemainingLease::parse("70"),
            Some(RemainingLease {
                years: 70,
                months: 0
            })
        );
    }

    #[test]
    fn parses_single_month() {
        assert_eq!(
            RemainingLease::parse("94 years 01 month"),
            Some(RemainingLease {
                years: 94,
                months: 1
            })
        );
    }

    #[test]
    fn rejects_non_numeric_lease() {
        assert_eq!(RemainingLease::parse("unknown"), None);
        assert_eq!(RemainingLease::parse(""), None);
    }
}
