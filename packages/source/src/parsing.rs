//! Raw resale CSV parsing.
//!
//! The open-data export uses lower-case snake headers (`month`, `town`,
//! `street_name`, ...). Each row is decoded into a [`RawRow`] and then
//! converted into a typed [`Transaction`]. Files ending in `.gz` are
//! decompressed transparently.

use std::io::Read;
use std::path::Path;

use hdb_resale_transaction_models::{Period, RemainingLease, Transaction};
use serde::Deserialize;

use crate::SourceError;

/// One CSV row exactly as published.
#[derive(Debug, Deserialize)]
struct RawRow {
    month: String,
    town: String,
    flat_type: String,
    block: String,
    street_name: String,
    storey_range: String,
    floor_area_sqm: f64,
    flat_model: String,
    lease_commence_date: u16,
    resale_price: f64,
    remaining_lease: String,
}

impl RawRow {
    fn into_transaction(self, line: u64) -> Result<Transaction, SourceError> {
        let period = Period::parse(&self.month).map_err(|e| SourceError::Parse {
            message: format!("line {line}: {e}"),
        })?;

        let remaining_lease =
            RemainingLease::parse(&self.remaining_lease).ok_or_else(|| SourceError::Parse {
                message: format!(
                    "line {line}: invalid remaining lease '{}'",
                    self.remaining_lease
                ),
            })?;

        Ok(Transaction {
            period,
            town: self.town,
            flat_type: self.flat_type,
            block: self.block,
            street: self.street_name,
            storey_range: self.storey_range,
            floor_area_sqm: self.floor_area_sqm,
            flat_model: self.flat_model,
            lease_commence: self.lease_commence_date,
            resale_price: self.resale_price,
            remaining_lease,
        })
    }
}

/// Reads every transaction from the CSV file at `path`.
///
/// Surrounding whitespace is trimmed from every field. `limit` caps the
/// number of rows read.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be opened, is not valid
/// CSV, or any row has an unparseable field. A bad row aborts the whole
/// read; no partial result is returned.
pub fn read_transactions(path: &Path, limit: Option<u64>) -> Result<Vec<Transaction>, SourceError> {
    let file = std::fs::File::open(path)?;

    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let transactions = parse_transactions(reader, limit)?;

    log::info!(
        "Read {} transactions from {}",
        transactions.len(),
        path.display()
    );

    Ok(transactions)
}

/// Parses transactions from any CSV reader.
///
/// # Errors
///
/// Returns [`SourceError`] on malformed CSV or unparseable fields.
pub fn parse_transactions<R: Read>(
    reader: R,
    limit: Option<u64>,
) -> Result<Vec<Transaction>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut transactions = Vec::new();

    for result in reader.deserialize::<RawRow>() {
        if let Some(max) = limit
            && transactions.len() as u64 >= max
        {
            log::info!("Reached limit of {max} transactions, stopping CSV parse");
            break;
        }

        let row = result?;
        // Header is line 1.
        let line = transactions.len() as u64 + 2;
        transactions.push(row.into_transaction(line)?);
    }

    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "month,town,flat_type,block,street_name,storey_range,\
                          floor_area_sqm,flat_model,lease_commence_date,resale_price,\
                          remaining_lease\n";

    #[test]
    fn parses_rows() {
        let csv = format!(
            "{HEADER}\
             2017-01,ANG MO KIO,2 ROOM,406,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years 04 months\n\
             2024-06,SENGKANG,4 ROOM, 10 ,ANCHORVALE ST ,04 TO 06,93,Model A,2001,560000.5,76 years\n"
        );

        let rows = parse_transactions(csv.as_bytes(), None).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].period.year, 2017);
        assert_eq!(rows[0].period.month, 1);
        assert_eq!(rows[0].remaining_lease.years, 61);
        assert_eq!(rows[0].remaining_lease.months, 4);
        assert_eq!(rows[0].lease_commence, 1979);

        assert_eq!(rows[1].block, "10");
        assert_eq!(rows[1].street, "ANCHORVALE ST");
        assert_eq!(rows[1].remaining_lease.months, 0);
        assert!((rows[1].resale_price - 560_000.5).abs() < f64::EPSILON);
    }

    #[test]
    fn respects_limit() {
        let csv = format!(
            "{HEADER}\
             2017-01,ANG MO KIO,2 ROOM,406,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years\n\
             2017-01,ANG MO KIO,2 ROOM,407,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years\n\
             2017-01,ANG MO KIO,2 ROOM,408,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years\n"
        );

        let rows = parse_transactions(csv.as_bytes(), Some(2)).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn reports_bad_period_with_line() {
        let csv = format!(
            "{HEADER}\
             2017-01,ANG MO KIO,2 ROOM,406,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years\n\
             2017/xx,ANG MO KIO,2 ROOM,406,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years\n"
        );

        let err = parse_transactions(csv.as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn rejects_non_numeric_price() {
        let csv = format!(
            "{HEADER}\
             2017-01,ANG MO KIO,2 ROOM,406,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,lots,61 years\n"
        );

        assert!(matches!(
            parse_transactions(csv.as_bytes(), None),
            Err(SourceError::Csv(_))
        ));
    }

    #[test]
    fn reads_gzipped_file() {
        use std::io::Write as _;

        let tmp = std::env::temp_dir().join("hdb_resale_parsing_test.csv.gz");
        {
            let file = std::fs::File::create(&tmp).unwrap();
            let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            write!(
                gz,
                "{HEADER}2017-01,ANG MO KIO,2 ROOM,406,ANG MO KIO AVE 10,10 TO 12,44,Improved,1979,232000,61 years\n"
            )
            .unwrap();
            gz.finish().unwrap();
        }

        let rows = read_transactions(&tmp, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].town, "ANG MO KIO");

        let _ = std::fs::remove_file(&tmp);
    }
}
