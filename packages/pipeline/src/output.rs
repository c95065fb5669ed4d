//! Gzip-compressed CSV output.
//!
//! Column names are the ones the reporting dashboard reads, so they keep
//! their historical spelling (`Lease.Remain`, `TOWN_COUNC`, ...).

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use hdb_resale_spatial::registry::ZoneKind;
use serde::Serialize;

use crate::PipelineError;
use crate::merge::FinalRecord;

/// Header row, in output order.
pub const COLUMNS: [&str; 25] = [
    "Year",
    "Month",
    "Town",
    "Flat_Type",
    "Block",
    "Street",
    "Storey_Range",
    "Floor_Area_Sqm",
    "Flat_Model",
    "Lease_Commence",
    "Resale_Price",
    "Lease.Remain",
    "Lease.Remain.Month",
    "BLK_NO",
    "ROAD_NAME",
    "BUILDING",
    "ADDRESS",
    "POSTAL",
    "LATITUDE",
    "LONGITUDE",
    "SUBZONE_N",
    "PLN_AREA_N",
    "REGION_N",
    "ED_DESC",
    "TOWN_COUNC",
];

const PLANNING_AREA: &str = "PLN_AREA_N";
const REGION: &str = "REGION_N";

/// One flattened output line. Field order must match [`COLUMNS`].
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    year: u16,
    month: u8,
    town: &'a str,
    flat_type: &'a str,
    block: &'a str,
    street: &'a str,
    storey_range: &'a str,
    floor_area_sqm: f64,
    flat_model: &'a str,
    lease_commence: u16,
    resale_price: f64,
    lease_remain: u16,
    lease_remain_month: String,
    blk_no: Option<&'a str>,
    road_name: Option<&'a str>,
    building: Option<&'a str>,
    address: Option<&'a str>,
    postal: Option<&'a str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    subzone: Option<&'a str>,
    planning_area: Option<&'a str>,
    region: Option<&'a str>,
    electoral_division: Option<&'a str>,
    town_council: Option<&'a str>,
}

impl<'a> From<&'a FinalRecord> for OutputRow<'a> {
    fn from(record: &'a FinalRecord) -> Self {
        let t = &record.transaction;
        let place = record.place.as_ref();
        let subzone = record.zone(ZoneKind::Subzone);

        Self {
            year: t.period.year,
            month: t.period.month,
            town: &t.town,
            flat_type: &t.flat_type,
            block: &t.block,
            street: &t.street,
            storey_range: &t.storey_range,
            floor_area_sqm: t.floor_area_sqm,
            flat_model: &t.flat_model,
            lease_commence: t.lease_commence,
            resale_price: t.resale_price,
            lease_remain: t.remaining_lease.years,
            lease_remain_month: format!("{:02}", t.remaining_lease.months),
            blk_no: place.and_then(|p| p.block.as_deref()),
            road_name: place.and_then(|p| p.road.as_deref()),
            building: place.and_then(|p| p.building.as_deref()),
            address: place.and_then(|p| p.address.as_deref()),
            postal: place.and_then(|p| p.postal.as_deref()),
            latitude: place.map(|p| p.latitude),
            longitude: place.map(|p| p.longitude),
            subzone: subzone.map(|z| z.name.as_str()),
            planning_area: subzone.and_then(|z| z.attribute(PLANNING_AREA)),
            region: subzone.and_then(|z| z.attribute(REGION)),
            electoral_division: record.zone_name(ZoneKind::ElectoralDivision),
            town_council: record.zone_name(ZoneKind::TownCouncil),
        }
    }
}

/// Output file name for a run on `date`.
#[must_use]
pub fn output_file_name(date: NaiveDate) -> String {
    format!(
        "HDB_Resale_Transactions_Merged_{}.csv.gz",
        date.format("%Y%m%d")
    )
}

/// Writes `records` to `dir` as a gzip CSV named for `date`.
///
/// The file is written to a `.tmp` sibling and renamed into place, so an
/// interrupted run never leaves a truncated output behind.
///
/// # Errors
///
/// Returns [`PipelineError`] if the directory or file cannot be written.
pub fn write_gzip_csv(
    records: &[FinalRecord],
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(output_file_name(date));
    let tmp_path = path.with_extension("gz.tmp");

    if let Err(e) = write_records(records, &tmp_path) {
        std::fs::remove_file(&tmp_path).ok();
        return Err(e);
    }
    std::fs::rename(&tmp_path, &path)?;

    #[allow(clippy::cast_precision_loss)]
    let mb = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0) as f64 / 1_048_576.0;
    log::info!(
        "Wrote {} rows to {} ({mb:.1} MB)",
        records.len(),
        path.display()
    );

    Ok(path)
}

fn write_records(records: &[FinalRecord], path: &Path) -> Result<(), PipelineError> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(encoder);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(OutputRow::from(record))?;
    }

    let encoder = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
    encoder.finish()?.flush()?;
    Ok(())
}
