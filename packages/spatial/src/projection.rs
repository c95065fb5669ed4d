//! Coordinate reference systems and point reprojection.
//!
//! Geocoded points arrive as WGS84 longitude/latitude. Singapore's
//! boundary datasets are usually published in SVY21 (EPSG:3414), a
//! transverse Mercator grid in metres. Points are always projected into
//! the layer's system; polygons are never reprojected.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Coordinate system a polygon layer is expressed in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Crs {
    /// Longitude/latitude degrees.
    #[serde(rename = "EPSG:4326")]
    #[strum(serialize = "EPSG:4326")]
    Wgs84,
    /// SVY21 / Singapore TM, easting/northing in metres.
    #[serde(rename = "EPSG:3414")]
    #[strum(serialize = "EPSG:3414")]
    Svy21,
}

impl Crs {
    /// Projects a WGS84 point into this system, returning `(x, y)`.
    #[must_use]
    pub fn project(self, longitude: f64, latitude: f64) -> (f64, f64) {
        match self {
            Self::Wgs84 => (longitude, latitude),
            Self::Svy21 => svy21_forward(longitude, latitude),
        }
    }

    /// Recognises the names GeoJSON files carry in their legacy `crs`
    /// member, e.g. `urn:ogc:def:crs:EPSG::3414` or
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`.
    #[must_use]
    pub fn from_ogc_name(name: &str) -> Option<Self> {
        match name.trim().rsplit(':').next()? {
            "CRS84" | "4326" => Some(Self::Wgs84),
            "3414" => Some(Self::Svy21),
            _ => None,
        }
    }

    /// Whether a bounding box `[min, max]` can be coordinates in this
    /// system. SVY21 grids are metres in the tens of thousands, so a box
    /// that fits inside the degree range cannot be SVY21.
    #[must_use]
    pub fn admits(self, min: [f64; 2], max: [f64; 2]) -> bool {
        let in_degrees =
            min[0] >= -180.0 && max[0] <= 180.0 && min[1] >= -90.0 && max[1] <= 90.0;
        match self {
            Self::Wgs84 => in_degrees,
            Self::Svy21 => !in_degrees,
        }
    }
}

// SVY21 grid parameters (WGS84 ellipsoid).
const SEMI_MAJOR: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const ORIGIN_LAT: f64 = 1.366_666;
const ORIGIN_LON: f64 = 103.833_333;
const FALSE_NORTHING: f64 = 38_744.572;
const FALSE_EASTING: f64 = 28_001.642;
const SCALE: f64 = 1.0;

/// Meridian arc length from the equator to `lat_rad`.
fn meridian_distance(lat_rad: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let a0 = 1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0;
    let a2 = 3.0 / 8.0 * (e2 + e4 / 4.0 + 15.0 * e6 / 128.0);
    let a4 = 15.0 / 256.0 * (e4 + 3.0 * e6 / 4.0);
    let a6 = 35.0 * e6 / 3072.0;

    SEMI_MAJOR
        * (a0 * lat_rad - a2 * (2.0 * lat_rad).sin() + a4 * (4.0 * lat_rad).sin()
            - a6 * (6.0 * lat_rad).sin())
}

/// Forward transverse Mercator projection onto the SVY21 grid.
#[allow(clippy::many_single_char_names, clippy::suboptimal_flops)]
fn svy21_forward(longitude: f64, latitude: f64) -> (f64, f64) {
    let e2 = 2.0 * FLATTENING - FLATTENING * FLATTENING;

    let lat = latitude.to_radians();
    let sin_lat = lat.sin();
    let sin2_lat = sin_lat * sin_lat;
    let cos_lat = lat.cos();

    let rho = SEMI_MAJOR * (1.0 - e2) / (1.0 - e2 * sin2_lat).powf(1.5);
    let v = SEMI_MAJOR / (1.0 - e2 * sin2_lat).sqrt();
    let psi = v / rho;
    let t = lat.tan();
    let w = (longitude - ORIGIN_LON).to_radians();

    let m = meridian_distance(lat, e2);
    let m0 = meridian_distance(ORIGIN_LAT.to_radians(), e2);

    let (psi2, psi3, psi4) = (psi.powi(2), psi.powi(3), psi.powi(4));
    let (t2, t4, t6) = (t.powi(2), t.powi(4), t.powi(6));
    let (w2, w4, w6, w8) = (w.powi(2), w.powi(4), w.powi(6), w.powi(8));

    let n1 = w2 / 2.0 * v * sin_lat * cos_lat;
    let n2 = w4 / 24.0 * v * sin_lat * cos_lat.powi(3) * (4.0 * psi2 + psi - t2);
    let n3 = w6 / 720.0
        * v
        * sin_lat
        * cos_lat.powi(5)
        * (8.0 * psi4 * (11.0 - 24.0 * t2) - 28.0 * psi3 * (1.0 - 6.0 * t2)
            + psi2 * (1.0 - 32.0 * t2)
            - psi * 2.0 * t2
            + t4);
    let n4 = w8 / 40320.0
        * v
        * sin_lat
        * cos_lat.powi(7)
        * (1385.0 - 3111.0 * t2 + 543.0 * t4 - t6);
    let northing = FALSE_NORTHING + SCALE * (m - m0 + n1 + n2 + n3 + n4);

    let e1 = w2 / 6.0 * cos_lat.powi(2) * (psi - t2);
    let e2_term = w4 / 120.0
        * cos_lat.powi(4)
        * (4.0 * psi3 * (1.0 - 6.0 * t2) + psi2 * (1.0 + 8.0 * t2) - psi * 2.0 * t2 + t4);
    let e3 = w6 / 5040.0 * cos_lat.powi(6) * (61.0 - 479.0 * t2 + 179.0 * t4 - t6);
    let easting = FALSE_EASTING + SCALE * v * w * cos_lat * (1.0 + e1 + e2_term + e3);

    (easting, northing)
}
