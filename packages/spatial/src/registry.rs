//! Layer registry. Loads every polygon layer definition from embedded
//! TOML configs.
//!
//! Each `.toml` file in `packages/spatial/layers/` is baked into the
//! binary at compile time via [`include_str!`]. The GeoJSON files they
//! point at are read at runtime from the layers directory.

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::projection::Crs;

/// The kind of zone a layer assigns.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneKind {
    /// URA planning subzone
    Subzone,
    /// Parliamentary electoral division
    ElectoralDivision,
    /// Town council boundary
    TownCouncil,
}

/// Configuration for one polygon layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerDefinition {
    /// Unique identifier (e.g., `"subzone"`).
    pub id: String,
    /// Zone kind this layer assigns.
    pub kind: ZoneKind,
    /// Human-readable name.
    pub name: String,
    /// GeoJSON file name, relative to the layers directory.
    pub file: String,
    /// Coordinate system of the file.
    pub crs: Crs,
    /// Feature property holding the zone name.
    pub name_property: String,
    /// Further feature properties carried into the output.
    #[serde(default)]
    pub extra_properties: Vec<String>,
}

const LAYER_TOMLS: &[(&str, &str)] = &[
    ("subzone", include_str!("../layers/subzone.toml")),
    (
        "electoral_division",
        include_str!("../layers/electoral_division.toml"),
    ),
    ("town_council", include_str!("../layers/town_council.toml")),
];

/// Returns all configured layer definitions.
///
/// # Panics
///
/// Panics if any embedded TOML config is malformed.
#[must_use]
pub fn all_layers() -> Vec<LayerDefinition> {
    LAYER_TOMLS
        .iter()
        .map(|(name, toml)| {
            toml::de::from_str(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}
