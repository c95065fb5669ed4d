#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for zone attribution.
//!
//! Loads the subzone, electoral division, and town council polygon layers
//! from GeoJSON at startup, builds one R-tree per layer, and answers
//! point-in-polygon lookups for geocoded addresses.

pub mod enrich;
pub mod layer;
pub mod projection;
pub mod registry;

use std::path::{Path, PathBuf};

use layer::{Zone, ZoneLayer};
use registry::{LayerDefinition, ZoneKind};

/// Errors that can occur while loading polygon layers.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// I/O error reading a layer file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The layer file is not valid GeoJSON.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The GeoJSON is valid but not usable as a zone layer.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// A configured layer file does not exist.
    #[error("Layer file not found: {}", path.display())]
    MissingLayer {
        /// Expected location of the file.
        path: PathBuf,
    },

    /// A layer yielded no usable polygons.
    #[error("Layer '{layer}' contains no usable polygons")]
    EmptyLayer {
        /// Identifier of the layer.
        layer: String,
    },
}

/// Pre-built zone layers.
///
/// Constructed once after geocoding completes and shared read-only by the
/// enrichment step.
#[derive(Debug)]
pub struct SpatialIndex {
    layers: Vec<ZoneLayer>,
}

impl SpatialIndex {
    /// Loads every layer in `definitions` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpatialError`] encountered. A missing or
    /// unreadable layer aborts the load.
    pub fn load(dir: &Path, definitions: Vec<LayerDefinition>) -> Result<Self, SpatialError> {
        let layers = definitions
            .into_iter()
            .map(|definition| ZoneLayer::load(definition, dir))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_layers(layers))
    }

    /// Wraps already-built layers.
    #[must_use]
    pub const fn from_layers(layers: Vec<ZoneLayer>) -> Self {
        Self { layers }
    }

    /// All layers, in load order.
    #[must_use]
    pub fn layers(&self) -> &[ZoneLayer] {
        &self.layers
    }

    /// Looks up the zone of `kind` containing a WGS84 point.
    #[must_use]
    pub fn lookup(&self, kind: ZoneKind, longitude: f64, latitude: f64) -> Option<&Zone> {
        self.layers
            .iter()
            .find(|l| l.definition().kind == kind)
            .and_then(|l| l.lookup(longitude, latitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::tests::{collection, definition, square};

    #[test]
    fn loads_layers_from_directory() {
        let dir = std::env::temp_dir().join("hdb_resale_spatial_index_test");
        std::fs::create_dir_all(&dir).unwrap();

        let def = definition(ZoneKind::TownCouncil, "TOWN_COUNC", &[]);
        std::fs::write(
            dir.join(&def.file),
            collection(&[square(r#"{"TOWN_COUNC":"TAMPINES"}"#, (0.0, 0.0), (1.0, 1.0))]),
        )
        .unwrap();

        let index = SpatialIndex::load(&dir, vec![def.clone()]).unwrap();
        assert_eq!(index.layers().len(), 1);
        assert_eq!(
            index
                .lookup(ZoneKind::TownCouncil, 0.5, 0.5)
                .map(|z| z.name.as_str()),
            Some("TAMPINES")
        );
        assert!(index.lookup(ZoneKind::Subzone, 0.5, 0.5).is_none());

        std::fs::remove_file(dir.join(&def.file)).ok();
    }

    #[test]
    fn missing_layer_aborts_load() {
        let dir = std::env::temp_dir().join("hdb_resale_spatial_missing_test");
        let err = SpatialIndex::load(&dir, registry::all_layers()).unwrap_err();
        assert!(matches!(err, SpatialError::MissingLayer { .. }));
    }
}
