//! A single polygon layer held in an R-tree.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Area, BoundingRect, Contains, MultiPolygon, Point};
use geojson::{GeoJson, JsonObject, JsonValue};
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialError;
use crate::projection::Crs;
use crate::registry::LayerDefinition;

/// A named zone and the extra attributes its layer carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Value of the layer's name property.
    pub name: String,
    /// Values of the layer's extra properties, by property name. Absent
    /// or null properties are omitted.
    pub attributes: BTreeMap<String, String>,
}

impl Zone {
    /// Value of an extra attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

struct ZoneEntry {
    zone: Zone,
    area: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Polygons of one layer indexed by bounding box.
pub struct ZoneLayer {
    definition: LayerDefinition,
    tree: RTree<ZoneEntry>,
}

impl std::fmt::Debug for ZoneLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneLayer")
            .field("id", &self.definition.id)
            .field("zones", &self.tree.size())
            .finish()
    }
}

impl ZoneLayer {
    /// Reads the layer's GeoJSON file from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::MissingLayer`] if the file does not exist,
    /// or any error from [`Self::from_geojson_str`].
    pub fn load(definition: LayerDefinition, dir: &Path) -> Result<Self, SpatialError> {
        let path = dir.join(&definition.file);
        if !path.is_file() {
            return Err(SpatialError::MissingLayer { path });
        }

        let content = std::fs::read_to_string(&path)?;
        let layer = Self::from_geojson_str(definition, &content)?;
        log::info!(
            "Loaded {} zones into '{}' from {}",
            layer.len(),
            layer.definition.id,
            path.display()
        );
        Ok(layer)
    }

    /// Builds a layer from a GeoJSON `FeatureCollection`.
    ///
    /// Features without a usable name or without polygonal geometry are
    /// skipped with a warning. A `crs` member in the file overrides the
    /// CRS of `definition`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the text is not GeoJSON, is not a
    /// `FeatureCollection`, names an unsupported CRS, has coordinates that
    /// cannot be in the layer's CRS, or yields no usable polygons.
    pub fn from_geojson_str(
        mut definition: LayerDefinition,
        content: &str,
    ) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = content.parse::<GeoJson>()? else {
            return Err(SpatialError::Conversion {
                message: format!("layer '{}' is not a FeatureCollection", definition.id),
            });
        };

        if let Some(crs) = file_crs(&definition.id, collection.foreign_members.as_ref())?
            .filter(|crs| *crs != definition.crs)
        {
            log::info!(
                "{}: file declares {crs}, overriding configured {}",
                definition.id,
                definition.crs
            );
            definition.crs = crs;
        }

        let mut entries = Vec::with_capacity(collection.features.len());
        let mut skipped = 0_usize;

        for (i, feature) in collection.features.into_iter().enumerate() {
            let Some(name) = feature
                .property(&definition.name_property)
                .and_then(property_text)
            else {
                log::warn!(
                    "{}: feature {i} has no '{}', skipping",
                    definition.id,
                    definition.name_property
                );
                skipped += 1;
                continue;
            };

            let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
                log::warn!("{}: feature '{name}' is not a polygon, skipping", definition.id);
                skipped += 1;
                continue;
            };

            let attributes = definition
                .extra_properties
                .iter()
                .filter_map(|key| {
                    feature
                        .properties
                        .as_ref()
                        .and_then(|props| props.get(key))
                        .and_then(property_text)
                        .map(|value| (key.clone(), value))
                })
                .collect();

            entries.push(ZoneEntry {
                area: polygon.unsigned_area(),
                envelope: compute_envelope(&polygon),
                zone: Zone { name, attributes },
                polygon,
            });
        }

        if entries.is_empty() {
            return Err(SpatialError::EmptyLayer {
                layer: definition.id,
            });
        }
        if skipped > 0 {
            log::warn!("{}: skipped {skipped} unusable features", definition.id);
        }

        let tree = RTree::bulk_load(entries);
        let bounds = tree.root().envelope();
        if !definition.crs.admits(bounds.lower(), bounds.upper()) {
            let ([x0, y0], [x1, y1]) = (bounds.lower(), bounds.upper());
            return Err(SpatialError::Conversion {
                message: format!(
                    "layer '{}' spans ({x0}, {y0})..({x1}, {y1}), which is not {}",
                    definition.id, definition.crs
                ),
            });
        }

        Ok(Self { definition, tree })
    }

    /// The layer's configuration.
    #[must_use]
    pub const fn definition(&self) -> &LayerDefinition {
        &self.definition
    }

    /// Number of indexed zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the layer holds no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds the zone strictly containing a WGS84 point.
    ///
    /// The point is projected into the layer's CRS first. When several
    /// zones contain it, the one with the smallest area wins, then the
    /// lexicographically smallest name. Points on a boundary are contained
    /// by no interior and yield `None`.
    #[must_use]
    pub fn lookup(&self, longitude: f64, latitude: f64) -> Option<&Zone> {
        let (x, y) = self.definition.crs.project(longitude, latitude);
        let point = Point::new(x, y);
        let query_env = AABB::from_point([x, y]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .min_by(|a, b| {
                a.area
                    .total_cmp(&b.area)
                    .then_with(|| a.zone.name.cmp(&b.zone.name))
            })
            .map(|entry| &entry.zone)
    }
}

/// CRS named by a legacy GeoJSON `crs` member, if the file has one.
fn file_crs(layer: &str, members: Option<&JsonObject>) -> Result<Option<Crs>, SpatialError> {
    let Some(member) = members.and_then(|m| m.get("crs")) else {
        return Ok(None);
    };

    let name = member
        .pointer("/properties/name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| SpatialError::Conversion {
            message: format!("layer '{layer}' has a 'crs' member without a name"),
        })?;

    Crs::from_ogc_name(name)
        .map(Some)
        .ok_or_else(|| SpatialError::Conversion {
            message: format!("layer '{layer}' uses unsupported CRS '{name}'"),
        })
}

/// Reads a property as text; numbers are formatted, null and blank are
/// `None`.
fn property_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
