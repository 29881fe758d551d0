//! Boundary polygons from a local GeoJSON file.

use std::path::Path;

use fire_map_spatial_models::{PolygonLayer, SpatialReference};
use geojson::GeoJson;

use crate::SourceError;
use crate::features::polygons_from_features;

/// Reads a GeoJSON `FeatureCollection` whose coordinates are in
/// `reference`.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read, is not a feature
/// collection, or holds no polygons.
pub fn read_polygons(path: &Path, reference: SpatialReference) -> Result<PolygonLayer, SourceError> {
    log::info!("Reading boundaries from {}", path.display());

    let text = std::fs::read_to_string(path)?;
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => geojson::FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(SourceError::Conversion {
                message: format!("{} holds a bare geometry, not features", path.display()),
            });
        }
    };

    polygons_from_features(
        &collection.features,
        reference,
        &path.display().to_string(),
    )
}
