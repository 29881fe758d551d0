//! Intermediate layers written to the scratch directory for inspection.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use fire_map_spatial_models::{FieldValue, Layer, TableSource};
use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::Value;

use crate::ReportError;

/// Projected fire points.
pub const FIRE_POINTS: &str = "fire_pnt.geojson";

/// Boundary outlines used for the near-border search.
pub const BOUNDARY_LINES: &str = "bnd_lines.geojson";

/// Writes `layer` to `dir/name` as a GeoJSON `FeatureCollection`. Every
/// attribute, `OBJECTID` included, becomes a property. Coordinates are
/// written as-is in the layer's spatial reference.
pub fn write_layer<G>(dir: &Path, name: &str, layer: &Layer<G>) -> Result<(), ReportError>
where
    for<'g> geojson::Value: From<&'g G>,
{
    std::fs::create_dir_all(dir).map_err(|e| ReportError::from_io(dir, e))?;
    let path = dir.join(name);

    let fields = layer.fields();
    let features = layer
        .geometries()
        .iter()
        .zip(layer.rows())
        .map(|(geometry, row)| {
            let properties: JsonObject = fields
                .iter()
                .zip(row.iter())
                .map(|(field, value)| (field.name.clone(), to_json(value)))
                .collect();

            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let file = File::create(&path).map_err(|e| ReportError::from_io(&path, e))?;
    serde_json::to_writer(BufWriter::new(file), &collection)?;

    log::info!(
        "Wrote {} feature(s) ({}) to {}",
        layer.len(),
        layer.spatial_reference(),
        path.display()
    );

    Ok(())
}

fn to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(v) => Value::from(*v),
        FieldValue::Double(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        FieldValue::Text(v) => Value::String(v.clone()),
    }
}
