//! Conversion of GeoJSON features into a [`PolygonLayer`].
//!
//! Shared by the feature service and GeoJSON file loaders.

use std::collections::BTreeSet;

use fire_map_spatial_models::{
    AttributeTable, Field, FieldType, FieldValue, OBJECTID, PolygonLayer, SpatialReference,
    infer_field_type,
};
use geo::{Geometry, MultiPolygon};
use geojson::Feature;
use serde_json::Value;

use crate::SourceError;

/// Builds a polygon layer from `features`.
///
/// Polygon and `MultiPolygon` features are kept. Features with any other
/// geometry (or none) are skipped and counted in a warning. Every property
/// seen on a kept feature becomes a column; columns holding only numbers are
/// typed as integer or double, anything else is text. An `OBJECTID`
/// property is dropped in favour of the layer's own.
///
/// # Errors
///
/// Returns [`SourceError::GeoJson`] if a geometry is malformed, or
/// [`SourceError::Conversion`] if no polygon features remain.
pub fn polygons_from_features(
    features: &[Feature],
    reference: SpatialReference,
    label: &str,
) -> Result<PolygonLayer, SourceError> {
    let mut geometries = Vec::with_capacity(features.len());
    let mut kept = Vec::with_capacity(features.len());
    let mut skipped = 0_usize;

    for feature in features {
        let Some(geometry) = &feature.geometry else {
            skipped += 1;
            continue;
        };

        let geometry: Geometry<f64> = geometry.try_into()?;
        match geometry {
            Geometry::Polygon(polygon) => geometries.push(MultiPolygon(vec![polygon])),
            Geometry::MultiPolygon(multi_polygon) => geometries.push(multi_polygon),
            _ => {
                skipped += 1;
                continue;
            }
        }
        kept.push(feature);
    }

    if skipped > 0 {
        log::warn!("{label}: skipped {skipped} feature(s) without polygon geometry");
    }
    if geometries.is_empty() {
        return Err(SourceError::Conversion {
            message: format!("{label}: no polygon features"),
        });
    }

    let names: BTreeSet<&str> = kept
        .iter()
        .filter_map(|feature| feature.properties.as_ref())
        .flat_map(|properties| properties.keys().map(String::as_str))
        .filter(|name| *name != OBJECTID)
        .collect();

    let columns: Vec<(&str, FieldType)> = names
        .into_iter()
        .map(|name| {
            let values = kept.iter().map(|feature| feature.property(name));
            (name, column_type(values))
        })
        .collect();

    let mut table = AttributeTable::new(
        columns
            .iter()
            .map(|(name, field_type)| Field::new(*name, *field_type))
            .collect(),
    )?;
    for feature in &kept {
        table.push_row(
            columns
                .iter()
                .map(|(name, field_type)| to_field_value(feature.property(name), *field_type))
                .collect(),
        )?;
    }

    log::info!(
        "{label}: loaded {} polygon feature(s) in {reference}",
        geometries.len()
    );

    Ok(PolygonLayer::new(reference, geometries, &table)?)
}

fn column_type<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> FieldType {
    let mut numbers = Vec::new();
    for value in values.flatten() {
        match value {
            Value::Null => {}
            Value::Number(number) => numbers.push(number.to_string()),
            _ => return FieldType::Text,
        }
    }
    infer_field_type(numbers.iter().map(String::as_str))
}

fn to_field_value(value: Option<&Value>, field_type: FieldType) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Null,
        Some(Value::String(text)) => FieldValue::parse(text, field_type),
        Some(Value::Number(number)) => FieldValue::parse(&number.to_string(), field_type),
        Some(other) => FieldValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use fire_map_spatial_models::TableSource;

    use super::*;

    fn collection(json: &str) -> Vec<Feature> {
        let collection: geojson::FeatureCollection = serde_json::from_str(json).unwrap();
        collection.features
    }

    const COUNTRIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"OBJECTID": 17, "COUNTRY": "Aland", "ISO_CC": "001", "AREA": 12.5},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"OBJECTID": 18, "COUNTRY": "Borduria", "ISO_CC": "002", "AREA": 7},
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[10,0],[20,0],[20,10],[10,10],[10,0]]],
                    [[[30,0],[31,0],[31,1],[30,1],[30,0]]]
                ]}
            },
            {
                "type": "Feature",
                "properties": {"COUNTRY": "Capital"},
                "geometry": {"type": "Point", "coordinates": [5, 5]}
            }
        ]
    }"#;

    #[test]
    fn keeps_polygons_and_types_properties() {
        let layer = polygons_from_features(
            &collection(COUNTRIES),
            SpatialReference::WGS84,
            "countries",
        )
        .unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.geometries()[1].0.len(), 2);
        assert_eq!(
            layer.user_field_names(),
            vec!["AREA".to_string(), "COUNTRY".to_string(), "ISO_CC".to_string()]
        );

        let attrs = layer.attributes();
        assert_eq!(attrs.value(0, OBJECTID), Some(&FieldValue::Integer(1)));
        assert_eq!(attrs.value(1, "COUNTRY"), Some(&FieldValue::Text("Borduria".into())));
        assert_eq!(attrs.value(0, "ISO_CC"), Some(&FieldValue::Text("001".into())));
        assert_eq!(attrs.value(1, "AREA"), Some(&FieldValue::Double(7.0)));
    }

    #[test]
    fn fails_without_polygons() {
        let features = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": null}
            ]}"#,
        );

        let result = polygons_from_features(&features, SpatialReference::WGS84, "empty");
        assert!(matches!(result, Err(SourceError::Conversion { .. })));
    }
}
