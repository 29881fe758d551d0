//! [`SpatialEngine`] backed by `geo` predicates and `rstar` indexes.

use fire_map_spatial_models::{
    AttributeTable, Field, FieldType, FieldValue, Layer, LineLayer, ORIG_FID, PointLayer,
    PolygonLayer, Selection, SpatialReference, TableSource,
};
use geo::{LineString, MapCoords};

use crate::index::{PolygonIndex, SegmentIndex};
use crate::near::NearTable;
use crate::projection::Transformer;
use crate::statistics::{self, Accumulator, StatisticField};
use crate::{
    LocationQuery, POINT_COUNT, SelectionType, SpatialEngine, SpatialError, distance_in_units,
    ensure_same_reference,
};

/// In-process planar geoprocessing.
///
/// All distances are Cartesian in the layer's own units, so distance-based
/// operations require a projected spatial reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarEngine;

impl PlanarEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SpatialEngine for PlanarEngine {
    fn reproject(
        &self,
        points: &PointLayer,
        target: SpatialReference,
    ) -> Result<PointLayer, SpatialError> {
        reproject_layer(points, target)
    }

    fn reproject_polygons(
        &self,
        polygons: &PolygonLayer,
        target: SpatialReference,
    ) -> Result<PolygonLayer, SpatialError> {
        reproject_layer(polygons, target)
    }

    fn select_by_location(
        &self,
        query: LocationQuery<'_>,
        selection_type: SelectionType,
    ) -> Result<Selection, SpatialError> {
        let selection = match query {
            LocationQuery::PointsWithin { points, polygons } => {
                ensure_same_reference(points.spatial_reference(), polygons.spatial_reference())?;
                let index = PolygonIndex::build(polygons.geometries());
                let rows = points
                    .geometries()
                    .iter()
                    .enumerate()
                    .filter(|(_, point)| index.any_contains(point))
                    .map(|(row, _)| row)
                    .collect();
                Selection::new(rows, points.len())
            }
            LocationQuery::PolygonsContaining { polygons, points } => {
                ensure_same_reference(polygons.spatial_reference(), points.spatial_reference())?;
                let index = PolygonIndex::build(polygons.geometries());
                let rows = points
                    .geometries()
                    .iter()
                    .flat_map(|point| index.containing(point).collect::<Vec<_>>())
                    .collect();
                Selection::new(rows, polygons.len())
            }
            LocationQuery::PointsWithinDistance {
                points,
                lines,
                distance,
            } => {
                ensure_same_reference(points.spatial_reference(), lines.spatial_reference())?;
                let radius = distance_in_units(distance, points.spatial_reference())?;
                let index = SegmentIndex::build(lines.geometries());
                let rows = points
                    .geometries()
                    .iter()
                    .enumerate()
                    .filter(|(_, point)| index.within_distance(point, radius))
                    .map(|(row, _)| row)
                    .collect();
                Selection::new(rows, points.len())
            }
        };

        Ok(match selection_type {
            SelectionType::New => selection,
            SelectionType::Invert => selection.invert(),
        })
    }

    fn summarize_within(
        &self,
        polygons: &PolygonLayer,
        points: &PointLayer,
        sum_fields: &[StatisticField],
    ) -> Result<PolygonLayer, SpatialError> {
        ensure_same_reference(polygons.spatial_reference(), points.spatial_reference())?;
        let inputs = statistics::resolve_inputs(points, sum_fields)?;

        let mut counts = vec![0_i64; polygons.len()];
        let mut accumulators = vec![vec![Accumulator::default(); sum_fields.len()]; polygons.len()];

        let index = PolygonIndex::build(polygons.geometries());
        for (point, row) in points.geometries().iter().zip(points.rows()) {
            for polygon in index.containing(point) {
                counts[polygon] += 1;
                statistics::accumulate(&mut accumulators[polygon], &inputs, sum_fields, &row)?;
            }
        }

        let mut fields = polygons.attributes().fields().to_vec();
        fields.push(Field::new(POINT_COUNT, FieldType::Integer));
        for (stat, (_, output_type)) in sum_fields.iter().zip(&inputs) {
            fields.push(Field::new(stat.summary_name(), *output_type));
        }
        let mut table = AttributeTable::new(fields)?;

        for ((row, count), group) in polygons
            .attributes()
            .row_slice()
            .iter()
            .zip(counts)
            .zip(&accumulators)
        {
            let mut values = row.clone();
            values.push(FieldValue::Integer(count));
            for (acc, (stat, (_, output_type))) in group.iter().zip(sum_fields.iter().zip(&inputs))
            {
                values.push(acc.finish(stat.statistic, *output_type));
            }
            table.push_row(values)?;
        }

        log::debug!(
            "Summarized {} points within {} polygons",
            points.len(),
            polygons.len()
        );

        let mut summary =
            polygons.with_geometries(polygons.spatial_reference(), polygons.geometries().to_vec())?;
        *summary.attributes_mut() = table;
        Ok(summary)
    }

    fn compute_statistics(
        &self,
        table: &dyn TableSource,
        statistics: &[StatisticField],
        case_field: Option<&str>,
    ) -> Result<AttributeTable, SpatialError> {
        statistics::compute_statistics(table, statistics, case_field)
    }

    fn generate_near_table<'a>(
        &self,
        points: &'a PointLayer,
    ) -> Result<NearTable<'a>, SpatialError> {
        let reference = points.spatial_reference();
        if reference.meters_per_unit().is_none() {
            return Err(SpatialError::GeographicDistance(reference));
        }
        Ok(NearTable::new(points))
    }

    fn polygon_to_line(&self, polygons: &PolygonLayer) -> Result<LineLayer, SpatialError> {
        let mut lines: Vec<LineString<f64>> = Vec::new();
        let mut attributes =
            AttributeTable::new(vec![Field::new(ORIG_FID, FieldType::Integer)])?;

        for (row, multi_polygon) in polygons.geometries().iter().enumerate() {
            let orig_fid = polygons
                .object_id(row)
                .map_or(FieldValue::Null, FieldValue::Integer);

            for polygon in multi_polygon {
                for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                    if ring.0.len() < 2 {
                        continue;
                    }
                    lines.push(ring.clone());
                    attributes.push_row(vec![orig_fid.clone()])?;
                }
            }
        }

        Ok(LineLayer::new(
            polygons.spatial_reference(),
            lines,
            &attributes,
        )?)
    }
}

/// Maps every vertex of `layer` into `target`.
fn reproject_layer<G>(
    layer: &Layer<G>,
    target: SpatialReference,
) -> Result<Layer<G>, SpatialError>
where
    G: Clone + MapCoords<f64, f64, Output = G>,
{
    let source = layer.spatial_reference();
    if source.is_equivalent(target) {
        return Ok(layer.with_geometries(target, layer.geometries().to_vec())?);
    }

    log::debug!(
        "Projecting {} features from {source} to {target}",
        layer.len()
    );
    let transformer = Transformer::new(source, target)?;
    let projected = layer
        .geometries()
        .iter()
        .map(|geometry| geometry.try_map_coords(|coord| transformer.apply(coord)))
        .collect::<Result<Vec<G>, SpatialError>>()?;

    Ok(layer.with_geometries(target, projected)?)
}

#[cfg(test)]
mod tests {
    use fire_map_spatial_models::{LinearDistance, LinearUnit, OBJECTID};
    use geo::{MultiPolygon, Point, polygon};

    use super::*;
    use crate::statistics::Statistic;

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]])
    }

    fn countries(reference: SpatialReference) -> PolygonLayer {
        let mut attributes =
            AttributeTable::new(vec![Field::new("COUNTRY", FieldType::Text)]).unwrap();
        attributes.push_row(vec!["A".into()]).unwrap();
        attributes.push_row(vec!["B".into()]).unwrap();
        attributes.push_row(vec!["C".into()]).unwrap();
        PolygonLayer::new(
            reference,
            vec![
                square(0.0, 0.0, 10.0),
                square(10.0, 0.0, 10.0),
                square(100.0, 100.0, 10.0),
            ],
            &attributes,
        )
        .unwrap()
    }

    fn fires(reference: SpatialReference, rows: &[(f64, f64, i64)]) -> PointLayer {
        let mut attributes =
            AttributeTable::new(vec![Field::new("confidence", FieldType::Integer)]).unwrap();
        for (_, _, conf) in rows {
            attributes.push_row(vec![FieldValue::Integer(*conf)]).unwrap();
        }
        PointLayer::new(
            reference,
            rows.iter().map(|&(x, y, _)| Point::new(x, y)).collect(),
            &attributes,
        )
        .unwrap()
    }

    #[test]
    fn selects_points_within_and_outside() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WGS84);
        let points = fires(
            SpatialReference::WGS84,
            &[(2.0, 2.0, 70), (50.0, 50.0, 40), (15.0, 5.0, 60)],
        );

        let within = engine
            .select_by_location(
                LocationQuery::PointsWithin {
                    points: &points,
                    polygons: &polygons,
                },
                SelectionType::New,
            )
            .unwrap();
        let outside = engine
            .select_by_location(
                LocationQuery::PointsWithin {
                    points: &points,
                    polygons: &polygons,
                },
                SelectionType::Invert,
            )
            .unwrap();

        assert_eq!(within.indices(), &[0, 2]);
        assert_eq!(outside.indices(), &[1]);
    }

    #[test]
    fn selects_polygons_containing_points() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WGS84);
        let points = fires(SpatialReference::WGS84, &[(2.0, 2.0, 70), (3.0, 3.0, 90)]);

        let selection = engine
            .select_by_location(
                LocationQuery::PolygonsContaining {
                    polygons: &polygons,
                    points: &points,
                },
                SelectionType::New,
            )
            .unwrap();

        assert_eq!(selection.indices(), &[0]);
    }

    #[test]
    fn rejects_mismatched_references() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WEB_MERCATOR);
        let points = fires(SpatialReference::WGS84, &[(2.0, 2.0, 70)]);

        let result = engine.select_by_location(
            LocationQuery::PointsWithin {
                points: &points,
                polygons: &polygons,
            },
            SelectionType::New,
        );
        assert!(matches!(result, Err(SpatialError::ReferenceMismatch { .. })));
    }

    #[test]
    fn summarizes_count_and_max_per_polygon() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WGS84);
        let points = fires(
            SpatialReference::WGS84,
            &[(2.0, 2.0, 70), (3.0, 3.0, 90), (15.0, 5.0, 60)],
        );

        let summary = engine
            .summarize_within(
                &polygons,
                &points,
                &[StatisticField::new("confidence", Statistic::Max)],
            )
            .unwrap();

        let attrs = summary.attributes();
        assert_eq!(attrs.value(0, OBJECTID), Some(&FieldValue::Integer(1)));
        assert_eq!(attrs.value(0, POINT_COUNT), Some(&FieldValue::Integer(2)));
        assert_eq!(attrs.value(0, "max_confidence"), Some(&FieldValue::Integer(90)));
        assert_eq!(attrs.value(1, POINT_COUNT), Some(&FieldValue::Integer(1)));
        assert_eq!(attrs.value(1, "max_confidence"), Some(&FieldValue::Integer(60)));
        assert_eq!(attrs.value(2, POINT_COUNT), Some(&FieldValue::Integer(0)));
        assert_eq!(attrs.value(2, "max_confidence"), Some(&FieldValue::Null));
        assert_eq!(attrs.value(2, "COUNTRY"), Some(&FieldValue::Text("C".into())));
    }

    #[test]
    fn points_on_a_shared_border_count_for_both_polygons() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WGS84);
        let points = fires(SpatialReference::WGS84, &[(10.0, 5.0, 80), (0.0, 3.0, 40)]);

        let outside = engine
            .select_by_location(
                LocationQuery::PointsWithin {
                    points: &points,
                    polygons: &polygons,
                },
                SelectionType::Invert,
            )
            .unwrap();
        let summary = engine
            .summarize_within(
                &polygons,
                &points,
                &[StatisticField::new("confidence", Statistic::Max)],
            )
            .unwrap();

        assert!(outside.is_empty());
        let attrs = summary.attributes();
        assert_eq!(attrs.value(0, POINT_COUNT), Some(&FieldValue::Integer(2)));
        assert_eq!(attrs.value(0, "max_confidence"), Some(&FieldValue::Integer(80)));
        assert_eq!(attrs.value(1, POINT_COUNT), Some(&FieldValue::Integer(1)));
        assert_eq!(attrs.value(1, "max_confidence"), Some(&FieldValue::Integer(80)));
    }

    #[test]
    fn converts_polygon_rings_to_lines() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WEB_MERCATOR);

        let lines = engine.polygon_to_line(&polygons).unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines.attributes().value(1, ORIG_FID), Some(&FieldValue::Integer(2)));
        assert_eq!(lines.geometries()[0].0.len(), 5);
    }

    #[test]
    fn selects_points_near_lines_inclusively() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WEB_MERCATOR);
        let lines = engine.polygon_to_line(&polygons).unwrap();
        // 2 m from the shared edge, exactly 5 m from the outer edge, and far
        // from everything.
        let points = fires(
            SpatialReference::WEB_MERCATOR,
            &[(8.0, 5.0, 1), (5.0, 5.0, 2), (55.0, 55.0, 3)],
        );

        let selection = engine
            .select_by_location(
                LocationQuery::PointsWithinDistance {
                    points: &points,
                    lines: &lines,
                    distance: LinearDistance::new(5.0, LinearUnit::Meters),
                },
                SelectionType::New,
            )
            .unwrap();

        assert_eq!(selection.indices(), &[0, 1]);
    }

    #[test]
    fn distance_queries_require_projected_data() {
        let engine = PlanarEngine::new();
        let points = fires(SpatialReference::WGS84, &[(0.0, 0.0, 1), (1.0, 1.0, 2)]);

        assert!(matches!(
            engine.generate_near_table(&points),
            Err(SpatialError::GeographicDistance(_))
        ));
    }

    #[test]
    fn reproject_to_same_reference_is_identity() {
        let engine = PlanarEngine::new();
        let points = fires(SpatialReference::WEB_MERCATOR, &[(1.5, -2.5, 1)]);

        let projected = engine
            .reproject(&points, SpatialReference::from_wkid(102_100))
            .unwrap();

        assert_eq!(projected.geometries(), points.geometries());
        assert_eq!(projected.spatial_reference().wkid(), 102_100);
    }

    #[test]
    fn reprojects_into_web_mercator() {
        let engine = PlanarEngine::new();
        let points = fires(SpatialReference::WGS84, &[(0.0, 0.0, 1), (180.0, 0.0, 2)]);

        let projected = engine
            .reproject(&points, SpatialReference::WEB_MERCATOR)
            .unwrap();

        assert_eq!(projected.len(), 2);
        assert!(projected.geometries()[0].x().abs() < 1e-6);
        assert!((projected.geometries()[1].x() - 20_037_508.342_789_244).abs() < 1e-3);
        assert_eq!(projected.attributes(), points.attributes());
    }

    #[test]
    fn reprojects_polygons_with_their_attributes() {
        let engine = PlanarEngine::new();
        let polygons = countries(SpatialReference::WGS84);

        let projected = engine
            .reproject_polygons(&polygons, SpatialReference::WEB_MERCATOR)
            .unwrap();

        assert_eq!(projected.spatial_reference(), SpatialReference::WEB_MERCATOR);
        assert_eq!(projected.attributes(), polygons.attributes());
        let extent = geo::BoundingRect::bounding_rect(&projected.geometries()[0]).unwrap();
        assert!(extent.min().x.abs() < 1e-6);
        assert!((extent.max().x - 1_113_194.907_932_735_7).abs() < 1e-3);
    }
}
