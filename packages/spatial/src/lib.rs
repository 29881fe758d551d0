#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geoprocessing capability for fire/boundary analysis.
//!
//! The report pipeline only ever talks to the [`SpatialEngine`] trait, so
//! the engine behind it can be swapped or mocked. [`PlanarEngine`] is the
//! bundled implementation: R-tree indexed point-in-polygon and
//! point-to-line lookups over `geo` geometries, `proj4rs` reprojection, and
//! planar (Cartesian) distances in the layer's own units.

mod index;
pub mod near;
pub mod planar;
mod projection;
pub mod statistics;

use fire_map_spatial_models::{
    AttributeTable, LineLayer, LinearDistance, PointLayer, PolygonLayer, Selection,
    SpatialReference, TableError, TableSource,
};
use geo::{BoundingRect, MultiPoint};

pub use near::NearTable;
pub use planar::PlanarEngine;
pub use statistics::{Statistic, StatisticField};

/// Name of the per-polygon point count produced by
/// [`SpatialEngine::summarize_within`].
pub const POINT_COUNT: &str = "Point_Count";

/// Errors that can occur during geoprocessing.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// No transform is known for this spatial reference.
    #[error("Unsupported spatial reference: {0}")]
    UnsupportedReference(SpatialReference),

    /// Coordinate transformation failed.
    #[error("Projection error: {message}")]
    Projection {
        /// Description of what went wrong.
        message: String,
    },

    /// Two layers that must share a spatial reference do not.
    #[error("Spatial reference mismatch: {left} vs {right}")]
    ReferenceMismatch {
        /// Reference of the first layer.
        left: SpatialReference,
        /// Reference of the second layer.
        right: SpatialReference,
    },

    /// Planar distances were requested in angular units.
    #[error("Planar distances are undefined in geographic reference {0}; project the data first")]
    GeographicDistance(SpatialReference),

    /// A statistic was requested over a non-numeric field.
    #[error("Field {field} is not numeric")]
    NonNumericField {
        /// The offending field.
        field: String,
    },

    /// Attribute table operation failed.
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

/// Spatial relationship evaluated by [`SpatialEngine::select_by_location`].
///
/// The first layer named in each variant is the one rows are selected from.
#[derive(Debug, Clone, Copy)]
pub enum LocationQuery<'a> {
    /// Points inside or on the boundary of at least one polygon.
    PointsWithin {
        /// Layer to select from.
        points: &'a PointLayer,
        /// Containing polygons.
        polygons: &'a PolygonLayer,
    },
    /// Polygons that cover at least one point, counting points on their
    /// boundary.
    PolygonsContaining {
        /// Layer to select from.
        polygons: &'a PolygonLayer,
        /// Points to test.
        points: &'a PointLayer,
    },
    /// Points whose distance to the nearest line is at most `distance`.
    PointsWithinDistance {
        /// Layer to select from.
        points: &'a PointLayer,
        /// Lines to measure against.
        lines: &'a LineLayer,
        /// Inclusive search radius.
        distance: LinearDistance,
    },
}

/// How the result of a location query becomes a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    /// Select the rows matching the relationship.
    New,
    /// Select the rows that do not match.
    Invert,
}

/// The geoprocessing operations the fire report pipeline needs.
pub trait SpatialEngine {
    /// Projects a point layer into `target`, keeping attributes and object
    /// IDs.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if either reference is unsupported or a
    /// coordinate cannot be transformed.
    fn reproject(
        &self,
        points: &PointLayer,
        target: SpatialReference,
    ) -> Result<PointLayer, SpatialError>;

    /// Projects a polygon layer into `target`, keeping attributes and
    /// object IDs.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if either reference is unsupported or a
    /// coordinate cannot be transformed.
    fn reproject_polygons(
        &self,
        polygons: &PolygonLayer,
        target: SpatialReference,
    ) -> Result<PolygonLayer, SpatialError>;

    /// Selects rows by their spatial relationship to another layer.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the layers' references differ or a
    /// distance query runs in a geographic reference.
    fn select_by_location(
        &self,
        query: LocationQuery<'_>,
        selection_type: SelectionType,
    ) -> Result<Selection, SpatialError>;

    /// For every polygon, counts the contained points (as
    /// [`POINT_COUNT`]) and computes each `sum_fields` statistic over them
    /// (as `<stat>_<field>`, lower-case prefix).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the references differ or a statistic
    /// field is missing or non-numeric.
    fn summarize_within(
        &self,
        polygons: &PolygonLayer,
        points: &PointLayer,
        sum_fields: &[StatisticField],
    ) -> Result<PolygonLayer, SpatialError>;

    /// Computes statistics over `table`, optionally grouped by
    /// `case_field`. Output fields are the case field (if any),
    /// `FREQUENCY`, and `<STAT>_<field>` per statistic. Groups are sorted
    /// by case value.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if a field is missing or non-numeric.
    fn compute_statistics(
        &self,
        table: &dyn TableSource,
        statistics: &[StatisticField],
        case_field: Option<&str>,
    ) -> Result<AttributeTable, SpatialError>;

    /// Builds the table of planar distances between every pair of distinct
    /// points (`IN_FID`, `NEAR_FID`, `NEAR_DIST`, `NEAR_RANK`).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeographicDistance`] for unprojected layers.
    fn generate_near_table<'a>(&self, points: &'a PointLayer)
    -> Result<NearTable<'a>, SpatialError>;

    /// Converts every polygon ring into a line, tagged with the source
    /// polygon's object ID in `ORIG_FID`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Table`] if the line attributes cannot be
    /// built.
    fn polygon_to_line(&self, polygons: &PolygonLayer) -> Result<LineLayer, SpatialError>;
}

/// Fails unless both references describe the same system.
///
/// # Errors
///
/// Returns [`SpatialError::ReferenceMismatch`] when they differ.
pub fn ensure_same_reference(
    left: SpatialReference,
    right: SpatialReference,
) -> Result<(), SpatialError> {
    if left.is_equivalent(right) {
        Ok(())
    } else {
        Err(SpatialError::ReferenceMismatch { left, right })
    }
}

/// A reference in which planar distances between `points` and their
/// surroundings are meaningful.
///
/// Projected layers keep their own reference. Geographic layers get the
/// WGS84 UTM zone at the centre of their extent, or Web Mercator when the
/// layer is empty.
#[must_use]
pub fn distance_reference(points: &PointLayer) -> SpatialReference {
    let reference = points.spatial_reference();
    if !reference.is_geographic() {
        return reference;
    }

    MultiPoint::from(points.geometries().to_vec())
        .bounding_rect()
        .map_or(SpatialReference::WEB_MERCATOR, |extent| {
            let center = extent.center();
            SpatialReference::utm_for(center.x, center.y)
        })
}

/// Converts a distance into the planar units of `reference`.
///
/// # Errors
///
/// Returns [`SpatialError::GeographicDistance`] for angular references.
pub fn distance_in_units(
    distance: LinearDistance,
    reference: SpatialReference,
) -> Result<f64, SpatialError> {
    reference
        .meters_per_unit()
        .map(|meters| distance.to_meters() / meters)
        .ok_or(SpatialError::GeographicDistance(reference))
}

#[cfg(test)]
mod tests {
    use fire_map_spatial_models::{Field, FieldType, FieldValue, LinearUnit};
    use geo::Point;

    use super::*;

    fn points(reference: SpatialReference, coords: &[(f64, f64)]) -> PointLayer {
        let mut attributes = AttributeTable::new(vec![Field::new("id", FieldType::Integer)]).unwrap();
        for id in 0..coords.len() {
            attributes
                .push_row(vec![FieldValue::Integer(i64::try_from(id).unwrap())])
                .unwrap();
        }
        PointLayer::new(
            reference,
            coords.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            &attributes,
        )
        .unwrap()
    }

    #[test]
    fn projected_layers_measure_in_their_own_reference() {
        let layer = points(SpatialReference::WEB_MERCATOR, &[(1.0, 2.0)]);
        assert_eq!(distance_reference(&layer), SpatialReference::WEB_MERCATOR);
    }

    #[test]
    fn geographic_layers_measure_in_the_utm_zone_of_their_extent() {
        let layer = points(SpatialReference::WGS84, &[(-60.0, -30.0), (-56.0, -36.0)]);
        assert_eq!(distance_reference(&layer).wkid(), 32_721);

        let empty = points(SpatialReference::WGS84, &[]);
        assert_eq!(distance_reference(&empty), SpatialReference::WEB_MERCATOR);
    }

    #[test]
    fn distances_convert_only_in_projected_references() {
        let five_km = LinearDistance::new(5.0, LinearUnit::Kilometers);

        let meters = distance_in_units(five_km, SpatialReference::from_wkid(32_631)).unwrap();
        assert!((meters - 5_000.0).abs() < 1e-9);
        assert!(matches!(
            distance_in_units(five_km, SpatialReference::WGS84),
            Err(SpatialError::GeographicDistance(_))
        ));
    }
}
