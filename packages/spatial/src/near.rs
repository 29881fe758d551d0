//! Lazily evaluated all-pairs near table.
//!
//! A fire layer can hold tens of thousands of detections, so the N×(N−1)
//! pair table is never materialised. Rows are produced one input point at
//! a time as the table is read.

use std::borrow::Cow;

use fire_map_spatial_models::{Field, FieldType, FieldValue, PointLayer, TableSource};
use geo::{Distance, Euclidean};

/// Object ID of the input point.
pub const IN_FID: &str = "IN_FID";
/// Object ID of the near point.
pub const NEAR_FID: &str = "NEAR_FID";
/// Planar distance between the two points.
pub const NEAR_DIST: &str = "NEAR_DIST";
/// 1-based rank of the near point by distance from the input point.
pub const NEAR_RANK: &str = "NEAR_RANK";

/// Planar distances from every point to every other point in a layer.
///
/// For each input point (in layer order) the rows are ordered by distance,
/// ties broken by near object ID. Self pairs are excluded, so a single
/// point produces no rows.
pub struct NearTable<'a> {
    points: &'a PointLayer,
    fields: Vec<Field>,
}

impl<'a> NearTable<'a> {
    pub(crate) fn new(points: &'a PointLayer) -> Self {
        Self {
            points,
            fields: vec![
                Field::new(IN_FID, FieldType::Integer),
                Field::new(NEAR_FID, FieldType::Integer),
                Field::new(NEAR_DIST, FieldType::Double),
                Field::new(NEAR_RANK, FieldType::Integer),
            ],
        }
    }

    /// Number of rows the table yields.
    #[must_use]
    pub fn len(&self) -> usize {
        let n = self.points.len();
        n * n.saturating_sub(1)
    }

    /// Whether the table yields no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rows_for(&self, input: usize) -> Vec<Vec<FieldValue>> {
        let geometries = self.points.geometries();
        let origin = geometries[input];

        let mut near: Vec<(f64, i64)> = geometries
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != input)
            .map(|(j, point)| {
                (
                    Euclidean.distance(origin, *point),
                    self.points.object_id(j).unwrap_or_default(),
                )
            })
            .collect();
        near.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let in_fid = self.points.object_id(input).unwrap_or_default();
        near.into_iter()
            .zip(1_i64..)
            .map(|((dist, near_fid), rank)| {
                vec![
                    FieldValue::Integer(in_fid),
                    FieldValue::Integer(near_fid),
                    FieldValue::Double(dist),
                    FieldValue::Integer(rank),
                ]
            })
            .collect()
    }
}

impl TableSource for NearTable<'_> {
    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Cow<'_, [FieldValue]>> + '_> {
        Box::new(
            (0..self.points.len())
                .flat_map(|input| self.rows_for(input))
                .map(Cow::Owned),
        )
    }
}
