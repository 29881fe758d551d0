//! Geometry layers: geometries paired row-for-row with attributes.

use std::borrow::Cow;

use geo::{LineString, MultiPolygon, Point};

use crate::reference::SpatialReference;
use crate::selection::Selection;
use crate::table::{AttributeTable, Field, TableError, TableSource};
use crate::value::{FieldType, FieldValue};

/// System field holding each feature's 1-based object ID.
pub const OBJECTID: &str = "OBJECTID";

/// Field linking a derived feature back to its source feature's object ID.
pub const ORIG_FID: &str = "ORIG_FID";

/// A feature layer. Row `i` of the attribute table describes geometry `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<G> {
    spatial_reference: SpatialReference,
    geometries: Vec<G>,
    attributes: AttributeTable,
}

/// Fire detections and other point features.
pub type PointLayer = Layer<Point<f64>>;

/// Boundary polygons.
pub type PolygonLayer = Layer<MultiPolygon<f64>>;

/// Polylines, e.g. polygon outlines.
pub type LineLayer = Layer<LineString<f64>>;

impl<G: Clone> Layer<G> {
    /// Creates a layer, prepending a required `OBJECTID` field numbered
    /// from 1 in geometry order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowLength`] if the attribute row count differs
    /// from the geometry count, or [`TableError::DuplicateField`] if the
    /// attributes already carry an `OBJECTID`.
    pub fn new(
        spatial_reference: SpatialReference,
        geometries: Vec<G>,
        attributes: &AttributeTable,
    ) -> Result<Self, TableError> {
        if attributes.len() != geometries.len() {
            return Err(TableError::RowLength {
                expected: geometries.len(),
                actual: attributes.len(),
            });
        }

        let mut fields = vec![Field::required(OBJECTID, FieldType::Integer)];
        fields.extend(attributes.fields().iter().cloned());
        let mut table = AttributeTable::new(fields)?;

        for (i, row) in attributes.row_slice().iter().enumerate() {
            let oid = i64::try_from(i + 1).unwrap_or(i64::MAX);
            let mut values = Vec::with_capacity(row.len() + 1);
            values.push(FieldValue::Integer(oid));
            values.extend(row.iter().cloned());
            table.push_row(values)?;
        }

        Ok(Self {
            spatial_reference,
            geometries,
            attributes: table,
        })
    }

    /// Same features and attributes with replaced geometries, e.g. after
    /// a reprojection.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowLength`] if the geometry count changes.
    pub fn with_geometries<H>(
        &self,
        spatial_reference: SpatialReference,
        geometries: Vec<H>,
    ) -> Result<Layer<H>, TableError> {
        if geometries.len() != self.geometries.len() {
            return Err(TableError::RowLength {
                expected: self.geometries.len(),
                actual: geometries.len(),
            });
        }
        Ok(Layer {
            spatial_reference,
            geometries,
            attributes: self.attributes.clone(),
        })
    }

    /// The selected features, keeping their object IDs.
    #[must_use]
    pub fn subset(&self, selection: &Selection) -> Self {
        Self {
            spatial_reference: self.spatial_reference,
            geometries: selection
                .indices()
                .iter()
                .filter_map(|&i| self.geometries.get(i).cloned())
                .collect(),
            attributes: self.attributes.subset(selection.indices()),
        }
    }
}

impl<G> Layer<G> {
    /// Coordinate reference system of the geometries.
    #[must_use]
    pub const fn spatial_reference(&self) -> SpatialReference {
        self.spatial_reference
    }

    /// Geometries in row order.
    #[must_use]
    pub fn geometries(&self) -> &[G] {
        &self.geometries
    }

    /// The attribute table, including `OBJECTID`.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    /// Mutable attribute table, for joining and deleting fields.
    pub fn attributes_mut(&mut self) -> &mut AttributeTable {
        &mut self.attributes
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    /// Whether the layer has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Object ID of feature `index`.
    #[must_use]
    pub fn object_id(&self, index: usize) -> Option<i64> {
        match self.attributes.value(index, OBJECTID)? {
            FieldValue::Integer(oid) => Some(*oid),
            _ => None,
        }
    }
}

impl<G> TableSource for Layer<G> {
    fn fields(&self) -> &[Field] {
        self.attributes.fields()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Cow<'_, [FieldValue]>> + '_> {
        self.attributes.rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confidence_table(values: &[i64]) -> AttributeTable {
        let mut table =
            AttributeTable::new(vec![Field::new("confidence", FieldType::Integer)]).unwrap();
        for v in values {
            table.push_row(vec![FieldValue::Integer(*v)]).unwrap();
        }
        table
    }

    #[test]
    fn assigns_object_ids_from_one() {
        let layer = PointLayer::new(
            SpatialReference::WGS84,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            &confidence_table(&[70, 90]),
        )
        .unwrap();

        assert_eq!(layer.object_id(0), Some(1));
        assert_eq!(layer.object_id(1), Some(2));
        assert_eq!(layer.user_field_names(), vec!["confidence".to_string()]);
    }

    #[test]
    fn rejects_mismatched_attribute_count() {
        let result = PointLayer::new(
            SpatialReference::WGS84,
            vec![Point::new(0.0, 0.0)],
            &confidence_table(&[70, 90]),
        );
        assert!(matches!(result, Err(TableError::RowLength { .. })));
    }

    #[test]
    fn subset_preserves_object_ids() {
        let layer = PointLayer::new(
            SpatialReference::WGS84,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
            &confidence_table(&[70, 90, 60]),
        )
        .unwrap();

        let subset = layer.subset(&Selection::new(vec![2], 3));
        assert_eq!(subset.len(), 1);
        assert_eq!(subset.object_id(0), Some(3));
        assert_eq!(subset.geometries()[0], Point::new(2.0, 2.0));
    }
}
