//! R-tree indexes for point-in-polygon and point-to-line lookups.

use geo::{BoundingRect, Distance, Euclidean, Intersects, Line, LineString, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};

/// A polygon's envelope stored in the R-tree, pointing back at its row.
struct PolygonEntry {
    row: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for PolygonEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Envelope index over a polygon layer's geometries.
pub struct PolygonIndex<'a> {
    polygons: &'a [MultiPolygon<f64>],
    tree: RTree<PolygonEntry>,
}

impl<'a> PolygonIndex<'a> {
    pub fn build(polygons: &'a [MultiPolygon<f64>]) -> Self {
        let entries = polygons
            .iter()
            .enumerate()
            .filter_map(|(row, polygon)| {
                compute_envelope(polygon).map(|envelope| PolygonEntry { row, envelope })
            })
            .collect();

        Self {
            polygons,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Rows of every polygon that covers `point`.
    ///
    /// Boundaries are included: a point lying exactly on an edge shared by
    /// two polygons belongs to both.
    pub fn containing(&self, point: &Point<f64>) -> impl Iterator<Item = usize> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(move |entry| self.polygons[entry.row].intersects(point))
            .map(|entry| entry.row)
    }

    /// Whether any polygon covers `point`.
    pub fn any_contains(&self, point: &Point<f64>) -> bool {
        self.containing(point).next().is_some()
    }
}

/// A single line segment, the unit of distance lookups.
struct SegmentEntry {
    segment: Line<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Segment index over a line layer's geometries.
pub struct SegmentIndex {
    tree: RTree<SegmentEntry>,
}

impl SegmentIndex {
    pub fn build(lines: &[LineString<f64>]) -> Self {
        let entries = lines
            .iter()
            .flat_map(LineString::lines)
            .map(|segment| SegmentEntry {
                envelope: AABB::from_corners(
                    [segment.start.x, segment.start.y],
                    [segment.end.x, segment.end.y],
                ),
                segment,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Whether any segment lies within `distance` of `point` (inclusive).
    pub fn within_distance(&self, point: &Point<f64>, distance: f64) -> bool {
        let query_env = AABB::from_corners(
            [point.x() - distance, point.y() - distance],
            [point.x() + distance, point.y() + distance],
        );

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .any(|entry| Euclidean.distance(point, &entry.segment) <= distance)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`]. Empty
/// geometries have none and are left out of the index.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
