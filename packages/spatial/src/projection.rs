//! Coordinate transforms between supported spatial references.

use fire_map_spatial_models::SpatialReference;
use geo::Coord;
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::SpatialError;

/// A reusable `from` → `to` coordinate transform.
pub struct Transformer {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Transformer {
    pub fn new(from: SpatialReference, to: SpatialReference) -> Result<Self, SpatialError> {
        Ok(Self {
            from: build_proj(from)?,
            to: build_proj(to)?,
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
        })
    }

    /// Transforms one coordinate. Geographic coordinates are degrees on
    /// both sides; `proj4rs` works in radians internally.
    pub fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>, SpatialError> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point).map_err(|e| SpatialError::Projection {
            message: format!("({}, {}): {e}", coord.x, coord.y),
        })?;

        Ok(if self.to_geographic {
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        } else {
            Coord {
                x: point.0,
                y: point.1,
            }
        })
    }
}

fn build_proj(reference: SpatialReference) -> Result<Proj4, SpatialError> {
    let definition = reference
        .proj4()
        .ok_or(SpatialError::UnsupportedReference(reference))?;

    Proj4::from_proj_string(&definition).map_err(|e| SpatialError::Projection {
        message: format!("failed to build PROJ.4 for {reference} ({definition}): {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_wgs84_to_web_mercator() {
        let transformer =
            Transformer::new(SpatialReference::WGS84, SpatialReference::WEB_MERCATOR).unwrap();

        let origin = transformer.apply(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert!(origin.x.abs() < 1e-6);
        assert!(origin.y.abs() < 1e-6);

        let antimeridian = transformer.apply(Coord { x: 180.0, y: 0.0 }).unwrap();
        assert!((antimeridian.x - 20_037_508.342_789_244).abs() < 1e-3);
    }

    #[test]
    fn round_trips_through_web_mercator() {
        let forward =
            Transformer::new(SpatialReference::WGS84, SpatialReference::WEB_MERCATOR).unwrap();
        let inverse =
            Transformer::new(SpatialReference::WEB_MERCATOR, SpatialReference::WGS84).unwrap();

        let original = Coord { x: -58.4, y: -34.6 };
        let back = inverse.apply(forward.apply(original).unwrap()).unwrap();
        assert!((back.x - original.x).abs() < 1e-9);
        assert!((back.y - original.y).abs() < 1e-9);
    }

    #[test]
    fn rejects_unknown_wkid() {
        let result = Transformer::new(SpatialReference::WGS84, SpatialReference::from_wkid(2_193));
        assert!(matches!(
            result,
            Err(SpatialError::UnsupportedReference(r)) if r.wkid() == 2_193
        ));
    }
}
