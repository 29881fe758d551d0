//! Spatial references and linear distance units.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A coordinate reference system identified by its well-known ID.
///
/// Only the references the toolchain can actually transform between are
/// described here; see [`SpatialReference::proj4`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpatialReference {
    wkid: u32,
}

impl SpatialReference {
    /// WGS84 geographic coordinates (longitude/latitude degrees).
    pub const WGS84: Self = Self { wkid: 4326 };

    /// WGS84 Web Mercator, the native reference of most hosted feature
    /// services.
    pub const WEB_MERCATOR: Self = Self { wkid: 3857 };

    /// Wraps a WKID.
    #[must_use]
    pub const fn from_wkid(wkid: u32) -> Self {
        Self { wkid }
    }

    /// The WGS84 UTM zone containing `longitude`/`latitude` (degrees):
    /// 326zz north of the equator, 327zz south of it.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn utm_for(longitude: f64, latitude: f64) -> Self {
        let zone = (((longitude + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32;
        let base = if latitude >= 0.0 { 32_600 } else { 32_700 };
        Self { wkid: base + zone }
    }

    /// The well-known ID.
    #[must_use]
    pub const fn wkid(self) -> u32 {
        self.wkid
    }

    /// Whether coordinates are angular (degrees) rather than planar.
    #[must_use]
    pub const fn is_geographic(self) -> bool {
        matches!(self.wkid, 4326 | 4269)
    }

    /// Whether two WKIDs name the same system (e.g. 3857 and 102100).
    #[must_use]
    pub const fn is_equivalent(self, other: Self) -> bool {
        self.wkid == other.wkid || (self.is_web_mercator() && other.is_web_mercator())
    }

    const fn is_web_mercator(self) -> bool {
        matches!(self.wkid, 3857 | 102_100 | 102_113 | 900_913)
    }

    /// PROJ.4 definition, or `None` for unsupported WKIDs.
    #[must_use]
    pub fn proj4(self) -> Option<String> {
        match self.wkid {
            4326 => Some("+proj=longlat +datum=WGS84 +no_defs".to_string()),
            4269 => Some("+proj=longlat +datum=NAD83 +no_defs".to_string()),
            _ if self.is_web_mercator() => Some(
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                    .to_string(),
            ),
            // WGS84 / UTM north (326zz) and south (327zz)
            32_601..=32_660 => Some(format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
                self.wkid - 32_600
            )),
            32_701..=32_760 => Some(format!(
                "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
                self.wkid - 32_700
            )),
            _ => None,
        }
    }

    /// Meters per coordinate unit. `None` for geographic references, where
    /// planar distances have no linear meaning.
    #[must_use]
    pub fn meters_per_unit(self) -> Option<f64> {
        if self.is_geographic() || self.proj4().is_none() {
            None
        } else {
            Some(1.0)
        }
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WKID {}", self.wkid)
    }
}

/// Units a search distance may be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearUnit {
    /// Meters.
    Meters,
    /// Kilometers.
    Kilometers,
    /// International feet.
    Feet,
    /// Statute miles.
    Miles,
}

impl LinearUnit {
    /// Length of one unit in meters.
    #[must_use]
    pub const fn meters(self) -> f64 {
        match self {
            Self::Meters => 1.0,
            Self::Kilometers => 1_000.0,
            Self::Feet => 0.3048,
            Self::Miles => 1_609.344,
        }
    }

    /// Title-cased plural name, e.g. `"Kilometers"`.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Meters => "Meters",
            Self::Kilometers => "Kilometers",
            Self::Feet => "Feet",
            Self::Miles => "Miles",
        }
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title().to_lowercase())
    }
}

/// A distance with its unit, e.g. 5 kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearDistance {
    /// Magnitude.
    pub value: f64,
    /// Unit of `value`.
    pub unit: LinearUnit,
}

impl LinearDistance {
    /// Creates a distance.
    #[must_use]
    pub const fn new(value: f64, unit: LinearUnit) -> Self {
        Self { value, unit }
    }

    /// The distance in meters.
    #[must_use]
    pub fn to_meters(self) -> f64 {
        self.value * self.unit.meters()
    }
}

impl Default for LinearDistance {
    fn default() -> Self {
        Self::new(5.0, LinearUnit::Kilometers)
    }
}

impl fmt::Display for LinearDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
