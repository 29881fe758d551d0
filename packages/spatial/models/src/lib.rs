#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tabular and geometric types shared across the fire map toolchain.
//!
//! Everything a geoprocessing step consumes or produces is expressed here:
//! [`FieldValue`]s arranged into an [`AttributeTable`], geometry layers
//! ([`PointLayer`], [`PolygonLayer`], [`LineLayer`]) that pair geometries
//! with attributes, and the [`SpatialReference`] the coordinates live in.
//!
//! The [`TableSource`] trait is the read-only "cursor" over any of these,
//! so CSV writers and statistics code never care where rows come from.

pub mod layer;
pub mod reference;
pub mod selection;
pub mod table;
pub mod value;

pub use layer::{Layer, LineLayer, OBJECTID, ORIG_FID, PointLayer, PolygonLayer};
pub use reference::{LinearDistance, LinearUnit, SpatialReference};
pub use selection::Selection;
pub use table::{AttributeTable, Field, TableError, TableSource};
pub use value::{FieldType, FieldValue, GroupKey, infer_field_type};
