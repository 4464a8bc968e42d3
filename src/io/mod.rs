//! GeoJSON I/O for topological datasets.
//!
//! Input arrives as a `serde_json::Value` and is checked by [`validate`],
//! converted into a [`Dataset`](crate::topology::Dataset) by [`import`], and
//! written back out as typed [`geojson`] structs by [`export`].

pub mod export;
pub mod geojson;
pub mod import;
pub mod validate;

pub use export::{ExportOptions, export_dataset, export_layer, export_layers};
pub use geojson::{Feature, FeatureCollection, Geometry};
pub use import::{ImportOptions, import_features, import_geojson};
pub use validate::{parse_features, validate_geojson};
