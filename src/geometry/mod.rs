//! Geometry helpers shared by the importer, exporter, and built-in operations.

pub mod convert;
pub mod metrics;
pub mod rings;

pub use convert::{ShapeAssembler, shape_to_geometry};
pub use metrics::{shape_area, shape_centroid, shape_length};
pub use rings::{RingGroup, group_rings};
