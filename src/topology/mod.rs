//! Top-level module for the shared-arc topology model.
//!
//! This module provides:
//! - [`ArcRef`](arc::ArcRef) signed arc handles and the [`ArcPool`](arc_pool::ArcPool) that owns arc coordinates
//! - the [`TopologyBuilder`](builder::TopologyBuilder) that turns raw paths into shared arcs
//! - [`Layer`](layer::Layer) and [`Dataset`](dataset::Dataset), the units operations work on
//!
//! Most users never touch these types directly: the `api` functions import
//! GeoJSON into a dataset, run one operation, and export the result.

pub mod arc;
pub mod arc_pool;
pub mod builder;
pub mod dataset;
pub mod layer;

pub use arc::ArcRef;
pub use arc_pool::ArcPool;
pub use builder::TopologyBuilder;
pub use dataset::{Dataset, DatasetInfo, Winding};
pub use layer::{GeometryType, Layer, Record, Shape};
