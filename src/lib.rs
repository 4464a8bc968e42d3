#![cfg_attr(docsrs, feature(doc_cfg))]
//! # topo-shaper
//!
//! topo-shaper edits GeoJSON through a topological model: every input is
//! imported into a [`Dataset`](topology::Dataset) whose polygon and polyline
//! boundaries are stored once, as shared arcs, and referenced by each
//! feature that uses them. Operations run on that model and the result is
//! exported back to GeoJSON.
//!
//! ## Features
//! - Shared-arc topology: adjacent polygons reference the same boundary,
//!   so simplification and dissolving never open gaps between neighbours
//! - A closed set of operation calling conventions (mutating, replacing,
//!   splitting, dual-dataset, synthesizing) behind one orchestrator
//! - Typed option structs that round-trip through plain JSON maps
//! - A sandboxed attribute-expression language for `filter`, `calc` and friends
//!
//! ## Usage
//!
//! ```
//! use serde_json::json;
//! use topo_shaper::{DissolveOptions, dissolve};
//!
//! let input = json!({
//!     "type": "FeatureCollection",
//!     "features": [
//!         { "type": "Feature", "properties": { "state": "A" },
//!           "geometry": { "type": "Polygon",
//!             "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]] } },
//!         { "type": "Feature", "properties": { "state": "A" },
//!           "geometry": { "type": "Polygon",
//!             "coordinates": [[[1, 0], [2, 0], [2, 1], [1, 1], [1, 0]]] } }
//!     ]
//! });
//! let options = DissolveOptions {
//!     fields: vec!["state".into()],
//!     ..Default::default()
//! };
//! let out = dissolve(&input, &options).unwrap();
//! assert_eq!(out.features.len(), 1);
//! ```
//!
//! Every call is fail-fast: when any step errors, nothing is exported and a
//! [`ShaperError`] describes the first problem found.
//!
//! ## Invariant checking
//! Debug builds, and release builds with the `check-invariants` feature,
//! assert that every arc reference in a dataset resolves after each
//! operation. See [`DebugInvariants`].

pub mod algs;
pub mod api;
pub mod debug_invariants;
pub mod expr;
pub mod geometry;
pub mod io;
pub mod shaper_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use shaper_error::{Result, ShaperError};

pub use api::{
    Api, Command, Commands, Operation, Outcome, Output, affine, buffer, calc, clean, clip,
    default_api, dissolve, dissolve2, divide, drop, each, erase, explode, filter, filter_fields,
    filter_islands, filter_slivers, graticule, info, inlay, innerlines, join, lines, merge,
    merge_layers, mosaic, point_grid, points, polygons, proj, rectangle, rename_fields, simplify,
    snap, sort, split, union, uniq,
};
pub use api::options::*;

/// A convenient prelude to import the most-used types:
pub mod prelude {
    pub use crate::algs::{Info, OperationError};
    pub use crate::api::options::{OptionMap, Options};
    pub use crate::api::{Api, Command, Output};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::expr::{ExpressionError, compile};
    pub use crate::io::{ExportOptions, Feature, FeatureCollection, Geometry, ImportOptions};
    pub use crate::shaper_error::ShaperError;
    pub use crate::topology::{
        ArcPool, ArcRef, Dataset, GeometryType, Layer, Record, Shape, Winding,
    };
}
