//! Dataset summaries for the `info` command.

use serde::Serialize;

use crate::geometry::metrics::shape_bbox;
use crate::topology::dataset::Dataset;
use crate::topology::layer::{GeometryType, Layer};
use crate::topology::arc_pool::ArcPool;

/// Summary of one layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerInfo {
    pub name: Option<String>,
    pub geometry_type: Option<GeometryType>,
    pub feature_count: usize,
    pub null_shape_count: usize,
    /// `[xmin, ymin, xmax, ymax]` over every non-null shape.
    pub bbox: Option<[f64; 4]>,
    pub fields: Vec<String>,
}

/// Summary of a dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Info {
    pub layers: Vec<LayerInfo>,
    pub arc_count: usize,
    pub vertex_count: usize,
}

fn layer_info(layer: &Layer, arcs: &ArcPool) -> LayerInfo {
    let bbox = layer
        .shapes
        .iter()
        .flatten()
        .filter_map(|s| shape_bbox(s, arcs))
        .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y])
        .reduce(|a, b| {
            [
                a[0].min(b[0]),
                a[1].min(b[1]),
                a[2].max(b[2]),
                a[3].max(b[3]),
            ]
        });
    LayerInfo {
        name: layer.name.clone(),
        geometry_type: layer.geometry_type,
        feature_count: layer.len(),
        null_shape_count: layer.null_shape_count(),
        bbox,
        fields: layer.field_names(),
    }
}

/// Collects per-layer counts, extents and field names.
pub fn dataset_info(dataset: &Dataset) -> Info {
    Info {
        layers: dataset
            .layers
            .iter()
            .map(|l| layer_info(l, &dataset.arcs))
            .collect(),
        arc_count: dataset.arcs.len(),
        vertex_count: dataset.arcs.vertex_count(),
    }
}
