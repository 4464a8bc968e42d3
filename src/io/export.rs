//! [`Dataset`] → GeoJSON export.
//!
//! Polygon rings are regrouped into exterior/hole polygons and written in
//! the requested [`Winding`], defaulting to the convention the importer
//! recorded.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::geometry::metrics::resolve_parts;
use crate::geometry::rings::group_rings;
use crate::io::geojson::{Feature, FeatureCollection, Geometry, Position};
use crate::topology::arc_pool::ArcPool;
use crate::topology::dataset::{Dataset, Winding};
use crate::topology::layer::{GeometryType, Layer, Shape};

/// Exporter settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Ring convention of output polygons; `None` keeps the input's.
    pub winding: Option<Winding>,
    /// Round coordinates to multiples of this value.
    pub precision: Option<f64>,
    /// Omit features whose geometry is null.
    #[serde(alias = "drop-empty")]
    pub drop_empty: bool,
    /// Write this attribute as the feature `id`.
    #[serde(alias = "id-field")]
    pub id_field: Option<String>,
}

struct Writer {
    winding: Winding,
    precision: Option<f64>,
}

impl Writer {
    fn position(&self, c: Coord) -> Position {
        match self.precision {
            Some(p) if p > 0.0 => [round_to(c.x, p), round_to(c.y, p)],
            _ => [c.x, c.y],
        }
    }

    fn positions(&self, coords: &[Coord]) -> Vec<Position> {
        let mut out: Vec<Position> = Vec::with_capacity(coords.len());
        for &c in coords {
            let p = self.position(c);
            if out.last() != Some(&p) {
                out.push(p);
            }
        }
        out
    }

    fn ring(&self, mut ring: Vec<Coord>) -> Vec<Position> {
        if self.winding == Winding::Cw {
            ring.reverse();
        }
        self.positions(&ring)
    }

    fn geometry(&self, shape: &Shape, arcs: &ArcPool, ty: GeometryType) -> Option<Geometry> {
        match (shape, ty) {
            (Shape::Points(points), _) => match points.as_slice() {
                [] => None,
                [p] => Some(Geometry::Point {
                    coordinates: self.position(*p),
                }),
                many => Some(Geometry::MultiPoint {
                    coordinates: many.iter().map(|&p| self.position(p)).collect(),
                }),
            },
            (Shape::Paths(_), GeometryType::Polygon) => {
                let mut polygons: Vec<Vec<Vec<Position>>> = group_rings(resolve_parts(shape, arcs))
                    .into_iter()
                    .map(|g| {
                        std::iter::once(self.ring(g.exterior))
                            .chain(g.holes.into_iter().map(|h| self.ring(h)))
                            .filter(|r| r.len() >= 4)
                            .collect::<Vec<_>>()
                    })
                    .filter(|rings| !rings.is_empty())
                    .collect();
                match polygons.len() {
                    0 => None,
                    1 => polygons.pop().map(|coordinates| Geometry::Polygon { coordinates }),
                    _ => Some(Geometry::MultiPolygon {
                        coordinates: polygons,
                    }),
                }
            }
            (Shape::Paths(_), _) => {
                let mut lines: Vec<Vec<Position>> = resolve_parts(shape, arcs)
                    .iter()
                    .map(|p| self.positions(p))
                    .filter(|p| p.len() >= 2)
                    .collect();
                match lines.len() {
                    0 => None,
                    1 => lines.pop().map(|coordinates| Geometry::LineString { coordinates }),
                    _ => Some(Geometry::MultiLineString { coordinates: lines }),
                }
            }
        }
    }
}

fn round_to(v: f64, precision: f64) -> f64 {
    let r = (v / precision).round() * precision;
    // strip representation noise such as 0.30000000000000004
    let digits = (-precision.log10()).ceil().max(0.0) as i32;
    if digits > 15 {
        return r;
    }
    let scale = 10f64.powi(digits);
    (r * scale).round() / scale
}

/// Exports one layer's features.
pub fn export_layer(
    layer: &Layer,
    arcs: &ArcPool,
    winding: Winding,
    options: &ExportOptions,
) -> Vec<Feature> {
    let writer = Writer {
        winding,
        precision: options.precision,
    };
    layer
        .features()
        .filter_map(|(shape, record)| {
            let geometry = match (shape, layer.geometry_type) {
                (Some(shape), Some(ty)) => writer.geometry(shape, arcs, ty),
                _ => None,
            };
            if geometry.is_none() && options.drop_empty {
                return None;
            }
            let id = options
                .id_field
                .as_ref()
                .and_then(|f| record.get(f))
                .filter(|v| !v.is_null())
                .cloned();
            Some(Feature {
                id,
                geometry,
                properties: record.clone(),
            })
        })
        .collect()
}

/// Exports every layer of `dataset`, concatenated in layer order.
pub fn export_dataset(dataset: &Dataset, options: &ExportOptions) -> FeatureCollection {
    let winding = options
        .winding
        .or(dataset.info.winding)
        .unwrap_or_default();
    FeatureCollection::new(
        dataset
            .layers
            .iter()
            .flat_map(|layer| export_layer(layer, &dataset.arcs, winding, options))
            .collect(),
    )
}

/// Exports each layer of `dataset` as its own collection.
pub fn export_layers(dataset: &Dataset, options: &ExportOptions) -> Vec<FeatureCollection> {
    let winding = options
        .winding
        .or(dataset.info.winding)
        .unwrap_or_default();
    dataset
        .layers
        .iter()
        .map(|layer| FeatureCollection::new(export_layer(layer, &dataset.arcs, winding, options)))
        .collect()
}
