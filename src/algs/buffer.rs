//! Outward buffers for points, polylines and polygons.
//!
//! Every buffer is built as a union of simple convex pieces: a circle per
//! point, and a capsule (convex hull of two end circles) per segment.
//! Polygons additionally keep their own interior.

use std::f64::consts::TAU;

use geo::{ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use itertools::Itertools;

use crate::algs::dissolve::union_all;
use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{BufferOptions, OptionMap, Options};
use crate::geometry::convert::{ShapeAssembler, shape_to_multi_polygon};
use crate::geometry::metrics::resolve_parts;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer, Shape};

fn circle_points(center: Coord, radius: f64, segments: usize) -> impl Iterator<Item = Coord> {
    (0..segments).map(move |i| {
        let t = TAU * i as f64 / segments as f64;
        Coord {
            x: center.x + radius * t.cos(),
            y: center.y + radius * t.sin(),
        }
    })
}

fn circle(center: Coord, radius: f64, segments: usize) -> Polygon {
    let mut ring: Vec<Coord> = circle_points(center, radius, segments).collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    Polygon::new(LineString::new(ring), Vec::new())
}

fn capsule(a: Coord, b: Coord, radius: f64, segments: usize) -> Polygon {
    let pts: MultiPoint = circle_points(a, radius, segments)
        .chain(circle_points(b, radius, segments))
        .map(Point::from)
        .collect();
    pts.convex_hull()
}

fn buffer_shape(shape: &Shape, arcs: &ArcPool, ty: GeometryType, radius: f64, segments: usize) -> MultiPolygon {
    match (shape, ty) {
        (Shape::Points(points), _) => union_all(
            points
                .iter()
                .map(|&p| MultiPolygon::new(vec![circle(p, radius, segments)])),
        ),
        (Shape::Paths(_), GeometryType::Polygon) => {
            let base = shape_to_multi_polygon(shape, arcs);
            let edges = resolve_parts(shape, arcs)
                .into_iter()
                .flat_map(|ring| {
                    ring.into_iter()
                        .tuple_windows()
                        .map(|(a, b)| MultiPolygon::new(vec![capsule(a, b, radius, segments)]))
                        .collect::<Vec<_>>()
                });
            union_all(std::iter::once(base).chain(edges))
        }
        (Shape::Paths(_), _) => {
            let pieces = resolve_parts(shape, arcs).into_iter().flat_map(|path| {
                let caps: Vec<MultiPolygon> = match path.as_slice() {
                    [single] => vec![MultiPolygon::new(vec![circle(*single, radius, segments)])],
                    _ => path
                        .iter()
                        .tuple_windows()
                        .map(|(&a, &b)| MultiPolygon::new(vec![capsule(a, b, radius, segments)]))
                        .collect(),
                };
                caps
            });
            union_all(pieces)
        }
    }
}

/// `buffer`: replaces every shape with the area within `distance` of it.
pub fn buffer(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = BufferOptions::from_map(options)?;
    let distance = match opts.distance {
        Some(d) if d > 0.0 && d.is_finite() => d,
        Some(d) => {
            return Err(OperationError::InvalidOption {
                name: "distance".into(),
                reason: format!("expected a positive distance, got {d}"),
            });
        }
        None => {
            return Err(OperationError::InvalidOption {
                name: "distance".into(),
                reason: "missing".into(),
            });
        }
    };
    let segments = opts.segments.max(4);
    let mut asm = ShapeAssembler::new();
    for shape in &layer.shapes {
        match (shape, layer.geometry_type) {
            (Some(shape), Some(ty)) => {
                asm.push_multi_polygon(&buffer_shape(shape, arcs, ty, distance, segments))
            }
            _ => asm.push_null(),
        }
    }
    log::debug!("buffer: {} feature(s) at distance {distance}", layer.len());
    Ok(Layer {
        name: layer.name.clone(),
        geometry_type: Some(GeometryType::Polygon),
        shapes: asm.finish(arcs),
        records: layer.records.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::metrics::shape_area;
    use crate::io::import::{ImportOptions, import_geojson};
    use serde_json::json;
    use std::f64::consts::PI;

    fn opts(distance: f64) -> OptionMap {
        json!({ "distance": distance, "segments": 64 }).as_object().cloned().unwrap()
    }

    #[test]
    fn point_becomes_circle() {
        let mut ds = import_geojson(&json!({ "type": "Point", "coordinates": [0, 0] }), &ImportOptions::default())
            .unwrap();
        let out = buffer(&ds.layers[0], &mut ds.arcs, &opts(1.0)).unwrap();
        assert_eq!(out.geometry_type, Some(GeometryType::Polygon));
        let area = shape_area(out.shapes[0].as_ref().unwrap(), &ds.arcs);
        assert!((area - PI).abs() < 0.01);
    }

    #[test]
    fn line_becomes_capsule() {
        let mut ds = import_geojson(
            &json!({ "type": "LineString", "coordinates": [[0, 0], [10, 0]] }),
            &ImportOptions::default(),
        )
        .unwrap();
        let out = buffer(&ds.layers[0], &mut ds.arcs, &opts(1.0)).unwrap();
        let area = shape_area(out.shapes[0].as_ref().unwrap(), &ds.arcs);
        assert!((area - (20.0 + PI)).abs() < 0.05);
    }

    #[test]
    fn polygon_grows() {
        let mut ds = import_geojson(
            &json!({ "type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]] }),
            &ImportOptions::default(),
        )
        .unwrap();
        let out = buffer(&ds.layers[0], &mut ds.arcs, &opts(1.0)).unwrap();
        let area = shape_area(out.shapes[0].as_ref().unwrap(), &ds.arcs);
        assert!((area - (16.0 + 16.0 + PI)).abs() < 0.05);
    }

    #[test]
    fn non_positive_distance_is_rejected() {
        let mut ds = import_geojson(&json!({ "type": "Point", "coordinates": [0, 0] }), &ImportOptions::default())
            .unwrap();
        assert!(matches!(
            buffer(&ds.layers[0], &mut ds.arcs, &opts(0.0)),
            Err(OperationError::InvalidOption { .. })
        ));
    }
}
