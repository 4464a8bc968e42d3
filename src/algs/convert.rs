//! Geometry-type conversions: explode, points, lines, polygons, innerlines.

use geo::Coord;
use hashbrown::{HashMap, HashSet};
use serde_json::Value;

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{OptionMap, Options, PassThroughOptions, PointsOptions};
use crate::geometry::convert::ShapeAssembler;
use crate::geometry::metrics::{point_in_ring, ring_signed_area, shape_centroid};
use crate::topology::arc::{ArcRef, reverse_path};
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer, Record, Shape};

fn like(layer: &Layer, geometry_type: Option<GeometryType>) -> Layer {
    Layer {
        name: layer.name.clone(),
        ..Layer::new(geometry_type)
    }
}

/// Splits polygon rings into groups of one exterior plus the holes it
/// contains.
fn polygon_parts(rings: &[Vec<ArcRef>], arcs: &ArcPool) -> Vec<Vec<Vec<ArcRef>>> {
    let resolved: Vec<(Vec<Coord>, f64)> = rings
        .iter()
        .map(|r| {
            let coords = arcs.path_coords(r);
            let area = ring_signed_area(&coords);
            (coords, area)
        })
        .collect();
    let mut groups: Vec<(usize, Vec<Vec<ArcRef>>)> = resolved
        .iter()
        .enumerate()
        .filter(|(_, (_, a))| *a > 0.0)
        .map(|(i, _)| (i, vec![rings[i].clone()]))
        .collect();
    for (i, (coords, area)) in resolved.iter().enumerate() {
        if *area >= 0.0 {
            continue;
        }
        let Some(&probe) = coords.first() else { continue };
        let container = groups
            .iter_mut()
            .filter(|(e, _)| point_in_ring(probe, &resolved[*e].0))
            .min_by(|(a, _), (b, _)| resolved[*a].1.total_cmp(&resolved[*b].1));
        match container {
            Some((_, group)) => group.push(rings[i].clone()),
            None => log::warn!("explode: dropping hole outside every exterior"),
        }
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

/// `explode`: one feature per part; polygon parts keep their holes.
pub fn explode(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    PassThroughOptions::from_map(options)?;
    let mut out = like(layer, layer.geometry_type);
    for (shape, record) in layer.features() {
        let parts: Vec<Shape> = match (shape, layer.geometry_type) {
            (None, _) => {
                out.push(None, record.clone());
                continue;
            }
            (Some(Shape::Points(points)), _) => {
                points.iter().map(|&p| Shape::Points(vec![p])).collect()
            }
            (Some(Shape::Paths(rings)), Some(GeometryType::Polygon)) => polygon_parts(rings, arcs)
                .into_iter()
                .map(Shape::Paths)
                .collect(),
            (Some(Shape::Paths(paths)), _) => {
                paths.iter().map(|p| Shape::Paths(vec![p.clone()])).collect()
            }
        };
        for part in parts {
            out.push(Some(part), record.clone());
        }
    }
    log::debug!("explode: {} feature(s) into {}", layer.len(), out.len());
    Ok(out)
}

fn field_number(record: &Record, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn vertices(shape: &Shape, arcs: &ArcPool, ty: GeometryType) -> Vec<Coord> {
    match shape {
        Shape::Points(points) => points.clone(),
        Shape::Paths(parts) => {
            let mut seen = HashSet::new();
            parts
                .iter()
                .flat_map(|p| {
                    let mut coords = arcs.path_coords(p);
                    if ty == GeometryType::Polygon {
                        coords.pop();
                    }
                    coords
                })
                .filter(|c| seen.insert((c.x.to_bits(), c.y.to_bits())))
                .collect()
        }
    }
}

fn endpoints(shape: &Shape, arcs: &ArcPool) -> Vec<Coord> {
    match shape {
        Shape::Points(points) => points.clone(),
        Shape::Paths(parts) => {
            let mut out: Vec<Coord> = Vec::new();
            for part in parts {
                let coords = arcs.path_coords(part);
                for c in [coords.first(), coords.last()].into_iter().flatten() {
                    if !out.contains(c) {
                        out.push(*c);
                    }
                }
            }
            out
        }
    }
}

/// `points`: centroids (default), vertices, endpoints, or points built from
/// `x`/`y` attribute fields.
pub fn points(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = PointsOptions::from_map(options)?;
    let mut out = like(layer, Some(GeometryType::Point));
    match (&opts.x, &opts.y) {
        (Some(x), Some(y)) => {
            for record in &layer.records {
                let shape = field_number(record, x)
                    .zip(field_number(record, y))
                    .map(|(x, y)| Shape::Points(vec![Coord { x, y }]));
                out.push(shape, record.clone());
            }
            return Ok(out);
        }
        (None, None) => {}
        _ => {
            return Err(OperationError::InvalidOption {
                name: (if opts.x.is_none() { "x" } else { "y" }).into(),
                reason: "x and y fields must be given together".into(),
            });
        }
    }
    let Some(ty) = layer.geometry_type else {
        out.records = layer.records.clone();
        out.shapes = vec![None; layer.len()];
        return Ok(out);
    };
    for (shape, record) in layer.features() {
        let pts = shape.map(|s| {
            if opts.vertices {
                vertices(s, arcs, ty)
            } else if opts.endpoints {
                endpoints(s, arcs)
            } else {
                shape_centroid(s, arcs, ty).into_iter().collect()
            }
        });
        let shape = pts.filter(|p| !p.is_empty()).map(Shape::Points);
        out.push(shape, record.clone());
    }
    Ok(out)
}

/// `lines`: polygon boundaries become polylines over the same arcs; each
/// point feature becomes one path through its points.
pub fn lines(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    PassThroughOptions::from_map(options)?;
    match layer.geometry_type {
        Some(GeometryType::Polygon) | Some(GeometryType::Polyline) => {
            let mut out = layer.clone();
            out.geometry_type = Some(GeometryType::Polyline);
            Ok(out)
        }
        Some(GeometryType::Point) => {
            let mut asm = ShapeAssembler::new();
            for shape in &layer.shapes {
                match shape.as_ref().and_then(Shape::points) {
                    Some(pts) if pts.len() >= 2 => asm.push_paths([pts.to_vec()]),
                    _ => asm.push_null(),
                }
            }
            Ok(Layer {
                name: layer.name.clone(),
                geometry_type: Some(GeometryType::Polyline),
                shapes: asm.finish(arcs),
                records: layer.records.clone(),
            })
        }
        None => Ok(layer.clone()),
    }
}

/// `polygons`: closed polyline parts become rings; a ring nested inside an
/// odd number of other rings becomes a hole. Open parts are dropped.
pub fn polygons(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    PassThroughOptions::from_map(options)?;
    match layer.geometry_type {
        Some(GeometryType::Polyline) => {}
        Some(GeometryType::Polygon) | None => return Ok(layer.clone()),
        Some(GeometryType::Point) => {
            return Err(OperationError::unsupported("polygons", "point layers"));
        }
    }
    let mut out = like(layer, Some(GeometryType::Polygon));
    let mut open = 0;
    for (shape, record) in layer.features() {
        let paths = shape.and_then(Shape::paths).unwrap_or_default();
        let mut rings: Vec<(Vec<ArcRef>, Vec<Coord>)> = Vec::new();
        for path in paths {
            let coords = arcs.path_coords(path);
            if coords.len() < 4 || coords.first() != coords.last() {
                open += 1;
                continue;
            }
            let (path, coords) = if ring_signed_area(&coords) < 0.0 {
                (reverse_path(path), coords.into_iter().rev().collect())
            } else {
                (path.clone(), coords)
            };
            rings.push((path, coords));
        }
        let oriented: Vec<Vec<ArcRef>> = rings
            .iter()
            .enumerate()
            .map(|(i, (path, coords))| {
                let depth = rings
                    .iter()
                    .enumerate()
                    .filter(|&(j, (_, other))| j != i && point_in_ring(coords[0], other))
                    .count();
                if depth % 2 == 1 { reverse_path(path) } else { path.clone() }
            })
            .collect();
        out.push((!oriented.is_empty()).then_some(Shape::Paths(oriented)), record.clone());
    }
    if open > 0 {
        log::warn!("polygons: dropped {open} open path(s)");
    }
    Ok(out)
}

/// `innerlines`: one polyline feature holding every arc shared by two
/// different polygon features.
pub fn innerlines(layer: &Layer, _arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    PassThroughOptions::from_map(options)?;
    if !matches!(layer.geometry_type, Some(GeometryType::Polygon) | None) {
        return Err(OperationError::unsupported(
            "innerlines",
            format!("{} layers", layer.geometry_type.map_or("empty", |t| t.as_str())),
        ));
    }
    let mut owners: HashMap<usize, HashSet<usize>> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();
    for (feature, shape) in layer.shapes.iter().enumerate() {
        for arc in shape.iter().flat_map(|s| s.arcs()) {
            let set = owners.entry(arc.index()).or_insert_with(|| {
                order.push(arc.index());
                HashSet::new()
            });
            set.insert(feature);
        }
    }
    let inner: Vec<Vec<ArcRef>> = order
        .into_iter()
        .filter(|i| owners.get(i).is_some_and(|s| s.len() >= 2))
        .map(|i| vec![ArcRef::forward(i as u32)])
        .collect();
    let mut out = like(layer, Some(GeometryType::Polyline));
    if !inner.is_empty() {
        out.push(Some(Shape::Paths(inner)), Record::new());
    }
    Ok(out)
}
