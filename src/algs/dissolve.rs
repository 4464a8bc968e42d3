//! Dissolve: merging features that share attribute values.
//!
//! `dissolve` works on the arc topology directly. Within a group, an arc
//! used in both directions is an internal boundary and cancels; the arcs
//! that survive are chained back into rings. No new arcs are created.
//!
//! `dissolve2` and `union` run a polygon overlay per group instead, which
//! also merges overlapping polygons that do not share arcs.

use geo::{BooleanOps, Coord, MultiPolygon};
use hashbrown::HashMap;
use serde_json::Value;

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{DissolveOptions, OptionMap, Options};
use crate::geometry::convert::{ShapeAssembler, shape_to_multi_polygon};
use crate::topology::arc::ArcRef;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer, Record, Shape};

/// Groups feature indices by the values of `fields`, in order of first
/// appearance. With no fields every feature lands in one group.
pub(crate) fn group_by_fields(layer: &Layer, fields: &[String]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, record) in layer.records.iter().enumerate() {
        let key: Vec<&Value> = fields
            .iter()
            .map(|f| record.get(f).unwrap_or(&Value::Null))
            .collect();
        let key = serde_json::to_string(&key).unwrap_or_default();
        match index.get(&key) {
            Some(&g) => groups[g].push(i),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

fn check_fields(layer: &Layer, opts: &DissolveOptions) -> OpResult<()> {
    if layer.is_empty() {
        return Ok(());
    }
    let names = opts
        .fields
        .iter()
        .chain(&opts.sum_fields)
        .chain(&opts.copy_fields);
    for name in names {
        if !layer.has_field(name) {
            return Err(OperationError::InvalidOption {
                name: "fields".into(),
                reason: format!("field `{name}` not found"),
            });
        }
    }
    Ok(())
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Record of a dissolved group: the grouping fields, summed fields, and
/// copied fields (taken from the first member).
pub(crate) fn group_record(layer: &Layer, members: &[usize], opts: &DissolveOptions) -> Record {
    let mut record = Record::new();
    let Some(&first) = members.first() else {
        return record;
    };
    let head = &layer.records[first];
    for field in opts.fields.iter().chain(&opts.copy_fields) {
        record.insert(field.clone(), head.get(field).cloned().unwrap_or(Value::Null));
    }
    for field in &opts.sum_fields {
        let sum: f64 = members
            .iter()
            .filter_map(|&i| layer.records[i].get(field).and_then(Value::as_f64))
            .sum();
        record.insert(field.clone(), number(sum));
    }
    record
}

/// Cancels internal arcs of a group of polygon shapes and rebuilds rings
/// from what remains.
fn dissolve_rings(layer: &Layer, members: &[usize], arcs: &ArcPool) -> Option<Shape> {
    let mut uses: HashMap<usize, (usize, usize)> = HashMap::new();
    let mut order: Vec<ArcRef> = Vec::new();
    for &i in members {
        for arc in layer.shapes[i].iter().flat_map(Shape::arcs) {
            let entry = uses.entry(arc.index()).or_insert((0, 0));
            let seen = if arc.is_reversed() { &mut entry.1 } else { &mut entry.0 };
            if *seen == 0 {
                order.push(arc);
            }
            *seen += 1;
        }
    }
    let boundary: Vec<ArcRef> = order
        .into_iter()
        .filter(|a| {
            let (fwd, rev) = uses[&a.index()];
            fwd == 0 || rev == 0
        })
        .collect();
    let rings = chain_rings(&boundary, arcs);
    (!rings.is_empty()).then_some(Shape::Paths(rings))
}

fn key(c: Coord) -> (u64, u64) {
    (c.x.to_bits(), c.y.to_bits())
}

/// Direction leaving the start of `arc`.
fn leaving(arc: ArcRef, arcs: &ArcPool) -> Option<Coord> {
    let mut it = arcs.traverse(arc);
    let a = it.next()?;
    let b = it.find(|c| *c != a)?;
    Some(b - a)
}

/// Direction arriving at the end of `arc`.
fn arriving(arc: ArcRef, arcs: &ArcPool) -> Option<Coord> {
    leaving(arc.reversed(), arcs).map(|d| Coord { x: -d.x, y: -d.y })
}

fn turn(incoming: Coord, outgoing: Coord) -> f64 {
    let cross = incoming.x * outgoing.y - incoming.y * outgoing.x;
    let dot = incoming.x * outgoing.x + incoming.y * outgoing.y;
    cross.atan2(dot)
}

/// Links directed arcs end-to-start into closed rings.
///
/// Where several arcs leave one node, the sharpest left turn wins, which
/// separates lobes that touch at a single vertex.
pub(crate) fn chain_rings(boundary: &[ArcRef], arcs: &ArcPool) -> Vec<Vec<ArcRef>> {
    let mut starts: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (i, &arc) in boundary.iter().enumerate() {
        if let Some((start, _)) = arcs.endpoints(arc) {
            starts.entry(key(start)).or_default().push(i);
        }
    }
    let mut used = vec![false; boundary.len()];
    let mut rings = Vec::new();
    for seed in 0..boundary.len() {
        if used[seed] {
            continue;
        }
        let Some((origin, _)) = arcs.endpoints(boundary[seed]) else {
            continue;
        };
        used[seed] = true;
        let mut ring = vec![boundary[seed]];
        let mut current = boundary[seed];
        loop {
            let Some((_, end)) = arcs.endpoints(current) else {
                break;
            };
            if end == origin {
                rings.push(ring);
                break;
            }
            let incoming = arriving(current, arcs);
            let next = starts.get(&key(end)).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&c| !used[c])
                    .max_by(|&a, &b| {
                        let score = |i: usize| match (incoming, leaving(boundary[i], arcs)) {
                            (Some(inc), Some(out)) => turn(inc, out),
                            _ => f64::MIN,
                        };
                        score(a).total_cmp(&score(b))
                    })
            });
            match next {
                Some(n) => {
                    used[n] = true;
                    ring.push(boundary[n]);
                    current = boundary[n];
                }
                None => {
                    log::warn!("dissolve: dropping unclosed chain of {} arc(s)", ring.len());
                    break;
                }
            }
        }
    }
    rings
}

/// Concatenates the parts of every member shape.
fn gather_parts(layer: &Layer, members: &[usize]) -> Option<Shape> {
    let shapes = members.iter().filter_map(|&i| layer.shapes[i].as_ref());
    match layer.geometry_type {
        Some(GeometryType::Point) => {
            let points: Vec<Coord> = shapes
                .filter_map(Shape::points)
                .flatten()
                .copied()
                .collect();
            (!points.is_empty()).then_some(Shape::Points(points))
        }
        Some(_) => {
            let paths: Vec<Vec<ArcRef>> = shapes
                .filter_map(Shape::paths)
                .flatten()
                .cloned()
                .collect();
            (!paths.is_empty()).then_some(Shape::Paths(paths))
        }
        None => None,
    }
}

/// `dissolve`: one feature per distinct combination of `fields`.
pub fn dissolve(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = DissolveOptions::from_map(options)?;
    check_fields(layer, &opts)?;
    let groups = group_by_fields(layer, &opts.fields);
    log::debug!("dissolve: {} feature(s) into {} group(s)", layer.len(), groups.len());
    let mut out = Layer {
        name: layer.name.clone(),
        ..Layer::new(layer.geometry_type)
    };
    for members in &groups {
        let shape = match layer.geometry_type {
            Some(GeometryType::Polygon) => dissolve_rings(layer, members, arcs),
            _ => gather_parts(layer, members),
        };
        out.push(shape, group_record(layer, members, &opts));
    }
    Ok(out)
}

/// Polygon union of a sequence of multipolygons.
pub(crate) fn union_all(parts: impl IntoIterator<Item = MultiPolygon>) -> MultiPolygon {
    parts
        .into_iter()
        .reduce(|acc, mp| acc.union(&mp))
        .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

fn dissolve_overlay(layer: &Layer, arcs: &mut ArcPool, opts: &DissolveOptions) -> OpResult<Layer> {
    if layer.geometry_type != Some(GeometryType::Polygon) {
        return dissolve(layer, arcs, &opts.to_map());
    }
    check_fields(layer, opts)?;
    let groups = group_by_fields(layer, &opts.fields);
    let mut asm = ShapeAssembler::new();
    let mut out = Layer {
        name: layer.name.clone(),
        ..Layer::new(layer.geometry_type)
    };
    for members in &groups {
        let merged = union_all(
            members
                .iter()
                .filter_map(|&i| layer.shapes[i].as_ref())
                .map(|s| shape_to_multi_polygon(s, arcs)),
        );
        if merged.0.is_empty() {
            asm.push_null();
        } else {
            asm.push_multi_polygon(&merged);
        }
        out.records.push(group_record(layer, members, opts));
    }
    out.shapes = asm.finish(arcs);
    Ok(out)
}

/// `dissolve2`: overlay-based dissolve of every layer.
pub fn dissolve2(layers: &[Layer], arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Vec<Layer>> {
    let opts = DissolveOptions::from_map(options)?;
    layers
        .iter()
        .map(|layer| dissolve_overlay(layer, arcs, &opts))
        .collect()
}

/// `union`: every polygon of every layer merged into one feature.
pub fn union(layers: &[Layer], arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Vec<Layer>> {
    let opts = DissolveOptions::from_map(options)?;
    if let Some(other) = layers
        .iter()
        .find(|l| !matches!(l.geometry_type, Some(GeometryType::Polygon) | None))
    {
        return Err(OperationError::unsupported(
            "union",
            format!("{} layers", other.geometry_type.map_or("empty", |t| t.as_str())),
        ));
    }
    let merged = union_all(
        layers
            .iter()
            .flat_map(|l| l.shapes.iter().flatten())
            .map(|s| shape_to_multi_polygon(s, arcs)),
    );
    let mut asm = ShapeAssembler::new();
    asm.push_multi_polygon(&merged);
    let mut out = Layer {
        name: layers.first().and_then(|l| l.name.clone()),
        ..Layer::new(Some(GeometryType::Polygon))
    };
    let mut record = Record::new();
    for field in &opts.copy_fields {
        let value = layers
            .iter()
            .flat_map(|l| &l.records)
            .find_map(|r| r.get(field).cloned())
            .unwrap_or(Value::Null);
        record.insert(field.clone(), value);
    }
    out.shapes = asm.finish(arcs);
    out.records.push(record);
    Ok(vec![out])
}
