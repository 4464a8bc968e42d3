//! Polygon overlay commands: clip, erase, mosaic, clean, inlay, divide.
//!
//! Overlay results are computed on resolved `geo` geometry and written back
//! through a [`ShapeAssembler`], so every output shape references new arcs
//! appended to the target pool. Geometry taken from a second dataset is
//! resolved against that dataset's pool and never referenced directly.

use geo::{Area, BooleanOps, Coord, Intersects, MultiLineString, MultiPolygon, Point, Polygon, Rect};

use crate::algs::dissolve::union_all;
use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{CleanOptions, ClipOptions, OptionMap, Options, PassThroughOptions};
use crate::geometry::convert::{ShapeAssembler, shape_to_multi_line, shape_to_multi_polygon};
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer, Record, Shape};

/// Union of every polygon in `layer`.
fn polygon_mask(layer: &Layer, arcs: &ArcPool, op: &'static str) -> OpResult<MultiPolygon> {
    match layer.geometry_type {
        Some(GeometryType::Polygon) => Ok(union_all(
            layer
                .shapes
                .iter()
                .flatten()
                .map(|s| shape_to_multi_polygon(s, arcs)),
        )),
        Some(other) => Err(OperationError::unsupported(
            op,
            format!("{} layers as the second dataset", other.as_str()),
        )),
        None => Ok(MultiPolygon::new(Vec::new())),
    }
}

fn bbox_polygon(b: [f64; 4]) -> Polygon {
    Rect::new(Coord { x: b[0], y: b[1] }, Coord { x: b[2], y: b[3] }).to_polygon()
}

#[derive(Copy, Clone, PartialEq)]
enum Mode {
    Keep,
    Remove,
}

/// Clips or erases one layer against `mask`.
///
/// Features left without geometry are removed. Features that had no
/// geometry to begin with are kept by erase and dropped by clip.
fn overlay_layer(layer: &Layer, mask: &MultiPolygon, arcs: &mut ArcPool, mode: Mode) -> Layer {
    let mut asm = ShapeAssembler::new();
    let mut records: Vec<Record> = Vec::new();
    for (shape, record) in layer.features() {
        let Some(shape) = shape else {
            if mode == Mode::Remove {
                asm.push_null();
                records.push(record.clone());
            }
            continue;
        };
        let kept = match (layer.geometry_type, shape) {
            (_, Shape::Points(points)) => {
                let inside: Vec<Coord> = points
                    .iter()
                    .copied()
                    .filter(|&c| mask.intersects(&Point::from(c)) == (mode == Mode::Keep))
                    .collect();
                let keep = !inside.is_empty();
                if keep {
                    asm.push_points(inside);
                }
                keep
            }
            (Some(GeometryType::Polygon), _) => {
                let mp = shape_to_multi_polygon(shape, arcs);
                let out = match mode {
                    Mode::Keep => mp.intersection(mask),
                    Mode::Remove => mp.difference(mask),
                };
                let keep = !out.0.is_empty();
                if keep {
                    asm.push_multi_polygon(&out);
                }
                keep
            }
            _ => {
                let ml = shape_to_multi_line(shape, arcs);
                let out = mask.clip(&ml, mode == Mode::Remove);
                let keep = !out.0.is_empty();
                if keep {
                    asm.push_multi_line(&out);
                }
                keep
            }
        };
        if kept {
            records.push(record.clone());
        }
    }
    let shapes = asm.finish(arcs);
    let mut out = Layer {
        name: layer.name.clone(),
        ..Layer::new(layer.geometry_type)
    };
    // a part may still collapse while arcs are built
    for (shape, record) in shapes.into_iter().zip(records) {
        if shape.is_some() || mode == Mode::Remove {
            out.push(shape, record);
        }
    }
    out
}

fn clip_mask(source: &Layer, source_arcs: &ArcPool, opts: &ClipOptions, op: &'static str) -> OpResult<MultiPolygon> {
    let mask = polygon_mask(source, source_arcs, op)?;
    Ok(match opts.bbox {
        Some(b) => mask.intersection(&MultiPolygon::new(vec![bbox_polygon(b)])),
        None => mask,
    })
}

/// `clip`: keeps the parts of every target feature inside the source
/// polygons.
pub fn clip(
    targets: &[Layer],
    source: &Layer,
    arcs: &mut ArcPool,
    source_arcs: &ArcPool,
    options: &OptionMap,
) -> OpResult<Vec<Layer>> {
    let opts = ClipOptions::from_map(options)?;
    let mask = clip_mask(source, source_arcs, &opts, "clip")?;
    Ok(targets
        .iter()
        .map(|l| overlay_layer(l, &mask, arcs, Mode::Keep))
        .collect())
}

/// `erase`: removes the parts of every target feature inside the source
/// polygons.
pub fn erase(
    targets: &[Layer],
    source: &Layer,
    arcs: &mut ArcPool,
    source_arcs: &ArcPool,
    options: &OptionMap,
) -> OpResult<Vec<Layer>> {
    let opts = ClipOptions::from_map(options)?;
    let mask = clip_mask(source, source_arcs, &opts, "erase")?;
    Ok(targets
        .iter()
        .map(|l| overlay_layer(l, &mask, arcs, Mode::Remove))
        .collect())
}

fn require_polygons(layer: &Layer, op: &'static str) -> OpResult<()> {
    match layer.geometry_type {
        Some(GeometryType::Polygon) | None => Ok(()),
        Some(other) => Err(OperationError::unsupported(op, format!("{} layers", other.as_str()))),
    }
}

fn polygons_of(layer: &Layer, arcs: &ArcPool) -> Vec<MultiPolygon> {
    layer
        .shapes
        .iter()
        .map(|s| match s {
            Some(s) => shape_to_multi_polygon(s, arcs),
            None => MultiPolygon::new(Vec::new()),
        })
        .collect()
}

/// `mosaic`: splits overlapping polygons into tiles that cover every input
/// area exactly once.
///
/// Each tile carries `n_sources`, the number of input polygons covering it.
pub fn mosaic(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    PassThroughOptions::from_map(options)?;
    require_polygons(layer, "mosaic")?;
    let mut tiles: Vec<(MultiPolygon, usize)> = Vec::new();
    for mp in polygons_of(layer, arcs).into_iter().filter(|mp| !mp.0.is_empty()) {
        let mut next = Vec::with_capacity(tiles.len() + 1);
        let mut rest = mp.clone();
        for (tile, count) in tiles {
            let inside = tile.intersection(&mp);
            let outside = tile.difference(&mp);
            rest = rest.difference(&tile);
            if !inside.0.is_empty() {
                next.push((inside, count + 1));
            }
            if !outside.0.is_empty() {
                next.push((outside, count));
            }
        }
        if !rest.0.is_empty() {
            next.push((rest, 1));
        }
        tiles = next;
    }
    log::debug!("mosaic: {} feature(s) into {} tile(s)", layer.len(), tiles.len());
    let mut asm = ShapeAssembler::new();
    for (tile, _) in &tiles {
        asm.push_multi_polygon(tile);
    }
    let mut out = Layer {
        name: layer.name.clone(),
        ..Layer::new(Some(GeometryType::Polygon))
    };
    for (shape, (_, count)) in asm.finish(arcs).into_iter().zip(&tiles) {
        if shape.is_some() {
            let mut record = Record::new();
            record.insert("n_sources".into(), (*count).into());
            out.push(shape, record);
        }
    }
    Ok(out)
}

/// `clean`: removes overlaps between features (earlier features keep the
/// contested area) and fills gaps smaller than `min_gap_area`.
///
/// A gap is a hole in the union of all features; it is merged into the
/// first feature that touches it. Features left empty are removed.
pub fn clean(layer: &Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = CleanOptions::from_map(options)?;
    require_polygons(layer, "clean")?;
    let inputs = polygons_of(layer, arcs);
    let mut pieces: Vec<MultiPolygon> = Vec::with_capacity(inputs.len());
    let mut covered = MultiPolygon::new(Vec::new());
    for mp in &inputs {
        let piece = if opts.allow_overlaps || covered.0.is_empty() {
            mp.clone()
        } else {
            mp.difference(&covered)
        };
        covered = covered.union(mp);
        pieces.push(piece);
    }
    let min_gap = opts.min_gap_area.unwrap_or(0.0);
    if min_gap > 0.0 {
        let gaps = covered
            .0
            .iter()
            .flat_map(|p| p.interiors())
            .map(|ring| Polygon::new(ring.clone(), Vec::new()))
            .filter(|g| g.unsigned_area() < min_gap);
        for gap in gaps {
            if let Some(piece) = pieces.iter_mut().find(|p| p.intersects(&gap)) {
                *piece = piece.union(&MultiPolygon::new(vec![gap]));
            }
        }
    }
    let mut asm = ShapeAssembler::new();
    for piece in &pieces {
        if piece.0.is_empty() {
            asm.push_null();
        } else {
            asm.push_multi_polygon(piece);
        }
    }
    let mut out = Layer {
        name: layer.name.clone(),
        ..Layer::new(layer.geometry_type)
    };
    for (shape, record) in asm.finish(arcs).into_iter().zip(&layer.records) {
        if shape.is_some() {
            out.push(shape, record.clone());
        }
    }
    log::debug!("clean: {} of {} feature(s) kept", out.len(), layer.len());
    Ok(out)
}

/// `inlay`: cuts the source polygons into every target polygon layer and
/// appends the source features, attributes included.
pub fn inlay(
    targets: &[Layer],
    source: &Layer,
    arcs: &mut ArcPool,
    source_arcs: &ArcPool,
    options: &OptionMap,
) -> OpResult<Vec<Layer>> {
    PassThroughOptions::from_map(options)?;
    let mask = polygon_mask(source, source_arcs, "inlay")?;
    targets
        .iter()
        .map(|layer| {
            require_polygons(layer, "inlay")?;
            let mut out = overlay_layer(layer, &mask, arcs, Mode::Remove);
            out.geometry_type = Some(GeometryType::Polygon);
            let mut asm = ShapeAssembler::new();
            let mut records = Vec::new();
            for (shape, record) in source.features() {
                let Some(shape) = shape else { continue };
                asm.push_multi_polygon(&shape_to_multi_polygon(shape, source_arcs));
                records.push(record.clone());
            }
            for (shape, record) in asm.finish(arcs).into_iter().zip(records) {
                out.push(shape, record);
            }
            Ok(out)
        })
        .collect()
}

/// `divide`: splits target polylines where they cross divider polygons.
///
/// Each piece inside a divider polygon copies that divider's attributes
/// (target attributes win on name clashes); the pieces outside every
/// divider keep the original record alone.
pub fn divide(
    targets: &[Layer],
    source: &Layer,
    arcs: &mut ArcPool,
    source_arcs: &ArcPool,
    options: &OptionMap,
) -> OpResult<Vec<Layer>> {
    PassThroughOptions::from_map(options)?;
    let mask = polygon_mask(source, source_arcs, "divide")?;
    let dividers: Vec<(MultiPolygon, &Record)> = source
        .features()
        .filter_map(|(s, r)| s.map(|s| (shape_to_multi_polygon(s, source_arcs), r)))
        .collect();
    targets
        .iter()
        .map(|layer| {
            if layer.geometry_type != Some(GeometryType::Polyline) {
                return Err(OperationError::unsupported(
                    "divide",
                    format!("{} layers", layer.geometry_type.map_or("empty", |t| t.as_str())),
                ));
            }
            let mut asm = ShapeAssembler::new();
            let mut records = Vec::new();
            for (shape, record) in layer.features() {
                let Some(shape) = shape else {
                    asm.push_null();
                    records.push(record.clone());
                    continue;
                };
                let ml = shape_to_multi_line(shape, arcs);
                for (poly, attrs) in &dividers {
                    let inside: MultiLineString = poly.clip(&ml, false);
                    if inside.0.is_empty() {
                        continue;
                    }
                    let mut merged = record.clone();
                    for (k, v) in attrs.iter() {
                        merged.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                    asm.push_multi_line(&inside);
                    records.push(merged);
                }
                let outside = mask.clip(&ml, true);
                if !outside.0.is_empty() {
                    asm.push_multi_line(&outside);
                    records.push(record.clone());
                }
            }
            let mut out = Layer {
                name: layer.name.clone(),
                ..Layer::new(layer.geometry_type)
            };
            for (shape, record) in asm.finish(arcs).into_iter().zip(records) {
                out.push(shape, record);
            }
            Ok(out)
        })
        .collect()
}
