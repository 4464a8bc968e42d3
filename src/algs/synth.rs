//! Layers built from nothing: rectangle, graticule, point_grid.

use geo::Coord;
use serde_json::json;

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{GraticuleOptions, OptionMap, Options, PointGridOptions, RectangleOptions};
use crate::geometry::convert::ShapeAssembler;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer, Record, Shape};

const MAX_GRID_POINTS: usize = 10_000_000;

fn checked_bbox(bbox: Option<[f64; 4]>) -> OpResult<[f64; 4]> {
    let b = bbox.ok_or_else(|| OperationError::InvalidOption {
        name: "bbox".into(),
        reason: "missing".into(),
    })?;
    if b.iter().any(|v| !v.is_finite()) || b[0] > b[2] || b[1] > b[3] {
        return Err(OperationError::InvalidOption {
            name: "bbox".into(),
            reason: format!("expected [xmin, ymin, xmax, ymax], got {b:?}"),
        });
    }
    Ok(b)
}

fn record(v: serde_json::Value) -> Record {
    match v {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Evenly spaced values from `start` to `end` inclusive.
fn steps(start: f64, end: f64, interval: f64) -> impl Iterator<Item = f64> {
    let n = ((end - start) / interval + 1e-9).floor() as usize;
    (0..=n).map(move |i| start + i as f64 * interval)
}

/// `rectangle`: one polygon covering `bbox`, grown by `offset`.
pub fn rectangle(arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = RectangleOptions::from_map(options)?;
    let [xmin, ymin, xmax, ymax] = checked_bbox(opts.bbox)?;
    let d = opts.offset;
    let (xmin, ymin, xmax, ymax) = (xmin - d, ymin - d, xmax + d, ymax + d);
    if xmin >= xmax || ymin >= ymax {
        return Err(OperationError::InvalidOption {
            name: "bbox".into(),
            reason: "rectangle has no area".into(),
        });
    }
    let ring = vec![
        Coord { x: xmin, y: ymin },
        Coord { x: xmax, y: ymin },
        Coord { x: xmax, y: ymax },
        Coord { x: xmin, y: ymax },
        Coord { x: xmin, y: ymin },
    ];
    let mut asm = ShapeAssembler::new();
    asm.push_rings([ring]);
    Ok(Layer {
        name: Some("rectangle".into()),
        geometry_type: Some(GeometryType::Polygon),
        shapes: asm.finish(arcs),
        records: vec![Record::new()],
    })
}

/// `graticule`: meridians and parallels every `interval` degrees.
///
/// Each line is one feature with `type` (`meridian` or `parallel`) and
/// `value` (its longitude or latitude).
pub fn graticule(arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = GraticuleOptions::from_map(options)?;
    let interval = opts.interval;
    if !(interval > 0.0 && interval <= 90.0) {
        return Err(OperationError::InvalidOption {
            name: "interval".into(),
            reason: format!("expected degrees in (0, 90], got {interval}"),
        });
    }
    let mut asm = ShapeAssembler::new();
    let mut records = Vec::new();
    for lon in steps(-180.0, 180.0, interval) {
        let path: Vec<Coord> = steps(-90.0, 90.0, interval)
            .chain((90.0 % interval != 0.0).then_some(90.0))
            .map(|lat| Coord { x: lon, y: lat })
            .collect();
        asm.push_paths([path]);
        records.push(record(json!({ "type": "meridian", "value": lon })));
    }
    for lat in steps(-90.0, 90.0, interval).filter(|lat| lat.abs() < 90.0) {
        let path: Vec<Coord> = steps(-180.0, 180.0, interval)
            .chain((180.0 % interval != 0.0).then_some(180.0))
            .map(|lon| Coord { x: lon, y: lat })
            .collect();
        asm.push_paths([path]);
        records.push(record(json!({ "type": "parallel", "value": lat })));
    }
    log::debug!("graticule: {} line(s) every {interval} degrees", records.len());
    Ok(Layer {
        name: Some("graticule".into()),
        geometry_type: Some(GeometryType::Polyline),
        shapes: asm.finish(arcs),
        records,
    })
}

/// `point_grid`: one point feature every `interval` units across `bbox`,
/// starting at its lower-left corner.
pub fn point_grid(_arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Layer> {
    let opts = PointGridOptions::from_map(options)?;
    let [xmin, ymin, xmax, ymax] = checked_bbox(opts.bbox)?;
    let interval = match opts.interval {
        Some(i) if i > 0.0 && i.is_finite() => i,
        other => {
            return Err(OperationError::InvalidOption {
                name: "interval".into(),
                reason: format!("expected a positive number, got {other:?}"),
            });
        }
    };
    let cols = ((xmax - xmin) / interval + 1e-9).floor() + 1.0;
    let rows = ((ymax - ymin) / interval + 1e-9).floor() + 1.0;
    if cols * rows > MAX_GRID_POINTS as f64 {
        return Err(OperationError::InvalidOption {
            name: "interval".into(),
            reason: format!("grid would hold {} points", cols * rows),
        });
    }
    let mut layer = Layer::new(Some(GeometryType::Point));
    layer.name = Some("grid".into());
    for y in steps(ymin, ymax, interval) {
        for x in steps(xmin, xmax, interval) {
            layer.push(Some(Shape::Points(vec![Coord { x, y }])), Record::new());
        }
    }
    Ok(layer)
}
