//! Coordinate transforms: snap, affine, proj.
//!
//! Transforms move vertices without touching topology. Only arcs referenced
//! by the layer being transformed are rewritten, so a layer never moves
//! geometry that belongs to another layer of the same dataset.

use std::f64::consts::{FRAC_PI_4, PI};

use geo::Coord;
use hashbrown::HashSet;

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{AffineOptions, OptionMap, Options, ProjOptions, SnapOptions};
use crate::geometry::metrics::shape_bbox;
use crate::topology::arc::ArcRef;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{Layer, Shape};

/// Coordinate update strategies for layer transforms.
pub enum CoordinateTransform<'a> {
    /// Update coordinates using a user-supplied function.
    Function(&'a dyn Fn(Coord) -> Coord),
    /// Apply a 2x3 affine matrix `[a, b, c, d, xoff, yoff]`.
    Affine([f64; 6]),
}

impl CoordinateTransform<'_> {
    fn apply(&self, c: Coord) -> Coord {
        match self {
            CoordinateTransform::Function(f) => f(c),
            CoordinateTransform::Affine([a, b, cc, d, xo, yo]) => Coord {
                x: a * c.x + b * c.y + xo,
                y: cc * c.x + d * c.y + yo,
            },
        }
    }
}

/// Apply a coordinate transform to a layer's points and arcs, leaving
/// topology unchanged.
pub fn transform_layer(layer: &mut Layer, arcs: &mut ArcPool, transform: CoordinateTransform<'_>) {
    let used: HashSet<usize> = layer
        .shapes
        .iter()
        .flatten()
        .flat_map(|s| s.arcs())
        .map(ArcRef::index)
        .collect();
    if !used.is_empty() {
        arcs.rebuild(|i, coords| {
            if used.contains(&i) {
                coords.iter().map(|&c| transform.apply(c)).collect()
            } else {
                coords.to_vec()
            }
        });
    }
    for shape in layer.shapes.iter_mut().flatten() {
        if let Shape::Points(points) = shape {
            points.iter_mut().for_each(|p| *p = transform.apply(*p));
        }
    }
}

fn round_to(v: f64, precision: f64) -> f64 {
    (v / precision).round() * precision
}

fn dedup(coords: Vec<Coord>) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(coords.len());
    for c in coords {
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    out
}

/// `snap`: rounds vertices to a multiple of `precision` and removes the
/// consecutive duplicates this creates. Without `precision` only existing
/// duplicates are removed.
///
/// Arcs whose endpoints merge keep a two-vertex stub so references stay
/// valid.
pub fn snap(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = SnapOptions::from_map(options)?;
    let precision = match opts.precision {
        Some(p) if p > 0.0 && p.is_finite() => Some(p),
        Some(p) => {
            return Err(OperationError::InvalidOption {
                name: "precision".into(),
                reason: format!("expected a positive number, got {p}"),
            });
        }
        None => None,
    };
    let snap_coord = |c: Coord| match precision {
        Some(p) => Coord {
            x: round_to(c.x, p),
            y: round_to(c.y, p),
        },
        None => c,
    };
    let used: HashSet<usize> = layer
        .shapes
        .iter()
        .flatten()
        .flat_map(|s| s.arcs())
        .map(ArcRef::index)
        .collect();
    let before = arcs.vertex_count();
    arcs.rebuild(|i, coords| {
        if !used.contains(&i) {
            return coords.to_vec();
        }
        let snapped = dedup(coords.iter().map(|&c| snap_coord(c)).collect());
        match snapped.len() {
            0 | 1 => coords.first().map(|&c| vec![snap_coord(c); 2]).unwrap_or_default(),
            _ => snapped,
        }
    });
    for shape in layer.shapes.iter_mut().flatten() {
        if let Shape::Points(points) = shape {
            let snapped = dedup(points.iter().map(|&p| snap_coord(p)).collect());
            *points = snapped;
        }
    }
    log::debug!("snap: vertices {before} -> {}", arcs.vertex_count());
    Ok(())
}

/// `affine`: shift, scale and rotate about `anchor` (the layer's bbox
/// center by default).
pub fn affine(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = AffineOptions::from_map(options)?;
    let anchor = match opts.anchor {
        Some([x, y]) => Coord { x, y },
        None => layer
            .shapes
            .iter()
            .flatten()
            .filter_map(|s| shape_bbox(s, arcs))
            .reduce(|a, b| {
                geo::Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
            .map_or(Coord { x: 0.0, y: 0.0 }, |r| r.center()),
    };
    let scale = opts.scale.unwrap_or(1.0);
    let theta = opts.rotate.unwrap_or(0.0).to_radians();
    let [dx, dy] = opts.shift.unwrap_or([0.0, 0.0]);
    let (sin, cos) = theta.sin_cos();
    let (a, b, c, d) = (scale * cos, -scale * sin, scale * sin, scale * cos);
    // p' = M (p - anchor) + anchor + shift
    let matrix = [
        a,
        b,
        c,
        d,
        anchor.x - a * anchor.x - b * anchor.y + dx,
        anchor.y - c * anchor.x - d * anchor.y + dy,
    ];
    transform_layer(layer, arcs, CoordinateTransform::Affine(matrix));
    Ok(())
}

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Crs {
    Wgs84,
    WebMercator,
}

fn parse_crs(name: &str) -> OpResult<Crs> {
    match name.trim().to_ascii_lowercase().as_str() {
        "wgs84" | "epsg:4326" | "latlong" | "lonlat" => Ok(Crs::Wgs84),
        "webmercator" | "epsg:3857" | "epsg:900913" | "mercator" => Ok(Crs::WebMercator),
        _ => Err(OperationError::unsupported("proj", format!("coordinate system `{name}`"))),
    }
}

fn to_mercator(c: Coord) -> Coord {
    let lat = c.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    Coord {
        x: EARTH_RADIUS * c.x.to_radians(),
        y: EARTH_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

fn from_mercator(c: Coord) -> Coord {
    Coord {
        x: (c.x / EARTH_RADIUS).to_degrees(),
        y: (2.0 * (c.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    }
}

/// `proj`: converts between WGS84 longitude/latitude and spherical Web
/// Mercator.
pub fn proj(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = ProjOptions::from_map(options)?;
    let dest = opts.crs.as_deref().ok_or_else(|| OperationError::InvalidOption {
        name: "crs".into(),
        reason: "missing".into(),
    })?;
    let dest = parse_crs(dest)?;
    let from = opts.from.as_deref().map_or(Ok(Crs::Wgs84), parse_crs)?;
    log::debug!("proj: {from:?} -> {dest:?}");
    let f: fn(Coord) -> Coord = match (from, dest) {
        (Crs::Wgs84, Crs::WebMercator) => to_mercator,
        (Crs::WebMercator, Crs::Wgs84) => from_mercator,
        _ => return Ok(()),
    };
    transform_layer(layer, arcs, CoordinateTransform::Function(&f));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::import::{ImportOptions, import_geojson};
    use crate::topology::dataset::Dataset;
    use geo::coord;
    use serde_json::{Value, json};

    fn opts(v: Value) -> OptionMap {
        v.as_object().cloned().unwrap()
    }

    fn line(coords: Value) -> Dataset {
        import_geojson(&json!({ "type": "LineString", "coordinates": coords }), &ImportOptions::default())
            .unwrap()
    }

    #[test]
    fn snap_rounds_and_dedups() {
        let mut ds = line(json!([[0.04, 0.0], [0.98, 0.01], [1.02, 0.0], [2.0, 0.0]]));
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        snap(layer, arcs, &opts(json!({ "precision": 0.1 }))).unwrap();
        let coords = ds.arcs.arc(0);
        assert_eq!(coords.len(), 3);
        assert!((coords[1].x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn affine_shift_and_rotate() {
        let mut ds = line(json!([[0, 0], [2, 0]]));
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        affine(layer, arcs, &opts(json!({ "rotate": 90, "shift": [10, 0] }))).unwrap();
        let coords = ds.arcs.arc(0);
        assert!((coords[0].x - 11.0).abs() < 1e-9 && (coords[0].y + 1.0).abs() < 1e-9);
        assert!((coords[1].x - 11.0).abs() < 1e-9 && (coords[1].y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mercator_round_trip() {
        let p = coord! { x: 13.4, y: 52.5 };
        let back = from_mercator(to_mercator(p));
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
        assert!((to_mercator(coord! { x: 180.0, y: 0.0 }).x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn proj_moves_points_and_rejects_unknown_crs() {
        let mut ds = import_geojson(&json!({ "type": "Point", "coordinates": [180, 0] }), &ImportOptions::default())
            .unwrap();
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        proj(layer, arcs, &opts(json!({ "crs": "EPSG:3857" }))).unwrap();
        let p = ds.layers[0].shapes[0].as_ref().unwrap().points().unwrap()[0];
        assert!((p.x - 20_037_508.342_789_244).abs() < 1e-6);
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        assert!(matches!(
            proj(layer, arcs, &opts(json!({ "crs": "EPSG:2154" }))),
            Err(OperationError::Unsupported { .. })
        ));
    }
}
