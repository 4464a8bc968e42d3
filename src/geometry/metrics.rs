//! Planar measures on rings, paths, and shapes.
//!
//! Signed areas follow the usual shoelace convention: counter-clockwise rings
//! are positive. Internally, polygon exteriors are counter-clockwise, so the
//! sum of a polygon shape's ring areas is its net area (holes subtract).

use geo::Coord;
use itertools::Itertools;

use crate::topology::arc_pool::{ArcPool, bbox_of};
use crate::topology::layer::{GeometryType, Shape};

/// Signed area of a ring; the closing vertex may be present or not.
pub fn ring_signed_area(ring: &[Coord]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let n = ring.len();
    let sum: f64 = (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    sum / 2.0
}

/// Euclidean length of a path.
pub fn path_length(path: &[Coord]) -> f64 {
    path.iter()
        .tuple_windows()
        .map(|(a, b)| (b.x - a.x).hypot(b.y - a.y))
        .sum()
}

/// Area-weighted centroid of a ring with its signed area.
pub fn ring_centroid(ring: &[Coord]) -> Option<(Coord, f64)> {
    let area = ring_signed_area(ring);
    if area == 0.0 {
        return None;
    }
    let n = ring.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    Some((
        Coord {
            x: cx / (6.0 * area),
            y: cy / (6.0 * area),
        },
        area,
    ))
}

/// Even-odd point-in-ring test. Points on the boundary may go either way.
pub fn point_in_ring(p: Coord, ring: &[Coord]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Resolved coordinates of every part of a path shape.
pub fn resolve_parts(shape: &Shape, arcs: &ArcPool) -> Vec<Vec<Coord>> {
    match shape {
        Shape::Paths(parts) => parts.iter().map(|p| arcs.path_coords(p)).collect(),
        Shape::Points(points) => points.iter().map(|&p| vec![p]).collect(),
    }
}

/// Net planar area of a polygon shape (0 for other kinds).
pub fn shape_area(shape: &Shape, arcs: &ArcPool) -> f64 {
    match shape {
        Shape::Paths(parts) => parts
            .iter()
            .map(|p| ring_signed_area(&arcs.path_coords(p)))
            .sum(),
        Shape::Points(_) => 0.0,
    }
}

/// Total length of all parts of a path shape.
pub fn shape_length(shape: &Shape, arcs: &ArcPool) -> f64 {
    match shape {
        Shape::Paths(parts) => parts
            .iter()
            .map(|p| path_length(&arcs.path_coords(p)))
            .sum(),
        Shape::Points(_) => 0.0,
    }
}

/// Centroid of a shape interpreted according to the layer type.
///
/// Polygons use area weighting, polylines length weighting of segment
/// midpoints, points the mean position.
pub fn shape_centroid(shape: &Shape, arcs: &ArcPool, ty: GeometryType) -> Option<Coord> {
    match (shape, ty) {
        (Shape::Points(points), _) => {
            if points.is_empty() {
                return None;
            }
            let n = points.len() as f64;
            let (sx, sy) = points.iter().fold((0.0, 0.0), |(x, y), c| (x + c.x, y + c.y));
            Some(Coord { x: sx / n, y: sy / n })
        }
        (Shape::Paths(parts), GeometryType::Polygon) => {
            let (mut cx, mut cy, mut total) = (0.0, 0.0, 0.0);
            for part in parts {
                if let Some((c, a)) = ring_centroid(&arcs.path_coords(part)) {
                    cx += c.x * a;
                    cy += c.y * a;
                    total += a;
                }
            }
            (total != 0.0).then(|| Coord {
                x: cx / total,
                y: cy / total,
            })
        }
        (Shape::Paths(parts), _) => {
            let (mut cx, mut cy, mut total) = (0.0, 0.0, 0.0);
            for coords in parts.iter().map(|p| arcs.path_coords(p)) {
                for (a, b) in coords.iter().tuple_windows() {
                    let len = (b.x - a.x).hypot(b.y - a.y);
                    cx += (a.x + b.x) / 2.0 * len;
                    cy += (a.y + b.y) / 2.0 * len;
                    total += len;
                }
            }
            if total > 0.0 {
                Some(Coord {
                    x: cx / total,
                    y: cy / total,
                })
            } else {
                parts
                    .first()
                    .and_then(|p| arcs.path_coords(p).first().copied())
            }
        }
    }
}

/// Bounding box of a shape.
pub fn shape_bbox(shape: &Shape, arcs: &ArcPool) -> Option<geo::Rect> {
    match shape {
        Shape::Points(points) => bbox_of(points.iter().copied()),
        Shape::Paths(parts) => bbox_of(parts.iter().flatten().flat_map(|&a| arcs.traverse(a))),
    }
}
