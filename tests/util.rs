#![allow(dead_code)]
use serde_json::{Value, json};
use topo_shaper::io::{Feature, FeatureCollection, Geometry};

/// Feature with `geometry` and `properties`.
pub fn feature(geometry: Value, properties: Value) -> Value {
    json!({ "type": "Feature", "geometry": geometry, "properties": properties })
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

pub fn point(x: f64, y: f64) -> Value {
    json!({ "type": "Point", "coordinates": [x, y] })
}

/// Axis-aligned rectangle polygon, exterior counter-clockwise.
pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
    })
}

/// Two unit squares sharing the edge x = 1.
pub fn adjacent_squares(props_a: Value, props_b: Value) -> Value {
    collection(vec![
        feature(rect(0.0, 0.0, 1.0, 1.0), props_a),
        feature(rect(1.0, 0.0, 2.0, 1.0), props_b),
    ])
}

fn ring_area(ring: &[[f64; 2]]) -> f64 {
    ring.windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum::<f64>()
        / 2.0
}

fn polygon_area(rings: &[Vec<[f64; 2]>]) -> f64 {
    let mut rings = rings.iter();
    let exterior = rings.next().map_or(0.0, |r| ring_area(r).abs());
    exterior - rings.map(|r| ring_area(r).abs()).sum::<f64>()
}

/// Unsigned area of a polygonal geometry; zero for anything else.
pub fn area(geometry: Option<&Geometry>) -> f64 {
    match geometry {
        Some(Geometry::Polygon { coordinates }) => polygon_area(coordinates),
        Some(Geometry::MultiPolygon { coordinates }) => {
            coordinates.iter().map(|p| polygon_area(p)).sum()
        }
        _ => 0.0,
    }
}

pub fn total_area(fc: &FeatureCollection) -> f64 {
    fc.features.iter().map(|f| area(f.geometry.as_ref())).sum()
}

/// Every vertex of a geometry, in output order.
pub fn positions(geometry: Option<&Geometry>) -> Vec<[f64; 2]> {
    match geometry {
        None => Vec::new(),
        Some(Geometry::Point { coordinates }) => vec![*coordinates],
        Some(Geometry::MultiPoint { coordinates }) | Some(Geometry::LineString { coordinates }) => {
            coordinates.clone()
        }
        Some(Geometry::MultiLineString { coordinates }) | Some(Geometry::Polygon { coordinates }) => {
            coordinates.concat()
        }
        Some(Geometry::MultiPolygon { coordinates }) => {
            coordinates.iter().flat_map(|p| p.concat()).collect()
        }
        Some(Geometry::GeometryCollection { geometries }) => geometries
            .iter()
            .flat_map(|g| positions(Some(g)))
            .collect(),
    }
}

pub fn prop<'a>(feature: &'a Feature, name: &str) -> &'a Value {
    feature.properties.get(name).unwrap_or(&Value::Null)
}

pub fn close(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// Whether two closed rings visit the same vertices in the same direction,
/// allowing a different starting vertex.
pub fn same_ring(a: &[[f64; 2]], b: &[[f64; 2]], eps: f64) -> bool {
    let open = |r: &[[f64; 2]]| -> Vec<[f64; 2]> {
        match r {
            [first, .., last] if first == last => r[..r.len() - 1].to_vec(),
            _ => r.to_vec(),
        }
    };
    let (a, b) = (open(a), open(b));
    if a.len() != b.len() {
        return false;
    }
    let eq = |p: [f64; 2], q: [f64; 2]| close(p[0], q[0], eps) && close(p[1], q[1], eps);
    (0..b.len()).any(|shift| (0..a.len()).all(|i| eq(a[i], b[(i + shift) % b.len()])))
}

/// Rings of a single-polygon geometry.
pub fn polygon_rings(geometry: Option<&Geometry>) -> Vec<Vec<[f64; 2]>> {
    match geometry {
        Some(Geometry::Polygon { coordinates }) => coordinates.clone(),
        other => panic!("expected a polygon, got {other:?}"),
    }
}
