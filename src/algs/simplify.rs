//! Arc simplification.
//!
//! Simplification edits arcs, not shapes: every feature that references an
//! arc sees the same simplified vertices, so shared boundaries never open
//! gaps or overlaps. Arc endpoints are nodes and are always kept.

use geo::{Coord, LineString, Simplify, SimplifyVw};
use hashbrown::{HashMap, HashSet};

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{OptionMap, Options, SimplifyMethod, SimplifyOptions};
use crate::geometry::metrics::ring_signed_area;
use crate::topology::arc::ArcRef;
use crate::topology::arc_pool::{ArcPool, bbox_of};
use crate::topology::layer::{GeometryType, Layer};

const DEFAULT_PERCENTAGE: f64 = 0.1;
const SEARCH_STEPS: usize = 48;

fn simplify_arc(coords: &[Coord], method: SimplifyMethod, interval: f64) -> Vec<Coord> {
    if coords.len() <= 2 || interval <= 0.0 {
        return coords.to_vec();
    }
    let line = LineString::new(coords.to_vec());
    let out = match method {
        SimplifyMethod::Dp => line.simplify(&interval),
        // effective-area threshold for a triangle of height `interval`
        SimplifyMethod::Visvalingam => line.simplify_vw(&(interval * interval)),
    };
    let closed = coords.first() == coords.last();
    if closed && out.0.len() < 4 {
        return coords.to_vec();
    }
    out.0
}

fn interior(coords: &[Coord]) -> usize {
    coords.len().saturating_sub(2)
}

fn layer_arcs(layer: &Layer) -> Vec<usize> {
    let mut seen = HashSet::new();
    layer
        .shapes
        .iter()
        .flatten()
        .flat_map(|s| s.arcs())
        .map(ArcRef::index)
        .filter(|&i| seen.insert(i))
        .collect()
}

/// Largest interval that keeps at least `fraction` of the removable
/// vertices of `selected`.
fn interval_for_fraction(arcs: &ArcPool, selected: &[usize], method: SimplifyMethod, fraction: f64) -> f64 {
    let total: usize = selected.iter().map(|&i| interior(arcs.arc(i))).sum();
    let target = (fraction * total as f64).round() as usize;
    if target >= total {
        return 0.0;
    }
    let extent = bbox_of(selected.iter().flat_map(|&i| arcs.arc(i).iter().copied()))
        .map_or(0.0, |r| r.width().hypot(r.height()));
    let (mut lo, mut hi) = (0.0, extent + 1.0);
    if target == 0 {
        return hi;
    }
    let retained = |interval: f64| -> usize {
        selected
            .iter()
            .map(|&i| interior(&simplify_arc(arcs.arc(i), method, interval)))
            .sum()
    };
    for _ in 0..SEARCH_STEPS {
        let mid = (lo + hi) / 2.0;
        if retained(mid) >= target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

fn resolve_interval(opts: &SimplifyOptions, arcs: &ArcPool, selected: &[usize]) -> OpResult<f64> {
    if let Some(interval) = opts.interval {
        if interval < 0.0 || !interval.is_finite() {
            return Err(OperationError::InvalidOption {
                name: "interval".into(),
                reason: format!("expected a non-negative number, got {interval}"),
            });
        }
        return Ok(interval);
    }
    if let Some(resolution) = opts.resolution {
        if resolution <= 0.0 || !resolution.is_finite() {
            return Err(OperationError::InvalidOption {
                name: "resolution".into(),
                reason: format!("expected a positive number, got {resolution}"),
            });
        }
        let side = bbox_of(selected.iter().flat_map(|&i| arcs.arc(i).iter().copied()))
            .map_or(0.0, |r| r.width().max(r.height()));
        return Ok(side / resolution);
    }
    let mut pct = opts.percentage.unwrap_or(DEFAULT_PERCENTAGE);
    if pct > 1.0 {
        pct /= 100.0;
    }
    if !(0.0..=1.0).contains(&pct) {
        return Err(OperationError::InvalidOption {
            name: "percentage".into(),
            reason: format!("expected a value between 0 and 100, got {pct}"),
        });
    }
    Ok(interval_for_fraction(arcs, selected, opts.method, pct))
}

/// Reverts the arcs of polygon rings that would collapse or flip.
fn protect_rings(layer: &Layer, arcs: &ArcPool, simplified: &mut HashMap<usize, Vec<Coord>>) {
    let coords_of = |arc: ArcRef, simplified: &HashMap<usize, Vec<Coord>>| -> Vec<Coord> {
        let base = simplified
            .get(&arc.index())
            .cloned()
            .unwrap_or_else(|| arcs.arc(arc.index()).to_vec());
        if arc.is_reversed() {
            base.into_iter().rev().collect()
        } else {
            base
        }
    };
    for ring in layer.shapes.iter().flatten().filter_map(|s| s.paths()).flatten() {
        let mut coords: Vec<Coord> = Vec::new();
        for &arc in ring {
            let skip = usize::from(!coords.is_empty());
            coords.extend(coords_of(arc, simplified).into_iter().skip(skip));
        }
        let before = ring_signed_area(&arcs.path_coords(ring));
        let after = ring_signed_area(&coords);
        if before != 0.0 && (after == 0.0 || after.signum() != before.signum()) {
            for arc in ring {
                simplified.remove(&arc.index());
            }
        }
    }
}

/// `simplify`: removes arc vertices of the layer by Douglas-Peucker or
/// Visvalingam.
pub fn simplify(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = SimplifyOptions::from_map(options)?;
    let selected = layer_arcs(layer);
    if selected.is_empty() {
        return Ok(());
    }
    let interval = resolve_interval(&opts, arcs, &selected)?;
    let mut simplified: HashMap<usize, Vec<Coord>> = selected
        .iter()
        .map(|&i| (i, simplify_arc(arcs.arc(i), opts.method, interval)))
        .collect();
    if opts.keep_shapes && layer.geometry_type == Some(GeometryType::Polygon) {
        protect_rings(layer, arcs, &mut simplified);
    }
    let before = arcs.vertex_count();
    arcs.rebuild(|i, coords| simplified.remove(&i).unwrap_or_else(|| coords.to_vec()));
    log::debug!(
        "simplify: interval {interval:.6}, vertices {before} -> {}",
        arcs.vertex_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::import::{ImportOptions, import_geojson};
    use serde_json::{Value, json};

    fn opts(v: Value) -> OptionMap {
        v.as_object().cloned().unwrap()
    }

    fn wiggly_line() -> crate::topology::dataset::Dataset {
        let coords: Vec<[f64; 2]> = (0..=40)
            .map(|i| {
                let x = i as f64;
                [x, (x * 0.7).sin() * (1.0 + x / 10.0)]
            })
            .collect();
        import_geojson(&json!({ "type": "LineString", "coordinates": coords }), &ImportOptions::default())
            .unwrap()
    }

    #[test]
    fn zero_percentage_keeps_only_endpoints() {
        let mut ds = wiggly_line();
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        simplify(layer, arcs, &opts(json!({ "percentage": 0 }))).unwrap();
        assert_eq!(ds.arcs.vertex_count(), 2);
    }

    #[test]
    fn full_percentage_keeps_everything() {
        let mut ds = wiggly_line();
        let before = ds.arcs.vertex_count();
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        simplify(layer, arcs, &opts(json!({ "percentage": 100 }))).unwrap();
        assert_eq!(ds.arcs.vertex_count(), before);
    }

    #[test]
    fn partial_percentage_keeps_at_least_the_fraction() {
        let mut ds = wiggly_line();
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        simplify(layer, arcs, &opts(json!({ "percentage": 0.5, "method": "dp" }))).unwrap();
        let kept = ds.arcs.vertex_count() - 2;
        assert!(kept >= 20 && kept < 39, "kept {kept}");
    }

    #[test]
    fn shared_boundary_is_simplified_once() {
        let fc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Polygon",
                  "coordinates": [[[0, 0], [1, 0], [1, 0.5], [1.01, 1], [1, 1.5], [1, 2], [0, 2], [0, 0]]] } },
                { "type": "Feature", "properties": {}, "geometry": { "type": "Polygon",
                  "coordinates": [[[1, 0], [2, 0], [2, 2], [1, 2], [1, 1.5], [1.01, 1], [1, 0.5], [1, 0]]] } }
            ]
        });
        let mut ds = import_geojson(&fc, &ImportOptions::default()).unwrap();
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        simplify(layer, arcs, &opts(json!({ "interval": 0.1, "method": "dp" }))).unwrap();
        let shapes = &ds.layers[0].shapes;
        let a: HashSet<usize> = shapes[0].as_ref().unwrap().arcs().map(ArcRef::index).collect();
        let b: HashSet<usize> = shapes[1].as_ref().unwrap().arcs().map(ArcRef::index).collect();
        let shared: Vec<_> = a.intersection(&b).copied().collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(ds.arcs.arc(shared[0]).len(), 2);
    }

    #[test]
    fn negative_interval_is_rejected() {
        let mut ds = wiggly_line();
        let (layer, arcs) = ds.layer_and_arcs_mut(0).unwrap();
        assert!(simplify(layer, arcs, &opts(json!({ "interval": -1 }))).is_err());
    }
}
