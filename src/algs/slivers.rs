//! Removal of small polygon rings: filter_slivers and filter_islands.

use geo::Coord;
use hashbrown::HashMap;

use crate::algs::error::OpResult;
use crate::api::options::{FilterIslandsOptions, FilterSliversOptions, OptionMap, Options};
use crate::geometry::metrics::{point_in_ring, ring_signed_area};
use crate::topology::arc::ArcRef;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer, Shape};

/// Resolved ring with its arc chain.
struct Ring<'a> {
    arcs: &'a [ArcRef],
    coords: Vec<Coord>,
    area: f64,
}

/// Rings of `parts` that survive `remove`, plus holes still inside a kept
/// exterior.
fn kept_rings(
    parts: &[Vec<ArcRef>],
    arcs: &ArcPool,
    remove: &impl Fn(&Ring<'_>) -> bool,
) -> Vec<Vec<ArcRef>> {
    let rings: Vec<Ring<'_>> = parts
        .iter()
        .map(|p| {
            let coords = arcs.path_coords(p);
            let area = ring_signed_area(&coords);
            Ring { arcs: p, coords, area }
        })
        .collect();
    let mut keep: Vec<bool> = rings.iter().map(|r| !remove(r)).collect();
    let exteriors: Vec<usize> = (0..rings.len())
        .filter(|&i| keep[i] && rings[i].area > 0.0)
        .collect();
    for (i, ring) in rings.iter().enumerate() {
        if keep[i] && ring.area < 0.0 {
            keep[i] = ring.coords.first().is_some_and(|&probe| {
                exteriors
                    .iter()
                    .any(|&e| point_in_ring(probe, &rings[e].coords))
            });
        }
    }
    rings
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(r, _)| r.arcs.to_vec())
        .collect()
}

/// Drops every ring for which `remove` holds and returns how many went.
fn drop_rings(layer: &mut Layer, arcs: &ArcPool, remove: impl Fn(&Ring<'_>) -> bool) -> usize {
    let mut removed = 0;
    for shape in layer.shapes.iter_mut() {
        let Some(Shape::Paths(parts)) = shape.as_ref() else {
            continue;
        };
        let kept = kept_rings(parts, arcs, &remove);
        removed += parts.len() - kept.len();
        *shape = (!kept.is_empty()).then_some(Shape::Paths(kept));
    }
    removed
}

fn remove_empty(layer: &mut Layer, had_shape: &[bool]) {
    let now: Vec<bool> = layer.shapes.iter().map(Option::is_some).collect();
    layer.retain_indices(|i| now[i] || !had_shape[i]);
}

/// `filter_slivers`: removes rings whose area is below `min_area`
/// (zero-area rings are always removed).
pub fn filter_slivers(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = FilterSliversOptions::from_map(options)?;
    if layer.geometry_type != Some(GeometryType::Polygon) {
        return Ok(());
    }
    let min_area = opts.min_area.unwrap_or(0.0);
    let had_shape: Vec<bool> = layer.shapes.iter().map(Option::is_some).collect();
    let removed = drop_rings(layer, arcs, |r| r.area == 0.0 || r.area.abs() < min_area);
    if opts.remove_empty {
        remove_empty(layer, &had_shape);
    }
    log::debug!("filter_slivers: removed {removed} ring(s)");
    Ok(())
}

/// `filter_islands`: removes exterior rings that share no arc with any
/// other ring of the layer and are smaller than `min_area` or have fewer
/// than `min_vertices` vertices.
pub fn filter_islands(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = FilterIslandsOptions::from_map(options)?;
    if layer.geometry_type != Some(GeometryType::Polygon) {
        return Ok(());
    }
    let mut uses: HashMap<usize, usize> = HashMap::new();
    for arc in layer.shapes.iter().flatten().flat_map(|s| s.arcs()) {
        *uses.entry(arc.index()).or_default() += 1;
    }
    let is_island = |r: &Ring<'_>| {
        r.area > 0.0 && r.arcs.iter().all(|a| uses.get(&a.index()) == Some(&1))
    };
    let too_small = |r: &Ring<'_>| {
        opts.min_area.is_some_and(|m| r.area < m)
            // closing vertex is repeated
            || opts.min_vertices.is_some_and(|m| r.coords.len().saturating_sub(1) < m)
    };
    let had_shape: Vec<bool> = layer.shapes.iter().map(Option::is_some).collect();
    let removed = drop_rings(layer, arcs, |r| is_island(r) && too_small(r));
    if opts.remove_empty {
        remove_empty(layer, &had_shape);
    }
    log::debug!("filter_islands: removed {removed} ring(s)");
    Ok(())
}
