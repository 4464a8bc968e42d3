//! Ring orientation and exterior/hole grouping.

use geo::Coord;

use crate::geometry::metrics::{point_in_ring, ring_signed_area};

/// A polygon as resolved coordinates: exterior ring plus holes.
#[derive(Clone, Debug, PartialEq)]
pub struct RingGroup {
    pub exterior: Vec<Coord>,
    pub holes: Vec<Vec<Coord>>,
}

/// Returns `ring` oriented counter-clockwise when `ccw`, clockwise otherwise.
pub fn oriented(mut ring: Vec<Coord>, ccw: bool) -> Vec<Coord> {
    let area = ring_signed_area(&ring);
    if (area > 0.0) != ccw && area != 0.0 {
        ring.reverse();
    }
    ring
}

/// Groups rings stored in the internal convention (exteriors CCW, holes CW)
/// into polygons.
///
/// Each hole goes to the smallest exterior that contains it. A hole with no
/// container is promoted to an exterior. Zero-area rings are dropped.
pub fn group_rings(rings: Vec<Vec<Coord>>) -> Vec<RingGroup> {
    let mut exteriors: Vec<(f64, RingGroup)> = Vec::new();
    let mut holes: Vec<(f64, Vec<Coord>)> = Vec::new();
    for ring in rings {
        let area = ring_signed_area(&ring);
        if area > 0.0 {
            exteriors.push((
                area,
                RingGroup {
                    exterior: ring,
                    holes: Vec::new(),
                },
            ));
        } else if area < 0.0 {
            holes.push((-area, ring));
        } else {
            log::warn!("dropping zero-area ring with {} vertices", ring.len());
        }
    }

    for (hole_area, hole) in holes {
        let probe = hole_probe(&hole);
        let container = exteriors
            .iter()
            .enumerate()
            .filter(|(_, (area, g))| *area > hole_area && point_in_ring(probe, &g.exterior))
            .min_by(|(_, (a, _)), (_, (b, _))| a.total_cmp(b))
            .map(|(i, _)| i);
        match container {
            Some(i) => exteriors[i].1.holes.push(hole),
            None => {
                let mut ring = hole;
                ring.reverse();
                exteriors.push((
                    hole_area,
                    RingGroup {
                        exterior: ring,
                        holes: Vec::new(),
                    },
                ));
            }
        }
    }
    exteriors.into_iter().map(|(_, g)| g).collect()
}

/// A point strictly inside a hole's boundary polygon, near its first edge.
///
/// Using a vertex directly fails for holes that touch their exterior, so this
/// nudges the midpoint of the first edge towards the hole's interior.
fn hole_probe(hole: &[Coord]) -> Coord {
    let (a, b) = (hole[0], hole[1]);
    let mid = Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    };
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return mid;
    }
    // holes run clockwise: the interior lies to the right of each edge
    let eps = len * 1e-6;
    Coord {
        x: mid.x + dy / len * eps,
        y: mid.y - dx / len * eps,
    }
}
