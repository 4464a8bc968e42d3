//! Topology construction: turns free-standing paths and rings into shared arcs.
//!
//! The builder works in three passes over every registered path:
//!
//! 1. **Node detection.** A vertex is a node when it ends an open path, or when
//!    two of its occurrences have different neighbour pairs (paths meet or
//!    diverge there).
//! 2. **Splitting.** Paths are cut at nodes. Rings with no node become a single
//!    closed arc, rotated to start at their lowest vertex so that the same ring
//!    registered twice (e.g. a hole and the island filling it) lines up.
//! 3. **Deduplication.** A segment whose vertex sequence matches an earlier
//!    arc, forward or reversed, reuses that arc instead of storing a copy.
//!
//! Arcs are appended to the target pool; existing arcs are never touched, so
//! the builder can add geometry to a pool that layers already reference.

use geo::Coord;
use hashbrown::HashMap;

use crate::topology::arc::ArcRef;
use crate::topology::arc_pool::ArcPool;

type Key = (u64, u64);

#[inline]
fn key(c: Coord) -> Key {
    // -0.0 and 0.0 must land on the same vertex
    let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (norm(c.x).to_bits(), norm(c.y).to_bits())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Vertex {
    Pair(Key, Key),
    Node,
}

#[derive(Debug)]
struct PathInput {
    coords: Vec<Coord>,
    closed: bool,
}

/// Accumulates paths and rings, then emits shared arcs into a pool.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    paths: Vec<PathInput>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Registers an open path and returns its slot in the build output.
    pub fn add_path(&mut self, coords: &[Coord]) -> usize {
        let mut coords = coords.to_vec();
        coords.dedup();
        self.paths.push(PathInput {
            coords,
            closed: false,
        });
        self.paths.len() - 1
    }

    /// Registers a ring (closing it if needed) and returns its slot.
    pub fn add_ring(&mut self, coords: &[Coord]) -> usize {
        let mut coords = coords.to_vec();
        coords.dedup();
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last {
                coords.push(first);
            }
        }
        self.paths.push(PathInput {
            coords,
            closed: true,
        });
        self.paths.len() - 1
    }

    fn is_degenerate(path: &PathInput) -> bool {
        if path.closed {
            path.coords.len() < 4
        } else {
            path.coords.len() < 2
        }
    }

    fn detect_nodes(&self) -> HashMap<Key, Vertex> {
        let mut vertices: HashMap<Key, Vertex> = HashMap::new();
        let mut note = |at: Coord, seen: Vertex| {
            vertices
                .entry(key(at))
                .and_modify(|v| {
                    if *v != seen {
                        *v = Vertex::Node;
                    }
                })
                .or_insert(seen);
        };
        let pair = |a: Coord, b: Coord| {
            let (ka, kb) = (key(a), key(b));
            if ka <= kb {
                Vertex::Pair(ka, kb)
            } else {
                Vertex::Pair(kb, ka)
            }
        };

        for path in self.paths.iter().filter(|p| !Self::is_degenerate(p)) {
            let c = &path.coords;
            if path.closed {
                let n = c.len() - 1;
                for i in 0..n {
                    let prev = c[(i + n - 1) % n];
                    note(c[i], pair(prev, c[i + 1]));
                }
            } else {
                let last = c.len() - 1;
                note(c[0], Vertex::Node);
                note(c[last], Vertex::Node);
                for i in 1..last {
                    note(c[i], pair(c[i - 1], c[i + 1]));
                }
            }
        }
        vertices
    }

    fn split(path: &PathInput, nodes: &HashMap<Key, Vertex>) -> Vec<Vec<Coord>> {
        let is_node = |c: Coord| matches!(nodes.get(&key(c)), Some(Vertex::Node));
        let walk: Vec<Coord> = if path.closed {
            let ring = &path.coords[..path.coords.len() - 1];
            let start = match ring.iter().position(|&c| is_node(c)) {
                Some(k) => k,
                None => lowest_vertex(ring),
            };
            let mut rotated = Vec::with_capacity(ring.len() + 1);
            rotated.extend_from_slice(&ring[start..]);
            rotated.extend_from_slice(&ring[..=start]);
            rotated
        } else {
            path.coords.clone()
        };

        let mut segments = Vec::new();
        let mut start = 0;
        let last = walk.len() - 1;
        for i in 1..=last {
            if i == last || is_node(walk[i]) {
                segments.push(walk[start..=i].to_vec());
                start = i;
            }
        }
        segments
    }

    /// Builds arcs into `pool`.
    ///
    /// Returns one entry per registered path, in registration order: the arc
    /// chain for the path, or `None` if it collapsed to fewer vertices than
    /// its kind needs.
    pub fn build_into(self, pool: &mut ArcPool) -> Vec<Option<Vec<ArcRef>>> {
        let nodes = self.detect_nodes();
        let mut seen: HashMap<Vec<Key>, u32> = HashMap::new();
        let mut out = Vec::with_capacity(self.paths.len());

        for path in &self.paths {
            if Self::is_degenerate(path) {
                out.push(None);
                continue;
            }
            let mut chain = Vec::new();
            for segment in Self::split(path, &nodes) {
                let fwd: Vec<Key> = segment.iter().map(|&c| key(c)).collect();
                if let Some(&id) = seen.get(&fwd) {
                    chain.push(ArcRef::forward(id));
                    continue;
                }
                let rev: Vec<Key> = fwd.iter().rev().copied().collect();
                if let Some(&id) = seen.get(&rev) {
                    chain.push(ArcRef::reverse(id));
                    continue;
                }
                let id = pool.push_arc(&segment);
                seen.insert(fwd, id);
                chain.push(ArcRef::forward(id));
            }
            out.push(Some(chain));
        }
        out
    }
}

/// Index of the lexicographically lowest vertex, by (x, y).
fn lowest_vertex(ring: &[Coord]) -> usize {
    ring.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn square(x0: f64, y0: f64) -> Vec<Coord> {
        vec![
            coord! { x: x0, y: y0 },
            coord! { x: x0 + 1.0, y: y0 },
            coord! { x: x0 + 1.0, y: y0 + 1.0 },
            coord! { x: x0, y: y0 + 1.0 },
            coord! { x: x0, y: y0 },
        ]
    }

    #[test]
    fn isolated_ring_is_one_arc() {
        let mut b = TopologyBuilder::new();
        b.add_ring(&square(0.0, 0.0));
        let mut pool = ArcPool::new();
        let out = b.build_into(&mut pool);
        assert_eq!(pool.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().len(), 1);
    }

    #[test]
    fn adjacent_squares_share_one_arc() {
        let mut b = TopologyBuilder::new();
        b.add_ring(&square(0.0, 0.0));
        b.add_ring(&square(1.0, 0.0));
        let mut pool = ArcPool::new();
        let out = b.build_into(&mut pool);
        // two outer arcs + one shared edge
        assert_eq!(pool.len(), 3);
        let left = out[0].as_ref().unwrap();
        let right = out[1].as_ref().unwrap();
        let shared: Vec<_> = left
            .iter()
            .filter(|a| right.contains(&a.reversed()))
            .collect();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn same_ring_in_opposite_direction_reuses_arc() {
        let mut ring = square(0.0, 0.0);
        let mut b = TopologyBuilder::new();
        b.add_ring(&ring);
        ring.reverse();
        // start the reversed copy at a different vertex
        ring.pop();
        ring.rotate_left(2);
        ring.push(ring[0]);
        b.add_ring(&ring);
        let mut pool = ArcPool::new();
        let out = b.build_into(&mut pool);
        assert_eq!(pool.len(), 1);
        assert_eq!(out[1].as_ref().unwrap()[0], out[0].as_ref().unwrap()[0].reversed());
    }

    #[test]
    fn collapsed_paths_yield_none() {
        let mut b = TopologyBuilder::new();
        let p = coord! { x: 1.0, y: 1.0 };
        b.add_path(&[p, p]);
        b.add_ring(&[p, coord! { x: 2.0, y: 2.0 }, p]);
        let mut pool = ArcPool::new();
        let out = b.build_into(&mut pool);
        assert!(out.iter().all(Option::is_none));
        assert!(pool.is_empty());
    }

    #[test]
    fn crossing_lines_split_at_shared_vertex() {
        let mut b = TopologyBuilder::new();
        b.add_path(&[coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }, coord! { x: 2.0, y: 2.0 }]);
        b.add_path(&[coord! { x: 0.0, y: 2.0 }, coord! { x: 1.0, y: 1.0 }, coord! { x: 2.0, y: 0.0 }]);
        let mut pool = ArcPool::new();
        let out = b.build_into(&mut pool);
        assert_eq!(pool.len(), 4);
        assert_eq!(out[0].as_ref().unwrap().len(), 2);
    }
}
