//! Arc pool: the single owner of every boundary coordinate in a dataset.
//!
//! Coordinates are packed CSR-style: `offsets[i]..offsets[i + 1]` indexes
//! the vertices of arc `i` in `coords`. The pool is append-only from the
//! point of view of layers: operations may push arcs or rewrite an arc's
//! vertices in place, but an index once issued keeps naming the same arc.

use geo::{Coord, Rect};
use itertools::Either;

use crate::topology::arc::ArcRef;

#[derive(Clone, Debug, PartialEq)]
pub struct ArcPool {
    offsets: Vec<usize>,
    coords: Vec<Coord>,
}

impl Default for ArcPool {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            coords: Vec::new(),
        }
    }
}

impl ArcPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of arcs.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of stored vertices.
    pub fn vertex_count(&self) -> usize {
        self.coords.len()
    }

    /// Whether `arc` names an arc of this pool.
    #[inline]
    pub fn contains(&self, arc: ArcRef) -> bool {
        arc.index() < self.len()
    }

    /// Vertices of arc `index`, in stored (forward) order.
    ///
    /// # Panics
    /// Panics if `index >= self.len()`; layers validated against this pool
    /// never trigger it.
    #[inline]
    pub fn arc(&self, index: usize) -> &[Coord] {
        &self.coords[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Vertices of arc `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<&[Coord]> {
        (index < self.len()).then(|| self.arc(index))
    }

    /// Iterates all arcs in index order.
    pub fn iter(&self) -> impl Iterator<Item = &[Coord]> + '_ {
        (0..self.len()).map(move |i| self.arc(i))
    }

    /// Appends an arc and returns its index.
    pub fn push_arc(&mut self, coords: &[Coord]) -> u32 {
        self.coords.extend_from_slice(coords);
        self.offsets.push(self.coords.len());
        (self.len() - 1) as u32
    }

    /// Vertices of `arc` in traversal order.
    pub fn traverse(&self, arc: ArcRef) -> impl Iterator<Item = Coord> + '_ {
        let coords = self.arc(arc.index());
        if arc.is_reversed() {
            Either::Left(coords.iter().rev().copied())
        } else {
            Either::Right(coords.iter().copied())
        }
    }

    /// First and last vertex of `arc` in traversal order.
    pub fn endpoints(&self, arc: ArcRef) -> Option<(Coord, Coord)> {
        let coords = self.get(arc.index())?;
        let (first, last) = (*coords.first()?, *coords.last()?);
        Some(if arc.is_reversed() {
            (last, first)
        } else {
            (first, last)
        })
    }

    /// Resolves a chain of arcs into one coordinate sequence.
    ///
    /// The junction vertex shared by consecutive arcs is emitted once, so a
    /// closed ring comes back with its first vertex repeated at the end.
    pub fn path_coords(&self, path: &[ArcRef]) -> Vec<Coord> {
        let mut out: Vec<Coord> = Vec::new();
        for &arc in path {
            let skip = usize::from(!out.is_empty());
            out.extend(self.traverse(arc).skip(skip));
        }
        out
    }

    /// Appends every arc of `other` and returns the index offset that must be
    /// added to `other`'s references.
    pub fn absorb(&mut self, other: &ArcPool) -> usize {
        let offset = self.len();
        let base = self.coords.len();
        self.coords.extend_from_slice(&other.coords);
        self.offsets
            .extend(other.offsets.iter().skip(1).map(|o| o + base));
        offset
    }

    /// Applies `f` to every stored vertex.
    pub fn transform(&mut self, mut f: impl FnMut(Coord) -> Coord) {
        for c in &mut self.coords {
            *c = f(*c);
        }
    }

    /// Rewrites every arc through `f`, keeping arc indices stable.
    ///
    /// `f` receives the arc index and its current vertices and returns the
    /// replacement vertices.
    pub fn rebuild(&mut self, mut f: impl FnMut(usize, &[Coord]) -> Vec<Coord>) {
        let mut offsets = Vec::with_capacity(self.offsets.len());
        let mut coords = Vec::with_capacity(self.coords.len());
        offsets.push(0);
        for i in 0..self.len() {
            coords.extend(f(i, self.arc(i)));
            offsets.push(coords.len());
        }
        self.offsets = offsets;
        self.coords = coords;
    }

    /// Bounding box of all stored vertices.
    pub fn bbox(&self) -> Option<Rect> {
        bbox_of(self.coords.iter().copied())
    }
}

/// Bounding box of a coordinate stream, `None` when empty.
pub fn bbox_of(coords: impl IntoIterator<Item = Coord>) -> Option<Rect> {
    let mut iter = coords.into_iter();
    let first = iter.next()?;
    let (mut min, mut max) = (first, first);
    for c in iter {
        min.x = min.x.min(c.x);
        min.y = min.y.min(c.y);
        max.x = max.x.max(c.x);
        max.y = max.y.max(c.y);
    }
    Some(Rect::new(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn pool() -> ArcPool {
        let mut pool = ArcPool::new();
        pool.push_arc(&[coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 }]);
        pool.push_arc(&[
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 0.0, y: 0.0 },
        ]);
        pool
    }

    #[test]
    fn traverse_respects_direction() {
        let pool = pool();
        let rev: Vec<_> = pool.traverse(ArcRef::reverse(0)).collect();
        assert_eq!(rev, vec![coord! { x: 1.0, y: 0.0 }, coord! { x: 0.0, y: 0.0 }]);
        assert_eq!(
            pool.endpoints(ArcRef::reverse(1)),
            Some((coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 }))
        );
    }

    #[test]
    fn path_coords_drops_junction_duplicates() {
        let pool = pool();
        let ring = pool.path_coords(&[ArcRef::forward(0), ArcRef::forward(1)]);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn absorb_returns_offset_and_keeps_coords() {
        let mut a = pool();
        let b = pool();
        let offset = a.absorb(&b);
        assert_eq!(offset, 2);
        assert_eq!(a.len(), 4);
        assert_eq!(a.arc(3), b.arc(1));
    }

    #[test]
    fn rebuild_keeps_indices() {
        let mut p = pool();
        p.rebuild(|i, coords| if i == 1 { coords[..2].to_vec() } else { coords.to_vec() });
        assert_eq!(p.len(), 2);
        assert_eq!(p.arc(1).len(), 2);
        assert_eq!(p.vertex_count(), 4);
    }

    #[test]
    fn bbox_covers_all_vertices() {
        let rect = pool().bbox().unwrap();
        assert_eq!(rect.min(), coord! { x: 0.0, y: 0.0 });
        assert_eq!(rect.max(), coord! { x: 1.0, y: 1.0 });
        assert!(ArcPool::new().bbox().is_none());
    }
}
