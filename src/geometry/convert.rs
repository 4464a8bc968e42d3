//! Conversion between layer shapes and `geo` geometries.
//!
//! Shapes resolve to `geo` types for algorithms that need free-standing
//! coordinates (boolean overlay, containment). New geometry goes back into a
//! pool through [`ShapeAssembler`], which runs every ring and path of a batch
//! through one [`TopologyBuilder`] so the batch shares arcs.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};

use crate::geometry::metrics::resolve_parts;
use crate::geometry::rings::{RingGroup, group_rings, oriented};
use crate::topology::arc_pool::ArcPool;
use crate::topology::builder::TopologyBuilder;
use crate::topology::layer::{GeometryType, Shape};

/// Polygon groups of a polygon shape.
pub fn shape_ring_groups(shape: &Shape, arcs: &ArcPool) -> Vec<RingGroup> {
    match shape {
        Shape::Paths(_) => group_rings(resolve_parts(shape, arcs)),
        Shape::Points(_) => Vec::new(),
    }
}

fn polygon_of(group: RingGroup) -> Polygon {
    Polygon::new(
        LineString::new(group.exterior),
        group.holes.into_iter().map(LineString::new).collect(),
    )
}

/// Polygon shape as a `geo` multipolygon.
pub fn shape_to_multi_polygon(shape: &Shape, arcs: &ArcPool) -> MultiPolygon {
    MultiPolygon::new(
        shape_ring_groups(shape, arcs)
            .into_iter()
            .map(polygon_of)
            .collect(),
    )
}

/// Path shape as a `geo` multilinestring.
pub fn shape_to_multi_line(shape: &Shape, arcs: &ArcPool) -> MultiLineString {
    MultiLineString::new(
        resolve_parts(shape, arcs)
            .into_iter()
            .map(LineString::new)
            .collect(),
    )
}

/// Shape as a `geo` geometry, collapsing single-part collections.
pub fn shape_to_geometry(shape: &Shape, arcs: &ArcPool, ty: GeometryType) -> Option<Geometry> {
    match (shape, ty) {
        (Shape::Points(points), _) => match points.as_slice() {
            [] => None,
            [p] => Some(Geometry::Point((*p).into())),
            many => Some(Geometry::MultiPoint(MultiPoint::from(many.to_vec()))),
        },
        (Shape::Paths(_), GeometryType::Polygon) => {
            let mut mp = shape_to_multi_polygon(shape, arcs);
            match mp.0.len() {
                0 => None,
                1 => mp.0.pop().map(Geometry::Polygon),
                _ => Some(Geometry::MultiPolygon(mp)),
            }
        }
        (Shape::Paths(_), _) => {
            let mut ml = shape_to_multi_line(shape, arcs);
            match ml.0.len() {
                0 => None,
                1 => ml.0.pop().map(Geometry::LineString),
                _ => Some(Geometry::MultiLineString(ml)),
            }
        }
    }
}

#[derive(Debug)]
enum Pending {
    Null,
    Points(Vec<Coord>),
    Paths(Vec<usize>),
}

/// Collects new shapes, then writes their arcs into a pool in one pass.
#[derive(Debug, Default)]
pub struct ShapeAssembler {
    builder: TopologyBuilder,
    pending: Vec<Pending>,
}

impl ShapeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Adds a feature with no geometry.
    pub fn push_null(&mut self) {
        self.pending.push(Pending::Null);
    }

    pub fn push_points(&mut self, points: Vec<Coord>) {
        self.pending.push(Pending::Points(points));
    }

    /// Adds polygon rings already in the internal orientation.
    pub fn push_rings(&mut self, rings: impl IntoIterator<Item = Vec<Coord>>) {
        let ids = rings
            .into_iter()
            .map(|r| self.builder.add_ring(&r))
            .collect();
        self.pending.push(Pending::Paths(ids));
    }

    /// Adds open paths.
    pub fn push_paths(&mut self, paths: impl IntoIterator<Item = Vec<Coord>>) {
        let ids = paths
            .into_iter()
            .map(|p| self.builder.add_path(&p))
            .collect();
        self.pending.push(Pending::Paths(ids));
    }

    /// Adds a `geo` multipolygon, normalizing ring orientation.
    pub fn push_multi_polygon(&mut self, mp: &MultiPolygon) {
        let rings: Vec<Vec<Coord>> = mp
            .0
            .iter()
            .flat_map(|poly| {
                std::iter::once(oriented(poly.exterior().0.clone(), true)).chain(
                    poly.interiors()
                        .iter()
                        .map(|hole| oriented(hole.0.clone(), false)),
                )
            })
            .collect();
        self.push_rings(rings);
    }

    pub fn push_multi_line(&mut self, ml: &MultiLineString) {
        self.push_paths(ml.0.iter().map(|ls| ls.0.clone()));
    }

    /// Builds arcs into `pool` and returns the shapes in push order.
    ///
    /// Parts that collapsed are dropped; a shape left with no parts becomes
    /// `None`.
    pub fn finish(self, pool: &mut ArcPool) -> Vec<Option<Shape>> {
        let built = self.builder.build_into(pool);
        self.pending
            .into_iter()
            .map(|p| match p {
                Pending::Null => None,
                Pending::Points(points) if points.is_empty() => None,
                Pending::Points(points) => Some(Shape::Points(points)),
                Pending::Paths(ids) => {
                    let parts: Vec<_> = ids.iter().filter_map(|&i| built[i].clone()).collect();
                    if parts.len() < ids.len() {
                        log::warn!(
                            "dropped {} collapsed part(s) while building arcs",
                            ids.len() - parts.len()
                        );
                    }
                    (!parts.is_empty()).then_some(Shape::Paths(parts))
                }
            })
            .collect()
    }
}
