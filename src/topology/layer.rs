//! Layers: one geometry type, its shapes, and an aligned attribute table.

use geo::Coord;
use serde_json::{Map, Value};

use crate::topology::arc::ArcRef;

/// Attribute record of one feature.
pub type Record = Map<String, Value>;

/// Geometry class shared by every shape of a layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    Polyline,
    Polygon,
}

impl GeometryType {
    pub fn as_str(self) -> &'static str {
        match self {
            GeometryType::Point => "point",
            GeometryType::Polyline => "polyline",
            GeometryType::Polygon => "polygon",
        }
    }
}

/// Geometry of one feature.
///
/// Point features store coordinates directly. Polyline and polygon features
/// store parts as chains of arc references into the dataset's pool; each
/// polygon part is one ring (exteriors counter-clockwise, holes clockwise).
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Points(Vec<Coord>),
    Paths(Vec<Vec<ArcRef>>),
}

impl Shape {
    /// Number of parts (points or paths).
    pub fn part_count(&self) -> usize {
        match self {
            Shape::Points(p) => p.len(),
            Shape::Paths(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.part_count() == 0
    }

    pub fn paths(&self) -> Option<&[Vec<ArcRef>]> {
        match self {
            Shape::Paths(p) => Some(p),
            Shape::Points(_) => None,
        }
    }

    pub fn points(&self) -> Option<&[Coord]> {
        match self {
            Shape::Points(p) => Some(p),
            Shape::Paths(_) => None,
        }
    }

    /// Every arc reference in the shape.
    pub fn arcs(&self) -> impl Iterator<Item = ArcRef> + '_ {
        self.paths().into_iter().flatten().flatten().copied()
    }

    /// Whether this kind of shape may live in a layer of type `ty`.
    pub fn fits(&self, ty: GeometryType) -> bool {
        matches!(
            (self, ty),
            (Shape::Points(_), GeometryType::Point)
                | (Shape::Paths(_), GeometryType::Polyline | GeometryType::Polygon)
        )
    }
}

/// A named, geometry-typed collection of shapes with aligned records.
///
/// `shapes[i]` and `records[i]` describe the same feature. A `None` shape is a
/// feature without geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layer {
    pub name: Option<String>,
    pub geometry_type: Option<GeometryType>,
    pub shapes: Vec<Option<Shape>>,
    pub records: Vec<Record>,
}

impl Layer {
    /// Empty layer of the given type.
    pub fn new(geometry_type: Option<GeometryType>) -> Self {
        Self {
            geometry_type,
            ..Self::default()
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Appends one feature.
    pub fn push(&mut self, shape: Option<Shape>, record: Record) {
        self.shapes.push(shape);
        self.records.push(record);
    }

    /// Iterates `(shape, record)` pairs.
    pub fn features(&self) -> impl Iterator<Item = (Option<&Shape>, &Record)> + '_ {
        self.shapes.iter().map(Option::as_ref).zip(self.records.iter())
    }

    /// Field names in first-seen order across all records.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in &self.records {
            for k in record.keys() {
                if !names.iter().any(|n| n == k) {
                    names.push(k.clone());
                }
            }
        }
        names
    }

    /// Whether any record carries `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.records.iter().any(|r| r.contains_key(field))
    }

    /// Keeps the features for which `keep(index)` is true, preserving order.
    pub fn retain_indices(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let flags: Vec<bool> = (0..self.len()).map(&mut keep).collect();
        let mut it = flags.iter();
        self.shapes.retain(|_| *it.next().unwrap_or(&false));
        let mut it = flags.iter();
        self.records.retain(|_| *it.next().unwrap_or(&false));
    }

    /// Reorders features by `order` (a permutation of indices).
    pub fn reorder(&mut self, order: &[usize]) {
        let shapes = std::mem::take(&mut self.shapes);
        let records = std::mem::take(&mut self.records);
        let mut slots: Vec<_> = shapes.into_iter().zip(records).map(Some).collect();
        for &i in order {
            if let Some((shape, record)) = slots.get_mut(i).and_then(Option::take) {
                self.shapes.push(shape);
                self.records.push(record);
            }
        }
    }

    /// Shifts every arc reference by `offset` (after pool concatenation).
    pub fn shift_arcs(&mut self, offset: usize) {
        if offset == 0 {
            return;
        }
        for shape in self.shapes.iter_mut().flatten() {
            if let Shape::Paths(parts) = shape {
                for arc in parts.iter_mut().flatten() {
                    *arc = arc.shifted(offset);
                }
            }
        }
    }

    /// Number of features without geometry.
    pub fn null_shape_count(&self) -> usize {
        self.shapes.iter().filter(|s| s.is_none()).count()
    }
}
