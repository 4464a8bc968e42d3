//! Datasets: one arc pool, the layers that reference it, and metadata.

use serde_json::{Map, Value};

use crate::algs::error::OperationError;
use crate::debug_invariants::DebugInvariants;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{Layer, Shape};

/// Orientation of polygon exterior rings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winding {
    /// Exteriors counter-clockwise, holes clockwise (RFC 7946).
    #[default]
    Ccw,
    /// Exteriors clockwise, holes counter-clockwise (legacy GeoJSON, shapefile).
    Cw,
}

/// Free-form dataset metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetInfo {
    /// Ring convention found in the imported GeoJSON, if it had polygons.
    pub winding: Option<Winding>,
    /// Coordinate system tag, if known.
    pub crs: Option<String>,
    pub extra: Map<String, Value>,
}

/// The unit of topological consistency.
///
/// Every arc reference held by any layer indexes `arcs`. References are never
/// valid in another dataset's pool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub arcs: ArcPool,
    pub layers: Vec<Layer>,
    pub info: DatasetInfo,
}

impl Dataset {
    /// Dataset with no arcs and no layers, the base for synthesized layers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Borrow layer `index` mutably together with the pool.
    pub fn layer_and_arcs_mut(&mut self, index: usize) -> Option<(&mut Layer, &mut ArcPool)> {
        let Dataset { arcs, layers, .. } = self;
        layers.get_mut(index).map(|layer| (layer, arcs))
    }

    /// Total feature count across layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    /// Appends `other`'s arcs to this pool and its layers (remapped) to this
    /// dataset.
    pub fn absorb(&mut self, other: Dataset) {
        let offset = self.arcs.absorb(&other.arcs);
        for mut layer in other.layers {
            layer.shift_arcs(offset);
            self.layers.push(layer);
        }
    }
}

fn validate_layer(layer: &Layer, arcs: &ArcPool) -> Result<(), OperationError> {
    if layer.shapes.len() != layer.records.len() {
        return Err(OperationError::LayerMismatch(format!(
            "{} shapes but {} records",
            layer.shapes.len(),
            layer.records.len()
        )));
    }
    for shape in layer.shapes.iter().flatten() {
        match layer.geometry_type {
            Some(ty) if !shape.fits(ty) => {
                return Err(OperationError::LayerMismatch(format!(
                    "{} layer holds a shape of another kind",
                    ty.as_str()
                )));
            }
            None => {
                return Err(OperationError::LayerMismatch(
                    "untyped layer holds geometry".into(),
                ));
            }
            _ => {}
        }
        if let Shape::Paths(_) = shape {
            if let Some(bad) = shape.arcs().find(|&a| !arcs.contains(a)) {
                return Err(OperationError::InvalidArcReference {
                    arc: bad.raw(),
                    pool_len: arcs.len(),
                });
            }
        }
    }
    Ok(())
}

impl DebugInvariants for Dataset {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Dataset");
    }

    fn validate_invariants(&self) -> Result<(), OperationError> {
        for layer in &self.layers {
            validate_layer(layer, &self.arcs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::arc::ArcRef;
    use crate::topology::layer::{GeometryType, Record};
    use geo::coord;

    fn line_dataset() -> Dataset {
        let mut ds = Dataset::empty();
        ds.arcs
            .push_arc(&[coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }]);
        let mut layer = Layer::new(Some(GeometryType::Polyline));
        layer.push(Some(Shape::Paths(vec![vec![ArcRef::forward(0)]])), Record::new());
        ds.layers.push(layer);
        ds
    }

    #[test]
    fn valid_dataset_passes() {
        assert!(line_dataset().validate_invariants().is_ok());
    }

    #[test]
    fn foreign_arc_reference_is_rejected() {
        let mut ds = line_dataset();
        ds.layers[0].shapes[0] = Some(Shape::Paths(vec![vec![ArcRef::reverse(7)]]));
        let err = ds.validate_invariants().unwrap_err();
        assert_eq!(
            err,
            OperationError::InvalidArcReference {
                arc: -8,
                pool_len: 1
            }
        );
    }

    #[test]
    fn misaligned_records_are_rejected() {
        let mut ds = line_dataset();
        ds.layers[0].records.push(Record::new());
        assert!(matches!(
            ds.validate_invariants(),
            Err(OperationError::LayerMismatch(_))
        ));
    }

    #[test]
    fn absorb_remaps_references() {
        let mut a = line_dataset();
        a.absorb(line_dataset());
        assert_eq!(a.arcs.len(), 2);
        let arcs: Vec<_> = a.layers[1].shapes[0].as_ref().unwrap().arcs().collect();
        assert_eq!(arcs, vec![ArcRef::forward(1)]);
        assert!(a.validate_invariants().is_ok());
    }
}
