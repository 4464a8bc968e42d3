//! Combining independently imported datasets.
//!
//! Each input owns its own arc pool. Merging appends every later pool onto
//! the first and shifts the arc references of the moved layers by the pool
//! offset, so every layer ends up valid in one shared pool.

use crate::topology::dataset::Dataset;

/// Unions `datasets` into one dataset whose pool holds every input's arcs.
///
/// Layers keep input order. Metadata comes from the first dataset, with the
/// ring winding taken from the first dataset that recorded one.
pub fn union_pools(datasets: impl IntoIterator<Item = Dataset>) -> Dataset {
    let mut iter = datasets.into_iter();
    let Some(mut combined) = iter.next() else {
        return Dataset::empty();
    };
    for other in iter {
        if combined.info.winding.is_none() {
            combined.info.winding = other.info.winding;
        }
        log::debug!(
            "merging {} layer(s) at arc offset {}",
            other.layers.len(),
            combined.arcs.len()
        );
        combined.absorb(other);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::io::import::{ImportOptions, import_geojson};
    use crate::topology::arc::ArcRef;
    use serde_json::json;

    fn square(x0: f64) -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x0, 0], [x0 + 1.0, 0], [x0 + 1.0, 1], [x0, 1], [x0, 0]]]
        })
    }

    #[test]
    fn later_pools_are_appended_and_refs_shifted() {
        let a = import_geojson(&square(0.0), &ImportOptions::default()).unwrap();
        let b = import_geojson(&square(5.0), &ImportOptions::default()).unwrap();
        let (a_len, b_coords) = (a.arcs.len(), b.arcs.arc(0).to_vec());
        let merged = union_pools([a, b]);
        assert_eq!(merged.layers.len(), 2);
        assert!(merged.validate_invariants().is_ok());
        let moved = merged.layers[1].shapes[0].as_ref().unwrap();
        let first = moved.arcs().next().unwrap();
        assert_eq!(first, ArcRef::forward(a_len as u32));
        assert_eq!(merged.arcs.arc(first.index()), b_coords.as_slice());
    }

    #[test]
    fn empty_input_gives_empty_dataset() {
        let merged = union_pools(Vec::new());
        assert!(merged.layers.is_empty());
        assert!(merged.arcs.is_empty());
    }
}
