//! GeoJSON → [`Dataset`] import.

use geo::Coord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::convert::ShapeAssembler;
use crate::geometry::metrics::ring_signed_area;
use crate::geometry::rings::oriented;
use crate::io::geojson::{Feature, Geometry, Position};
use crate::io::validate::parse_features;
use crate::shaper_error::{Result, ShaperError};
use crate::topology::dataset::{Dataset, DatasetInfo, Winding};
use crate::topology::layer::{GeometryType, Layer};

/// Importer settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Copy each feature's `id` into this attribute.
    #[serde(alias = "id-field")]
    pub id_field: Option<String>,
}

/// Flattened parts of one feature's geometry.
enum Parts {
    Null,
    Points(Vec<Coord>),
    Lines(Vec<Vec<Coord>>),
    Polygons(Vec<Vec<Vec<Coord>>>),
}

fn coord(p: &Position) -> Coord {
    Coord { x: p[0], y: p[1] }
}

fn coords(ps: &[Position]) -> Vec<Coord> {
    ps.iter().map(coord).collect()
}

fn class_of(geometry: &Geometry) -> Result<Option<GeometryType>> {
    Ok(match geometry {
        Geometry::Point { .. } | Geometry::MultiPoint { .. } => Some(GeometryType::Point),
        Geometry::LineString { .. } | Geometry::MultiLineString { .. } => {
            Some(GeometryType::Polyline)
        }
        Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } => Some(GeometryType::Polygon),
        Geometry::GeometryCollection { geometries } => {
            let mut found = None;
            for member in geometries {
                found = merge_class(found, class_of(member)?)?;
            }
            found
        }
    })
}

fn merge_class(
    a: Option<GeometryType>,
    b: Option<GeometryType>,
) -> Result<Option<GeometryType>> {
    match (a, b) {
        (Some(x), Some(y)) if x != y => Err(ShaperError::Validation(format!(
            "mixed geometry types in one layer: {} and {}",
            x.as_str(),
            y.as_str()
        ))),
        (Some(x), _) | (None, Some(x)) => Ok(Some(x)),
        (None, None) => Ok(None),
    }
}

fn collect_parts(geometry: &Geometry, parts: &mut Parts) {
    match (geometry, parts) {
        (Geometry::Point { coordinates }, Parts::Points(out)) => out.push(coord(coordinates)),
        (Geometry::MultiPoint { coordinates }, Parts::Points(out)) => {
            out.extend(coordinates.iter().map(coord))
        }
        (Geometry::LineString { coordinates }, Parts::Lines(out)) => out.push(coords(coordinates)),
        (Geometry::MultiLineString { coordinates }, Parts::Lines(out)) => {
            out.extend(coordinates.iter().map(|l| coords(l)))
        }
        (Geometry::Polygon { coordinates }, Parts::Polygons(out)) => {
            out.push(coordinates.iter().map(|r| coords(r)).collect())
        }
        (Geometry::MultiPolygon { coordinates }, Parts::Polygons(out)) => out.extend(
            coordinates
                .iter()
                .map(|poly| poly.iter().map(|r| coords(r)).collect()),
        ),
        (Geometry::GeometryCollection { geometries }, parts) => {
            for member in geometries {
                collect_parts(member, parts);
            }
        }
        // class_of() already rejected mixed kinds
        _ => {}
    }
}

fn parts_of(feature: &Feature, ty: Option<GeometryType>) -> Parts {
    let (Some(geometry), Some(ty)) = (&feature.geometry, ty) else {
        return Parts::Null;
    };
    let mut parts = match ty {
        GeometryType::Point => Parts::Points(Vec::new()),
        GeometryType::Polyline => Parts::Lines(Vec::new()),
        GeometryType::Polygon => Parts::Polygons(Vec::new()),
    };
    collect_parts(geometry, &mut parts);
    parts
}

/// Imports GeoJSON (collection, feature, or bare geometry) as a one-layer
/// dataset.
pub fn import_geojson(input: &Value, options: &ImportOptions) -> Result<Dataset> {
    let features = parse_features(input)?;
    import_features(&features, options)
}

/// Imports already-parsed features as a one-layer dataset.
pub fn import_features(features: &[Feature], options: &ImportOptions) -> Result<Dataset> {
    let mut ty = None;
    for feature in features {
        if let Some(g) = &feature.geometry {
            ty = merge_class(ty, class_of(g)?)?;
        }
    }

    let mut winding = None;
    let mut assembler = ShapeAssembler::new();
    for feature in features {
        match parts_of(feature, ty) {
            Parts::Null => assembler.push_null(),
            Parts::Points(points) => assembler.push_points(points),
            Parts::Lines(lines) => assembler.push_paths(lines),
            Parts::Polygons(polygons) => {
                let mut rings = Vec::new();
                for poly in polygons {
                    for (i, ring) in poly.into_iter().enumerate() {
                        if i == 0 && winding.is_none() {
                            let area = ring_signed_area(&ring);
                            if area != 0.0 {
                                winding = Some(if area > 0.0 { Winding::Ccw } else { Winding::Cw });
                            }
                        }
                        rings.push(oriented(ring, i == 0));
                    }
                }
                assembler.push_rings(rings);
            }
        }
    }

    let mut dataset = Dataset {
        info: DatasetInfo {
            winding,
            ..DatasetInfo::default()
        },
        ..Dataset::default()
    };
    let shapes = assembler.finish(&mut dataset.arcs);
    let records = features
        .iter()
        .map(|f| {
            let mut record = f.properties.clone();
            if let (Some(field), Some(id)) = (&options.id_field, &f.id) {
                record.insert(field.clone(), id.clone());
            }
            record
        })
        .collect();

    log::debug!(
        "imported {} feature(s) as {} layer, {} arc(s)",
        features.len(),
        ty.map_or("empty", GeometryType::as_str),
        dataset.arcs.len()
    );
    dataset.layers.push(Layer {
        name: None,
        geometry_type: ty,
        shapes,
        records,
    });
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::layer::Shape;
    use serde_json::json;

    #[test]
    fn shared_border_is_stored_once() {
        let input = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "n": 1 }, "geometry": {
                    "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]] } },
                { "type": "Feature", "properties": { "n": 2 }, "geometry": {
                    "type": "Polygon", "coordinates": [[[1, 0], [2, 0], [2, 1], [1, 1], [1, 0]]] } }
            ]
        });
        let ds = import_geojson(&input, &ImportOptions::default()).unwrap();
        assert_eq!(ds.arcs.len(), 3);
        // shared edge (2 vertices) plus one 4-vertex arc per square
        assert_eq!(ds.arcs.vertex_count(), 2 + 4 + 4);
        assert_eq!(ds.layers[0].geometry_type, Some(GeometryType::Polygon));
        assert_eq!(ds.info.winding, Some(Winding::Ccw));
    }

    #[test]
    fn clockwise_input_is_recorded_and_normalized() {
        let input = json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [0, 1], [1, 1], [1, 0], [0, 0]]]
        });
        let ds = import_geojson(&input, &ImportOptions::default()).unwrap();
        assert_eq!(ds.info.winding, Some(Winding::Cw));
        let shape = ds.layers[0].shapes[0].as_ref().unwrap();
        assert_eq!(crate::geometry::metrics::shape_area(shape, &ds.arcs), 1.0);
    }

    #[test]
    fn mixed_geometry_types_are_rejected() {
        let input = json!({
            "type": "GeometryCollection",
            "geometries": [
                { "type": "Point", "coordinates": [0, 0] },
                { "type": "LineString", "coordinates": [[0, 0], [1, 1]] }
            ]
        });
        assert!(matches!(
            import_geojson(&input, &ImportOptions::default()),
            Err(ShaperError::Validation(_))
        ));
    }

    #[test]
    fn null_geometry_keeps_record() {
        let input = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": null, "properties": { "a": 1 } },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [3, 4] } }
            ]
        });
        let ds = import_geojson(&input, &ImportOptions::default()).unwrap();
        let layer = &ds.layers[0];
        assert_eq!(layer.shapes[0], None);
        assert_eq!(layer.records[0]["a"], json!(1));
        assert!(layer.records[1].is_empty());
        assert!(matches!(layer.shapes[1], Some(Shape::Points(_))));
    }

    #[test]
    fn id_field_copies_feature_ids() {
        let input = json!({ "type": "Feature", "id": "x1", "geometry": null, "properties": {} });
        let opts = ImportOptions {
            id_field: Some("fid".into()),
        };
        let ds = import_geojson(&input, &opts).unwrap();
        assert_eq!(ds.layers[0].records[0]["fid"], json!("x1"));
    }
}
