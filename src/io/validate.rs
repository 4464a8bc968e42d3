//! Structural validation of GeoJSON input.
//!
//! [`validate_geojson`] is the cheap top-level gate every public entry point
//! runs first. [`parse_features`] performs the full structural check and
//! normalizes the input into a list of features.

use serde_json::Value;

use crate::io::geojson::{Feature, Geometry, Position};
use crate::shaper_error::{Result, ShaperError};
use crate::topology::layer::Record;

/// The nine recognized GeoJSON `type` values.
pub const GEOJSON_TYPES: [&str; 9] = [
    "FeatureCollection",
    "Feature",
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Checks that `input` is an object with a recognized GeoJSON `type`.
pub fn validate_geojson(input: &Value) -> Result<()> {
    let obj = input
        .as_object()
        .ok_or_else(|| ShaperError::validation("expected a GeoJSON object"))?;
    match obj.get("type").and_then(Value::as_str) {
        None => Err(ShaperError::validation("missing \"type\" member")),
        Some(t) if !GEOJSON_TYPES.contains(&t) => Err(ShaperError::Validation(format!(
            "type \"{t}\" is not a GeoJSON type"
        ))),
        Some(_) => Ok(()),
    }
}

/// Parses a FeatureCollection, Feature, or bare geometry into features.
pub fn parse_features(input: &Value) -> Result<Vec<Feature>> {
    validate_geojson(input)?;
    match input["type"].as_str() {
        Some("FeatureCollection") => {
            let features = input
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| ShaperError::validation("FeatureCollection needs a \"features\" array"))?;
            features
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    parse_feature(f).map_err(|e| match e {
                        ShaperError::Validation(msg) => {
                            ShaperError::Validation(format!("feature {i}: {msg}"))
                        }
                        other => other,
                    })
                })
                .collect()
        }
        Some("Feature") => Ok(vec![parse_feature(input)?]),
        _ => Ok(vec![Feature {
            id: None,
            geometry: Some(parse_geometry(input)?),
            properties: Record::new(),
        }]),
    }
}

fn parse_feature(value: &Value) -> Result<Feature> {
    let obj = value
        .as_object()
        .ok_or_else(|| ShaperError::validation("feature is not an object"))?;
    if obj.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err(ShaperError::validation("expected type \"Feature\""));
    }
    let geometry = match obj.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => Some(parse_geometry(g)?),
    };
    let properties = match obj.get("properties") {
        None | Some(Value::Null) => Record::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ShaperError::validation("\"properties\" must be an object or null")),
    };
    Ok(Feature {
        id: obj.get("id").filter(|v| !v.is_null()).cloned(),
        geometry,
        properties,
    })
}

/// Parses and structurally checks one geometry object.
pub fn parse_geometry(value: &Value) -> Result<Geometry> {
    let obj = value
        .as_object()
        .ok_or_else(|| ShaperError::validation("geometry is not an object"))?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ShaperError::validation("geometry is missing its \"type\""))?;
    if !GEOJSON_TYPES[2..].contains(&ty) {
        return Err(ShaperError::Validation(format!(
            "geometry type \"{ty}\" is not recognized"
        )));
    }
    if ty == "GeometryCollection" {
        let members = obj
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| ShaperError::validation("GeometryCollection needs a \"geometries\" array"))?;
        return Ok(Geometry::GeometryCollection {
            geometries: members.iter().map(parse_geometry).collect::<Result<_>>()?,
        });
    }
    let coords = obj
        .get("coordinates")
        .ok_or_else(|| ShaperError::Validation(format!("{ty} is missing \"coordinates\"")))?;
    let geometry = match ty {
        "Point" => Geometry::Point {
            coordinates: position(coords)?,
        },
        "MultiPoint" => Geometry::MultiPoint {
            coordinates: list(coords, ty, position)?,
        },
        "LineString" => Geometry::LineString {
            coordinates: line(coords)?,
        },
        "MultiLineString" => Geometry::MultiLineString {
            coordinates: list(coords, ty, line)?,
        },
        "Polygon" => Geometry::Polygon {
            coordinates: polygon(coords)?,
        },
        "MultiPolygon" => Geometry::MultiPolygon {
            coordinates: list(coords, ty, polygon)?,
        },
        _ => {
            return Err(ShaperError::Validation(format!(
                "geometry type \"{ty}\" is not recognized"
            )));
        }
    };
    Ok(geometry)
}

fn list<T>(value: &Value, ty: &str, item: fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    value
        .as_array()
        .ok_or_else(|| ShaperError::Validation(format!("{ty} coordinates must be an array")))?
        .iter()
        .map(item)
        .collect()
}

fn position(value: &Value) -> Result<Position> {
    let arr = value
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| ShaperError::validation("position must be an array of at least 2 numbers"))?;
    let mut out = [0.0; 2];
    for (slot, v) in out.iter_mut().zip(arr) {
        *slot = v
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| ShaperError::validation("position holds a non-numeric ordinate"))?;
    }
    Ok(out)
}

fn line(value: &Value) -> Result<Vec<Position>> {
    let positions = list(value, "LineString", position)?;
    if positions.len() < 2 {
        return Err(ShaperError::validation("LineString needs at least 2 positions"));
    }
    Ok(positions)
}

fn ring(value: &Value) -> Result<Vec<Position>> {
    let positions = list(value, "Polygon ring", position)?;
    if positions.len() < 4 {
        return Err(ShaperError::validation("Polygon ring needs at least 4 positions"));
    }
    if positions.first() != positions.last() {
        return Err(ShaperError::validation("Polygon ring is not closed"));
    }
    Ok(positions)
}

fn polygon(value: &Value) -> Result<Vec<Vec<Position>>> {
    list(value, "Polygon", ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_objects_and_unknown_types() {
        assert!(matches!(validate_geojson(&Value::Null), Err(ShaperError::Validation(_))));
        assert!(matches!(
            validate_geojson(&json!({ "invalid": "object" })),
            Err(ShaperError::Validation(_))
        ));
        assert!(matches!(
            validate_geojson(&json!({ "type": "Circle" })),
            Err(ShaperError::Validation(_))
        ));
    }

    #[test]
    fn bare_geometry_becomes_one_feature() {
        let features = parse_features(&json!({ "type": "Point", "coordinates": [1, 2] })).unwrap();
        assert_eq!(features.len(), 1);
        assert!(features[0].properties.is_empty());
        assert_eq!(
            features[0].geometry,
            Some(Geometry::Point { coordinates: [1.0, 2.0] })
        );
    }

    #[test]
    fn unclosed_ring_is_invalid() {
        let input = json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]
        });
        let err = parse_features(&input).unwrap_err();
        assert!(matches!(err, ShaperError::Validation(_)), "{err:?}");
    }

    #[test]
    fn short_ring_is_invalid() {
        let input = json!({ "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [0, 0]]] });
        assert!(parse_features(&input).is_err());
    }

    #[test]
    fn feature_errors_name_the_index() {
        let input = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": null, "properties": null },
                { "type": "Feature", "geometry": { "type": "Blob" }, "properties": {} }
            ]
        });
        match parse_features(&input) {
            Err(ShaperError::Validation(msg)) => assert!(msg.starts_with("feature 1"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn null_properties_become_empty_record() {
        let input = json!({ "type": "Feature", "geometry": null, "properties": null });
        let features = parse_features(&input).unwrap();
        assert!(features[0].geometry.is_none());
        assert!(features[0].properties.is_empty());
    }
}
