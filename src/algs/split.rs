//! Layer-level restructuring: split and merge_layers.

use hashbrown::HashMap;
use serde_json::Value;

use crate::algs::dissolve::group_by_fields;
use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{MergeLayersOptions, OptionMap, Options, SplitOptions};
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Layer};

fn value_name(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn split_layer(layer: &Layer, field: Option<&str>) -> OpResult<Vec<Layer>> {
    let groups: Vec<(String, Vec<usize>)> = match field {
        Some(field) => {
            if !layer.is_empty() && !layer.has_field(field) {
                return Err(OperationError::InvalidOption {
                    name: "field".into(),
                    reason: format!("field `{field}` not found"),
                });
            }
            group_by_fields(layer, &[field.to_string()])
                .into_iter()
                .map(|members| (value_name(layer.records[members[0]].get(field)), members))
                .collect()
        }
        None => (0..layer.len())
            .map(|i| (format!("split-{}", i + 1), vec![i]))
            .collect(),
    };
    Ok(groups
        .into_iter()
        .map(|(name, members)| {
            let mut part = Layer::new(layer.geometry_type);
            part.name = Some(name);
            for i in members {
                part.push(layer.shapes[i].clone(), layer.records[i].clone());
            }
            part
        })
        .collect())
}

/// `split`: one layer per distinct value of `field`, or one layer per
/// feature when no field is given. Layers share the input pool.
pub fn split(layers: &[Layer], _arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Vec<Layer>> {
    let opts = SplitOptions::from_map(options)?;
    let mut out = Vec::new();
    for layer in layers {
        out.extend(split_layer(layer, opts.field.as_deref())?);
    }
    log::debug!("split: {} layer(s) into {}", layers.len(), out.len());
    Ok(out)
}

fn json_type(v: &Value) -> Option<&'static str> {
    match v {
        Value::Null => None,
        Value::Bool(_) => Some("boolean"),
        Value::Number(_) => Some("number"),
        Value::String(_) => Some("string"),
        Value::Array(_) => Some("array"),
        Value::Object(_) => Some("object"),
    }
}

/// Type of each field in a layer, taken from its first non-null value.
fn layer_field_types(layer: &Layer) -> HashMap<&str, &'static str> {
    let mut types = HashMap::new();
    for (k, v) in layer.records.iter().flatten() {
        if let Some(ty) = json_type(v) {
            types.entry(k.as_str()).or_insert(ty);
        }
    }
    types
}

/// `merge_layers`: collapses every layer into one.
///
/// Geometry types must agree (layers without geometry fit anywhere). A
/// field whose first non-null value differs in type between layers is an
/// error unless `force` is set. Records are padded with `null` so every feature
/// carries the union of fields.
pub fn merge_layers(layers: &[Layer], _arcs: &mut ArcPool, options: &OptionMap) -> OpResult<Vec<Layer>> {
    let opts = MergeLayersOptions::from_map(options)?;
    let mut geometry_type: Option<GeometryType> = None;
    for layer in layers {
        match (geometry_type, layer.geometry_type) {
            (Some(a), Some(b)) if a != b => {
                return Err(OperationError::LayerMismatch(format!(
                    "cannot merge {} and {} layers",
                    a.as_str(),
                    b.as_str()
                )));
            }
            (None, Some(b)) => geometry_type = Some(b),
            _ => {}
        }
    }
    let mut field_types: HashMap<String, &'static str> = HashMap::new();
    let mut fields: Vec<String> = Vec::new();
    for layer in layers {
        for name in layer.field_names() {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        for (k, ty) in layer_field_types(layer) {
            match field_types.get(k) {
                Some(&seen) if seen != ty && !opts.force => {
                    return Err(OperationError::LayerMismatch(format!(
                        "field `{k}` holds {seen} values in one layer and {ty} values in another"
                    )));
                }
                Some(_) => {}
                None => {
                    field_types.insert(k.to_string(), ty);
                }
            }
        }
    }
    let mut merged = Layer::new(geometry_type);
    merged.name = opts
        .name
        .clone()
        .or_else(|| layers.iter().find_map(|l| l.name.clone()));
    for layer in layers {
        for (shape, record) in layer.features() {
            let mut record = record.clone();
            for f in &fields {
                if !record.contains_key(f) {
                    record.insert(f.clone(), Value::Null);
                }
            }
            merged.push(shape.cloned(), record);
        }
    }
    Ok(vec![merged])
}
