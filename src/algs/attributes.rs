//! Attribute-table commands: filter, each, calc, sort, uniq, join, and the
//! field editors rename_fields, filter_fields and drop.

use std::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use serde_json::Value;

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::{
    CalcOptions, DropOptions, EachOptions, FieldsOptions, FilterOptions, JoinOptions, OptionMap,
    Options, SortOptions, UniqOptions,
};
use crate::expr::{
    ExpressionError, FeatureContext, Program, Statement, Val, compile, compile_for_layer,
};
use crate::geometry::metrics::ring_signed_area;
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{Layer, Record, Shape};

fn expression(expr: Option<String>) -> OpResult<String> {
    expr.filter(|e| !e.trim().is_empty())
        .ok_or_else(|| OperationError::InvalidOption {
            name: "expression".into(),
            reason: "missing".into(),
        })
}

/// Value of `program` for every feature, without touching records.
fn values(program: &Program, layer: &Layer, arcs: &ArcPool) -> OpResult<Vec<Val>> {
    layer
        .features()
        .enumerate()
        .map(|(i, (shape, record))| {
            let ctx = FeatureContext::new(i, shape, arcs, layer.geometry_type);
            Ok(program.value(record, &ctx)?)
        })
        .collect()
}

/// Runs `program` against every record in place.
fn run_all(program: &Program, layer: &mut Layer, arcs: &ArcPool) -> OpResult<()> {
    let ty = layer.geometry_type;
    let Layer { shapes, records, .. } = layer;
    for (i, (shape, record)) in shapes.iter().zip(records.iter_mut()).enumerate() {
        let ctx = FeatureContext::new(i, shape.as_ref(), arcs, ty);
        program.run(record, &ctx)?;
    }
    Ok(())
}

/// `filter`: keeps features whose expression is truthy.
pub fn filter(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = FilterOptions::from_map(options)?;
    let program = compile_for_layer(&expression(opts.expression)?, layer)?;
    let vals = values(&program, layer, arcs)?;
    let before = layer.len();
    let shapes_present: Vec<bool> = layer.shapes.iter().map(Option::is_some).collect();
    layer.retain_indices(|i| vals[i].truthy() && (!opts.remove_empty || shapes_present[i]));
    log::debug!("filter: kept {} of {before} feature(s)", layer.len());
    Ok(())
}

/// `each`: runs an assignment program against every record.
pub fn each(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = EachOptions::from_map(options)?;
    let program = compile_for_layer(&expression(opts.expression)?, layer)?;
    run_all(&program, layer, arcs)
}

/// Builds one program from `{ field: expression }` pairs, in order.
fn calc_program(expressions: &serde_json::Map<String, Value>) -> OpResult<Program> {
    let mut statements = Vec::with_capacity(expressions.len());
    for (field, src) in expressions {
        let src = match src {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            _ => {
                return Err(OperationError::InvalidOption {
                    name: field.clone(),
                    reason: "expected an expression string".into(),
                });
            }
        };
        let mut parsed = compile(&src)?;
        match (parsed.statements.len(), parsed.statements.pop()) {
            (1, Some(Statement::Expr(expr))) => statements.push(Statement::Assign(field.clone(), expr)),
            _ => {
                return Err(ExpressionError::Syntax {
                    pos: 0,
                    msg: format!("`{field}`: `{src}` is not a single expression"),
                }
                .into());
            }
        }
    }
    Ok(Program { statements })
}

/// `calc`: assigns each `field: expression` pair in order, so later
/// expressions can read fields computed by earlier ones.
///
/// Pairs come from `expressions`, or from the top level of the options
/// when that is absent (`{ "area": "width * height" }`).
pub fn calc(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = CalcOptions::from_map(options)?;
    let pairs = if opts.expressions.is_empty() { &opts.extra } else { &opts.expressions };
    if pairs.is_empty() {
        return Err(OperationError::InvalidOption {
            name: "expressions".into(),
            reason: "missing".into(),
        });
    }
    let program = calc_program(pairs)?;
    if !layer.is_empty() {
        program.check_fields(layer.field_names())?;
    }
    run_all(&program, layer, arcs)
}

/// `sort`: stable sort by expression value; nulls sort first.
pub fn sort(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = SortOptions::from_map(options)?;
    let program = compile_for_layer(&expression(opts.expression)?, layer)?;
    let vals = values(&program, layer, arcs)?;
    let mut order: Vec<usize> = (0..layer.len()).collect();
    order.sort_by(|&a, &b| {
        let ord = vals[a].sort_cmp(&vals[b]);
        if opts.descending { ord.reverse() } else { ord }
    });
    layer.reorder(&order);
    Ok(())
}

/// `uniq`: keeps the first feature for each distinct expression value.
pub fn uniq(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = UniqOptions::from_map(options)?;
    let program = compile_for_layer(&expression(opts.expression)?, layer)?;
    let vals = values(&program, layer, arcs)?;
    let mut seen = HashSet::new();
    let keep: Vec<bool> = vals
        .into_iter()
        .map(|v| seen.insert(serde_json::to_string(&v.into_json()).unwrap_or_default()))
        .collect();
    layer.retain_indices(|i| keep[i]);
    Ok(())
}

/// Join key: numbers and strings with the same text match each other.
fn join_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `join`: copies attributes from the source layer into matching target
/// records. Unmatched records get `null` for every joined field.
pub fn join(
    targets: &[Layer],
    source: &Layer,
    _arcs: &mut ArcPool,
    _source_arcs: &ArcPool,
    options: &OptionMap,
) -> OpResult<Vec<Layer>> {
    let opts = JoinOptions::from_map(options)?;
    let (target_key, source_key) = match opts.keys.as_slice() {
        [k] => (k.clone(), k.clone()),
        [t, s] => (t.clone(), s.clone()),
        _ => {
            return Err(OperationError::InvalidOption {
                name: "keys".into(),
                reason: "expected one or two key fields".into(),
            });
        }
    };
    if !source.is_empty() && !source.has_field(&source_key) {
        return Err(OperationError::InvalidOption {
            name: "keys".into(),
            reason: format!("source has no field `{source_key}`"),
        });
    }
    let fields: Vec<String> = opts.fields.unwrap_or_else(|| {
        source
            .field_names()
            .into_iter()
            .filter(|f| *f != source_key)
            .collect()
    });
    let mut index: HashMap<String, &Record> = HashMap::new();
    for record in &source.records {
        if let Some(key) = record.get(&source_key).and_then(join_key) {
            index.entry(key).or_insert(record);
        }
    }
    let mut out = targets.to_vec();
    for layer in &mut out {
        if !layer.is_empty() && !layer.has_field(&target_key) {
            return Err(OperationError::InvalidOption {
                name: "keys".into(),
                reason: format!("target has no field `{target_key}`"),
            });
        }
        let mut matched = 0;
        for record in &mut layer.records {
            let hit = record
                .get(&target_key)
                .and_then(join_key)
                .and_then(|k| index.get(&k).copied());
            matched += usize::from(hit.is_some());
            for field in &fields {
                let v = hit.and_then(|r| r.get(field)).cloned().unwrap_or(Value::Null);
                record.insert(field.clone(), v);
            }
        }
        log::debug!("join: matched {matched} of {} record(s)", layer.len());
    }
    Ok(out)
}

/// `rename_fields`: `new=old` pairs; field order is kept.
pub fn rename_fields(layer: &mut Layer, _arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = FieldsOptions::from_map(options)?;
    let mut renames: HashMap<String, String> = HashMap::new();
    for pair in &opts.fields {
        let Some((new, old)) = pair.split_once('=') else {
            return Err(OperationError::InvalidOption {
                name: "fields".into(),
                reason: format!("`{pair}` is not a new=old pair"),
            });
        };
        renames.insert(old.trim().to_string(), new.trim().to_string());
    }
    for record in &mut layer.records {
        *record = std::mem::take(record)
            .into_iter()
            .map(|(k, v)| (renames.get(&k).cloned().unwrap_or(k), v))
            .collect();
    }
    Ok(())
}

/// `filter_fields`: keeps only the listed fields.
pub fn filter_fields(layer: &mut Layer, _arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = FieldsOptions::from_map(options)?;
    let keep: HashSet<&str> = opts.fields.iter().map(String::as_str).collect();
    for missing in opts.fields.iter().filter(|f| !layer.is_empty() && !layer.has_field(f)) {
        log::warn!("filter_fields: layer has no field `{missing}`");
    }
    for record in &mut layer.records {
        record.retain(|k, _| keep.contains(k.as_str()));
    }
    Ok(())
}

/// `drop`: removes fields, all geometry, or polygon holes.
pub fn drop(layer: &mut Layer, arcs: &mut ArcPool, options: &OptionMap) -> OpResult<()> {
    let opts = DropOptions::from_map(options)?;
    if !opts.fields.is_empty() {
        let gone: HashSet<&str> = opts.fields.iter().map(String::as_str).collect();
        for record in &mut layer.records {
            record.retain(|k, _| !gone.contains(k.as_str()));
        }
    }
    if opts.geometry {
        layer.shapes.iter_mut().for_each(|s| *s = None);
        layer.geometry_type = None;
    } else if opts.holes {
        for shape in layer.shapes.iter_mut().flatten() {
            if let Shape::Paths(rings) = shape {
                rings.retain(|ring| {
                    ring_signed_area(&arcs.path_coords(ring)).partial_cmp(&0.0) != Some(Ordering::Less)
                });
            }
        }
    }
    Ok(())
}
