//! Typed per-operation configuration.
//!
//! Every options struct deserializes from the loose JSON objects callers
//! pass around (hyphenated aliases such as `"sum-fields"`, comma-separated
//! strings for field lists) and keeps unrecognized keys in `extra`, which
//! travels to the collaborator unchanged. The orchestrator hands options to
//! collaborators as an [`OptionMap`]; [`Options::from_map`] recovers the
//! typed view.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::algs::error::OperationError;
use crate::api::operation::Command;
use crate::shaper_error::{Result, ShaperError};

/// Options as seen by a collaborator.
pub type OptionMap = Map<String, Value>;

/// Conversion between typed options and [`OptionMap`].
pub trait Options: Serialize + DeserializeOwned + Default {
    fn to_map(&self) -> OptionMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => OptionMap::new(),
        }
    }

    fn from_map(map: &OptionMap) -> Result<Self, OperationError> {
        serde_json::from_value(Value::Object(map.clone())).map_err(|e| {
            OperationError::InvalidOption {
                name: "options".into(),
                reason: e.to_string(),
            }
        })
    }
}

impl<T: Serialize + DeserializeOwned + Default> Options for T {}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accepts `"a,b"` or `["a", "b"]`.
fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(d)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(OneOrMany::Many(v)) => v,
    })
}

fn opt_string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    let v = string_or_list(d)?;
    Ok((!v.is_empty()).then_some(v))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Num(f64),
    Text(String),
}

/// Accepts `12.5` or `"12.5"`.
fn number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumOrText>::deserialize(d)? {
        None => Ok(None),
        Some(NumOrText::Num(n)) => Ok(Some(n)),
        Some(NumOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("`{s}` is not a number"))),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissolveOptions {
    #[serde(deserialize_with = "string_or_list", alias = "field")]
    pub fields: Vec<String>,
    #[serde(deserialize_with = "string_or_list", alias = "sum-fields")]
    pub sum_fields: Vec<String>,
    #[serde(deserialize_with = "string_or_list", alias = "copy-fields")]
    pub copy_fields: Vec<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferOptions {
    #[serde(deserialize_with = "number_or_string")]
    pub distance: Option<f64>,
    /// Segments per full circle.
    pub segments: usize,
    #[serde(flatten)]
    pub extra: OptionMap,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            distance: None,
            segments: 16,
            extra: OptionMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipOptions {
    /// Restricts the clip region to `[xmin, ymin, xmax, ymax]`.
    pub bbox: Option<[f64; 4]>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimplifyMethod {
    #[serde(alias = "rdp")]
    Dp,
    #[default]
    #[serde(alias = "weighted")]
    Visvalingam,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyOptions {
    /// Fraction of removable vertices to keep; values above 1 are percents.
    #[serde(deserialize_with = "number_or_string")]
    pub percentage: Option<f64>,
    /// Tolerance in coordinate units.
    #[serde(deserialize_with = "number_or_string")]
    pub interval: Option<f64>,
    /// Output resolution; the tolerance becomes the larger bbox side over it.
    #[serde(deserialize_with = "number_or_string")]
    pub resolution: Option<f64>,
    pub method: SimplifyMethod,
    #[serde(alias = "keep-shapes")]
    pub keep_shapes: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub expression: Option<String>,
    #[serde(alias = "remove-empty")]
    pub remove_empty: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

impl FilterOptions {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::default()
        }
    }
}

/// `each`: one program run per feature.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EachOptions {
    pub expression: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

/// `calc`: `field -> expression` pairs, evaluated in insertion order.
///
/// A raw option map without `expressions` is read as the pairs themselves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcOptions {
    pub expressions: Map<String, Value>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    pub expression: Option<String>,
    pub descending: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqOptions {
    pub expression: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    /// `[target_field, source_field]`; a single name is used for both.
    #[serde(deserialize_with = "string_or_list")]
    pub keys: Vec<String>,
    /// Source fields to copy; all but the key when absent.
    #[serde(deserialize_with = "opt_string_or_list")]
    pub fields: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapOptions {
    #[serde(deserialize_with = "number_or_string", alias = "interval")]
    pub precision: Option<f64>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSliversOptions {
    #[serde(deserialize_with = "number_or_string", alias = "min-area")]
    pub min_area: Option<f64>,
    #[serde(alias = "remove-empty")]
    pub remove_empty: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterIslandsOptions {
    #[serde(deserialize_with = "number_or_string", alias = "min-area")]
    pub min_area: Option<f64>,
    /// Drop islands with fewer vertices than this.
    #[serde(alias = "min-vertices")]
    pub min_vertices: Option<usize>,
    #[serde(alias = "remove-empty")]
    pub remove_empty: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    /// Gaps smaller than this are filled after overlaps are resolved.
    #[serde(deserialize_with = "number_or_string", alias = "min-gap-area")]
    pub min_gap_area: Option<f64>,
    #[serde(alias = "allow-overlaps")]
    pub allow_overlaps: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

/// Options for commands that take no settings of their own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassThroughOptions {
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsOptions {
    pub centroid: bool,
    pub vertices: bool,
    pub endpoints: bool,
    /// Build points from these attribute fields.
    pub x: Option<String>,
    pub y: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    pub field: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeLayersOptions {
    /// Merge even when field types differ.
    pub force: bool,
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    #[serde(alias = "merge-layers")]
    pub merge_layers: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            merge_layers: true,
            extra: OptionMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectangleOptions {
    pub bbox: Option<[f64; 4]>,
    /// Grow the rectangle by this amount on every side.
    pub offset: f64,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraticuleOptions {
    /// Degrees between lines.
    pub interval: f64,
    #[serde(flatten)]
    pub extra: OptionMap,
}

impl Default for GraticuleOptions {
    fn default() -> Self {
        Self {
            interval: 10.0,
            extra: OptionMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointGridOptions {
    pub bbox: Option<[f64; 4]>,
    #[serde(deserialize_with = "number_or_string")]
    pub interval: Option<f64>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffineOptions {
    pub shift: Option<[f64; 2]>,
    pub scale: Option<f64>,
    /// Degrees counter-clockwise.
    pub rotate: Option<f64>,
    /// Pivot for scale and rotate; defaults to the bbox center.
    pub anchor: Option<[f64; 2]>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjOptions {
    #[serde(alias = "dest")]
    pub crs: Option<String>,
    #[serde(alias = "init")]
    pub from: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsOptions {
    #[serde(deserialize_with = "string_or_list")]
    pub fields: Vec<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropOptions {
    #[serde(deserialize_with = "string_or_list")]
    pub fields: Vec<String>,
    pub geometry: bool,
    pub holes: bool,
    #[serde(flatten)]
    pub extra: OptionMap,
}

/// Parameters that must be present before a command runs.
pub fn required_parameters(command: Command) -> &'static [&'static str] {
    match command {
        Command::Buffer => &["distance"],
        Command::Filter | Command::Each | Command::Sort | Command::Uniq => &["expression"],
        Command::Calc => &["expressions"],
        Command::Join => &["keys"],
        Command::Rectangle => &["bbox"],
        Command::PointGrid => &["bbox", "interval"],
        Command::Proj => &["crs"],
        Command::RenameFields => &["fields"],
        _ => &[],
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Fails with [`ShaperError::MissingParameter`] for the first required
/// parameter of `command` absent from `options`.
pub fn check_required(command: Command, options: &OptionMap) -> Result<()> {
    // calc also takes its pairs at the top level
    if command == Command::Calc && options.keys().any(|k| k != "expressions") {
        return Ok(());
    }
    for &name in required_parameters(command) {
        let hyphenated = name.replace('_', "-");
        if !is_present(options.get(name)) && !is_present(options.get(&hyphenated)) {
            return Err(ShaperError::MissingParameter(name));
        }
    }
    Ok(())
}
