//! Public entry points: GeoJSON in, GeoJSON out.
//!
//! Every call follows the same fixed flow:
//!
//! 1. validate each GeoJSON input,
//! 2. check required parameters,
//! 3. import each input into its own [`Dataset`],
//! 4. invoke one registered [`Operation`],
//! 5. install the [`Outcome`](operation::Outcome) and validate invariants,
//! 6. export.
//!
//! Nothing is exported when any step fails. [`Api`] carries the command
//! registry plus import/export settings; the crate-level functions use a
//! lazily built default `Api` with the built-in collaborators.

pub mod merge;
pub mod operation;
pub mod options;

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::algs::error::OperationError;
use crate::algs::info::{Info, dataset_info};
use crate::debug_invariants::DebugInvariants;
use crate::io::export::{ExportOptions, export_dataset, export_layers};
use crate::io::geojson::FeatureCollection;
use crate::io::import::{ImportOptions, import_geojson};
use crate::io::validate::validate_geojson;
use crate::shaper_error::{Result, ShaperError};
use crate::topology::dataset::Dataset;

pub use operation::{Command, Commands, Operation, Outcome};
pub use options::*;

/// Result of an operation: one collection, or one per layer for splitting
/// operations that produced several layers.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    One(FeatureCollection),
    Many(Vec<FeatureCollection>),
}

impl Output {
    /// All features in one collection, layers concatenated.
    pub fn into_collection(self) -> FeatureCollection {
        match self {
            Output::One(fc) => fc,
            Output::Many(all) => FeatureCollection::new(all.into_iter().flatten().collect()),
        }
    }

    pub fn into_collections(self) -> Vec<FeatureCollection> {
        match self {
            Output::One(fc) => vec![fc],
            Output::Many(all) => all,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Output::Many(_))
    }
}

/// The orchestrator.
#[derive(Debug)]
pub struct Api {
    commands: Commands,
    import: ImportOptions,
    export: ExportOptions,
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

fn prefixed(label: &str, err: ShaperError) -> ShaperError {
    match err {
        ShaperError::Validation(msg) => ShaperError::Validation(format!("{label}: {msg}")),
        other => other,
    }
}

impl Api {
    /// Orchestrator with every built-in collaborator registered.
    pub fn new() -> Self {
        Self::with_commands(Commands::builtin())
    }

    pub fn with_commands(commands: Commands) -> Self {
        Self {
            commands,
            import: ImportOptions::default(),
            export: ExportOptions::default(),
        }
    }

    pub fn with_import_options(mut self, options: ImportOptions) -> Self {
        self.import = options;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.export = options;
        self
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    /// Mutable registry, for replacing built-in collaborators.
    pub fn commands_mut(&mut self) -> &mut Commands {
        &mut self.commands
    }

    fn operation(&self, command: Command) -> Result<&Operation> {
        self.commands.get(command).ok_or_else(|| {
            ShaperError::Operation(OperationError::unsupported(
                command.name(),
                "this registry (no collaborator registered)",
            ))
        })
    }

    fn import(&self, input: &Value) -> Result<Dataset> {
        import_geojson(input, &self.import)
    }

    fn execute(
        &self,
        command: Command,
        mut target: Dataset,
        source: Option<Dataset>,
        options: &Map<String, Value>,
    ) -> Result<Output> {
        let op = self.operation(command)?;
        log::debug!(
            "{command}: invoking {} operation on {} feature(s)",
            op.convention(),
            target.feature_count()
        );
        let outcome = op.invoke(&mut target, source.as_ref(), options)?;
        outcome.apply(&mut target);
        target.validate_invariants()?;
        log::debug!(
            "{command}: {} layer(s), {} feature(s), {} arc(s)",
            target.layers.len(),
            target.feature_count(),
            target.arcs.len()
        );
        if matches!(op, Operation::Splitting(_)) && target.layers.len() > 1 {
            Ok(Output::Many(export_layers(&target, &self.export)))
        } else {
            Ok(Output::One(export_dataset(&target, &self.export)))
        }
    }

    /// Runs a single-input command with raw options.
    pub fn run(&self, command: Command, input: &Value, options: &OptionMap) -> Result<Output> {
        validate_geojson(input)?;
        check_required(command, options)?;
        let target = self.import(input)?;
        self.execute(command, target, None, options)
    }

    /// Runs a two-input command with raw options.
    pub fn run_with_source(
        &self,
        command: Command,
        target: &Value,
        source: &Value,
        options: &OptionMap,
    ) -> Result<Output> {
        validate_geojson(target).map_err(|e| prefixed("target", e))?;
        validate_geojson(source).map_err(|e| prefixed("source", e))?;
        check_required(command, options)?;
        let target = self.import(target).map_err(|e| prefixed("target", e))?;
        let source = self.import(source).map_err(|e| prefixed("source", e))?;
        self.execute(command, target, Some(source), options)
    }

    /// Runs a command that builds geometry from options alone.
    pub fn run_synthesizing(&self, command: Command, options: &OptionMap) -> Result<Output> {
        check_required(command, options)?;
        self.execute(command, Dataset::empty(), None, options)
    }

    fn single<O: Options>(&self, command: Command, input: &Value, options: &O) -> Result<FeatureCollection> {
        Ok(self.run(command, input, &options.to_map())?.into_collection())
    }

    fn dual<O: Options>(
        &self,
        command: Command,
        target: &Value,
        source: &Value,
        options: &O,
    ) -> Result<FeatureCollection> {
        Ok(self
            .run_with_source(command, target, source, &options.to_map())?
            .into_collection())
    }

    fn synth<O: Options>(&self, command: Command, options: &O) -> Result<FeatureCollection> {
        Ok(self.run_synthesizing(command, &options.to_map())?.into_collection())
    }

    /// Merges features that share the values of `fields`.
    pub fn dissolve(&self, input: &Value, options: &DissolveOptions) -> Result<FeatureCollection> {
        self.single(Command::Dissolve, input, options)
    }

    /// Dissolve with full polygon overlay, removing overlaps.
    pub fn dissolve2(&self, input: &Value, options: &DissolveOptions) -> Result<FeatureCollection> {
        self.single(Command::Dissolve2, input, options)
    }

    /// Merges all features into one.
    pub fn union(&self, input: &Value, options: &DissolveOptions) -> Result<FeatureCollection> {
        self.single(Command::Union, input, options)
    }

    /// Buffers every feature; `distance` overrides `options.distance`.
    pub fn buffer(
        &self,
        input: &Value,
        distance: Option<f64>,
        options: &BufferOptions,
    ) -> Result<FeatureCollection> {
        let options = BufferOptions {
            distance: distance.or(options.distance),
            ..options.clone()
        };
        self.single(Command::Buffer, input, &options)
    }

    /// Keeps the parts of `target` inside the polygons of `clip`.
    pub fn clip(&self, target: &Value, clip: &Value, options: &ClipOptions) -> Result<FeatureCollection> {
        self.dual(Command::Clip, target, clip, options)
    }

    /// Removes the parts of `target` inside the polygons of `eraser`.
    pub fn erase(&self, target: &Value, eraser: &Value, options: &ClipOptions) -> Result<FeatureCollection> {
        self.dual(Command::Erase, target, eraser, options)
    }

    /// Simplifies arcs; keeps 10% of removable vertices when no amount is
    /// given.
    pub fn simplify(&self, input: &Value, options: &SimplifyOptions) -> Result<FeatureCollection> {
        let mut options = options.clone();
        if options.percentage.is_none() && options.interval.is_none() && options.resolution.is_none() {
            options.percentage = Some(0.1);
        }
        self.single(Command::Simplify, input, &options)
    }

    /// Combines several inputs into one dataset by pool union.
    pub fn merge(&self, inputs: &[Value], options: &MergeOptions) -> Result<FeatureCollection> {
        if inputs.is_empty() {
            return Err(ShaperError::validation("merge needs at least one GeoJSON input"));
        }
        for (i, input) in inputs.iter().enumerate() {
            validate_geojson(input).map_err(|e| prefixed(&format!("input {i}"), e))?;
        }
        let datasets = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| self.import(input).map_err(|e| prefixed(&format!("input {i}"), e)))
            .collect::<Result<Vec<_>>>()?;
        let combined = merge::union_pools(datasets);
        combined.validate_invariants()?;
        if options.merge_layers {
            Ok(self
                .execute(Command::MergeLayers, combined, None, &options.to_map())?
                .into_collection())
        } else {
            Ok(export_dataset(&combined, &self.export))
        }
    }

    /// Merges inputs into a single layer.
    pub fn merge_layers(&self, inputs: &[Value], options: &MergeLayersOptions) -> Result<FeatureCollection> {
        let mut extra = options.to_map();
        extra.remove("merge_layers");
        self.merge(
            inputs,
            &MergeOptions {
                merge_layers: true,
                extra,
            },
        )
    }

    /// Keeps features whose expression is truthy.
    pub fn filter(&self, input: &Value, options: &FilterOptions) -> Result<FeatureCollection> {
        self.single(Command::Filter, input, options)
    }

    /// Assigns `field -> expression` pairs in order.
    pub fn calc(&self, input: &Value, options: &CalcOptions) -> Result<FeatureCollection> {
        self.single(Command::Calc, input, options)
    }

    /// Runs an assignment program on every feature.
    pub fn each(&self, input: &Value, options: &EachOptions) -> Result<FeatureCollection> {
        self.single(Command::Each, input, options)
    }

    pub fn sort(&self, input: &Value, options: &SortOptions) -> Result<FeatureCollection> {
        self.single(Command::Sort, input, options)
    }

    pub fn uniq(&self, input: &Value, options: &UniqOptions) -> Result<FeatureCollection> {
        self.single(Command::Uniq, input, options)
    }

    /// Copies attributes from `source` records to matching `target` records.
    pub fn join(&self, target: &Value, source: &Value, options: &JoinOptions) -> Result<FeatureCollection> {
        self.dual(Command::Join, target, source, options)
    }

    pub fn snap(&self, input: &Value, options: &SnapOptions) -> Result<FeatureCollection> {
        self.single(Command::Snap, input, options)
    }

    pub fn filter_slivers(&self, input: &Value, options: &FilterSliversOptions) -> Result<FeatureCollection> {
        self.single(Command::FilterSlivers, input, options)
    }

    pub fn filter_islands(&self, input: &Value, options: &FilterIslandsOptions) -> Result<FeatureCollection> {
        self.single(Command::FilterIslands, input, options)
    }

    /// Removes polygon overlaps and small gaps.
    pub fn clean(&self, input: &Value, options: &CleanOptions) -> Result<FeatureCollection> {
        self.single(Command::Clean, input, options)
    }

    pub fn explode(&self, input: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.single(Command::Explode, input, options)
    }

    pub fn points(&self, input: &Value, options: &PointsOptions) -> Result<FeatureCollection> {
        self.single(Command::Points, input, options)
    }

    pub fn lines(&self, input: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.single(Command::Lines, input, options)
    }

    pub fn polygons(&self, input: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.single(Command::Polygons, input, options)
    }

    pub fn mosaic(&self, input: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.single(Command::Mosaic, input, options)
    }

    pub fn innerlines(&self, input: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.single(Command::Innerlines, input, options)
    }

    /// Cuts the polygons of `inlay` into `target`.
    pub fn inlay(&self, target: &Value, inlay: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.dual(Command::Inlay, target, inlay, options)
    }

    /// One output collection per distinct `field` value.
    pub fn split(&self, input: &Value, options: &SplitOptions) -> Result<Output> {
        self.run(Command::Split, input, &options.to_map())
    }

    /// Splits the polylines of `target` at the boundaries of `divider`.
    pub fn divide(&self, target: &Value, divider: &Value, options: &PassThroughOptions) -> Result<FeatureCollection> {
        self.dual(Command::Divide, target, divider, options)
    }

    pub fn rectangle(&self, options: &RectangleOptions) -> Result<FeatureCollection> {
        self.synth(Command::Rectangle, options)
    }

    pub fn graticule(&self, options: &GraticuleOptions) -> Result<FeatureCollection> {
        self.synth(Command::Graticule, options)
    }

    pub fn point_grid(&self, options: &PointGridOptions) -> Result<FeatureCollection> {
        self.synth(Command::PointGrid, options)
    }

    pub fn affine(&self, input: &Value, options: &AffineOptions) -> Result<FeatureCollection> {
        self.single(Command::Affine, input, options)
    }

    pub fn proj(&self, input: &Value, options: &ProjOptions) -> Result<FeatureCollection> {
        self.single(Command::Proj, input, options)
    }

    /// Renames fields given as `new=old` pairs.
    pub fn rename_fields(&self, input: &Value, options: &FieldsOptions) -> Result<FeatureCollection> {
        self.single(Command::RenameFields, input, options)
    }

    /// Keeps only the listed fields.
    pub fn filter_fields(&self, input: &Value, options: &FieldsOptions) -> Result<FeatureCollection> {
        self.single(Command::FilterFields, input, options)
    }

    pub fn drop(&self, input: &Value, options: &DropOptions) -> Result<FeatureCollection> {
        self.single(Command::Drop, input, options)
    }

    /// Summary of the imported dataset.
    pub fn info(&self, input: &Value) -> Result<Info> {
        validate_geojson(input)?;
        Ok(dataset_info(&self.import(input)?))
    }
}

static DEFAULT_API: Lazy<Api> = Lazy::new(Api::new);

/// The shared default orchestrator behind the crate-level functions.
pub fn default_api() -> &'static Api {
    &DEFAULT_API
}

macro_rules! default_api_fns {
    ($($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            $(#[$meta])*
            pub fn $name($($arg: $ty),*) -> Result<$ret> {
                DEFAULT_API.$name($($arg),*)
            }
        )*
    };
}

default_api_fns! {
    /// See [`Api::dissolve`].
    dissolve(input: &Value, options: &DissolveOptions) -> FeatureCollection;
    /// See [`Api::dissolve2`].
    dissolve2(input: &Value, options: &DissolveOptions) -> FeatureCollection;
    union(input: &Value, options: &DissolveOptions) -> FeatureCollection;
    /// See [`Api::buffer`].
    buffer(input: &Value, distance: Option<f64>, options: &BufferOptions) -> FeatureCollection;
    clip(target: &Value, clip: &Value, options: &ClipOptions) -> FeatureCollection;
    erase(target: &Value, eraser: &Value, options: &ClipOptions) -> FeatureCollection;
    simplify(input: &Value, options: &SimplifyOptions) -> FeatureCollection;
    /// See [`Api::merge`].
    merge(inputs: &[Value], options: &MergeOptions) -> FeatureCollection;
    merge_layers(inputs: &[Value], options: &MergeLayersOptions) -> FeatureCollection;
    filter(input: &Value, options: &FilterOptions) -> FeatureCollection;
    calc(input: &Value, options: &CalcOptions) -> FeatureCollection;
    each(input: &Value, options: &EachOptions) -> FeatureCollection;
    sort(input: &Value, options: &SortOptions) -> FeatureCollection;
    uniq(input: &Value, options: &UniqOptions) -> FeatureCollection;
    join(target: &Value, source: &Value, options: &JoinOptions) -> FeatureCollection;
    snap(input: &Value, options: &SnapOptions) -> FeatureCollection;
    filter_slivers(input: &Value, options: &FilterSliversOptions) -> FeatureCollection;
    filter_islands(input: &Value, options: &FilterIslandsOptions) -> FeatureCollection;
    clean(input: &Value, options: &CleanOptions) -> FeatureCollection;
    explode(input: &Value, options: &PassThroughOptions) -> FeatureCollection;
    points(input: &Value, options: &PointsOptions) -> FeatureCollection;
    lines(input: &Value, options: &PassThroughOptions) -> FeatureCollection;
    polygons(input: &Value, options: &PassThroughOptions) -> FeatureCollection;
    mosaic(input: &Value, options: &PassThroughOptions) -> FeatureCollection;
    innerlines(input: &Value, options: &PassThroughOptions) -> FeatureCollection;
    inlay(target: &Value, inlay: &Value, options: &PassThroughOptions) -> FeatureCollection;
    /// See [`Api::split`].
    split(input: &Value, options: &SplitOptions) -> Output;
    divide(target: &Value, divider: &Value, options: &PassThroughOptions) -> FeatureCollection;
    rectangle(options: &RectangleOptions) -> FeatureCollection;
    graticule(options: &GraticuleOptions) -> FeatureCollection;
    point_grid(options: &PointGridOptions) -> FeatureCollection;
    affine(input: &Value, options: &AffineOptions) -> FeatureCollection;
    proj(input: &Value, options: &ProjOptions) -> FeatureCollection;
    rename_fields(input: &Value, options: &FieldsOptions) -> FeatureCollection;
    filter_fields(input: &Value, options: &FieldsOptions) -> FeatureCollection;
    drop(input: &Value, options: &DropOptions) -> FeatureCollection;
    /// See [`Api::info`].
    info(input: &Value) -> Info;
}
