//! The operation contract between the orchestrator and its collaborators.
//!
//! Operations come with different calling conventions: some edit a layer in
//! place, some return a replacement layer, some return several layers, some
//! need a second dataset, and some build geometry from nothing. Each
//! collaborator is registered under one [`Operation`] variant and invoked
//! through a single exhaustive match in [`Operation::invoke`].

use std::fmt;
use std::str::FromStr;

use hashbrown::HashMap;

use crate::algs::error::{OpResult, OperationError};
use crate::api::options::OptionMap;
use crate::topology::arc_pool::ArcPool;
use crate::topology::dataset::Dataset;
use crate::topology::layer::Layer;

pub type MutatingFn = Box<dyn Fn(&mut Layer, &mut ArcPool, &OptionMap) -> OpResult<()> + Send + Sync>;
pub type ReplacingFn = Box<dyn Fn(&Layer, &mut ArcPool, &OptionMap) -> OpResult<Layer> + Send + Sync>;
pub type SplittingFn =
    Box<dyn Fn(&[Layer], &mut ArcPool, &OptionMap) -> OpResult<Vec<Layer>> + Send + Sync>;
pub type DualDatasetFn = Box<
    dyn Fn(&[Layer], &Layer, &mut ArcPool, &ArcPool, &OptionMap) -> OpResult<Vec<Layer>>
        + Send
        + Sync,
>;
pub type SynthesizingFn = Box<dyn Fn(&mut ArcPool, &OptionMap) -> OpResult<Layer> + Send + Sync>;

/// A collaborator tagged with its calling convention.
pub enum Operation {
    /// Edits the layer (and possibly the arcs) in place.
    Mutating(MutatingFn),
    /// Returns a new layer over the same pool; may append arcs.
    Replacing(ReplacingFn),
    /// Returns any number of layers over the same pool.
    Splitting(SplittingFn),
    /// Reads a second dataset; the target pool stays authoritative.
    DualDataset(DualDatasetFn),
    /// Builds a layer into an empty pool.
    Synthesizing(SynthesizingFn),
}

/// What an invocation produced.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The target dataset was edited in place.
    InPlace,
    Replaced(Layer),
    Layers(Vec<Layer>),
}

impl Operation {
    pub fn mutating(
        f: impl Fn(&mut Layer, &mut ArcPool, &OptionMap) -> OpResult<()> + Send + Sync + 'static,
    ) -> Self {
        Operation::Mutating(Box::new(f))
    }

    pub fn replacing(
        f: impl Fn(&Layer, &mut ArcPool, &OptionMap) -> OpResult<Layer> + Send + Sync + 'static,
    ) -> Self {
        Operation::Replacing(Box::new(f))
    }

    pub fn splitting(
        f: impl Fn(&[Layer], &mut ArcPool, &OptionMap) -> OpResult<Vec<Layer>> + Send + Sync + 'static,
    ) -> Self {
        Operation::Splitting(Box::new(f))
    }

    pub fn dual_dataset(
        f: impl Fn(&[Layer], &Layer, &mut ArcPool, &ArcPool, &OptionMap) -> OpResult<Vec<Layer>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Operation::DualDataset(Box::new(f))
    }

    pub fn synthesizing(
        f: impl Fn(&mut ArcPool, &OptionMap) -> OpResult<Layer> + Send + Sync + 'static,
    ) -> Self {
        Operation::Synthesizing(Box::new(f))
    }

    /// Name of the calling convention, for logs.
    pub fn convention(&self) -> &'static str {
        match self {
            Operation::Mutating(_) => "mutating",
            Operation::Replacing(_) => "replacing",
            Operation::Splitting(_) => "splitting",
            Operation::DualDataset(_) => "dual-dataset",
            Operation::Synthesizing(_) => "synthesizing",
        }
    }

    pub fn needs_source(&self) -> bool {
        matches!(self, Operation::DualDataset(_))
    }

    /// Runs the collaborator against `target` (and `source` for dual-dataset
    /// operations).
    ///
    /// Mutating and replacing collaborators see each layer of `target` in
    /// turn.
    pub fn invoke(
        &self,
        target: &mut Dataset,
        source: Option<&Dataset>,
        options: &OptionMap,
    ) -> OpResult<Outcome> {
        match self {
            Operation::Mutating(f) => {
                let Dataset { arcs, layers, .. } = target;
                for layer in layers.iter_mut() {
                    f(layer, arcs, options)?;
                }
                Ok(Outcome::InPlace)
            }
            Operation::Replacing(f) => {
                let mut out = Vec::with_capacity(target.layers.len());
                for layer in &target.layers {
                    out.push(f(layer, &mut target.arcs, options)?);
                }
                Ok(match out.len() {
                    1 => Outcome::Replaced(out.remove(0)),
                    _ => Outcome::Layers(out),
                })
            }
            Operation::Splitting(f) => Ok(Outcome::Layers(f(
                &target.layers,
                &mut target.arcs,
                options,
            )?)),
            Operation::DualDataset(f) => {
                let source = source.ok_or_else(|| {
                    OperationError::Failed("operation needs a second dataset".into())
                })?;
                let source_layer = source.layers.first().ok_or_else(|| {
                    OperationError::LayerMismatch("second dataset has no layers".into())
                })?;
                Ok(Outcome::Layers(f(
                    &target.layers,
                    source_layer,
                    &mut target.arcs,
                    &source.arcs,
                    options,
                )?))
            }
            Operation::Synthesizing(f) => Ok(Outcome::Replaced(f(&mut target.arcs, options)?)),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation::{}", self.convention())
    }
}

impl Outcome {
    /// Installs the produced layers into `dataset`.
    pub fn apply(self, dataset: &mut Dataset) {
        match self {
            Outcome::InPlace => {}
            Outcome::Replaced(layer) => dataset.layers = vec![layer],
            Outcome::Layers(layers) => dataset.layers = layers,
        }
    }
}

macro_rules! commands {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Names of every operation on the public surface.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum Command {
            $($variant),*
        }

        impl Command {
            pub const ALL: &'static [Command] = &[$(Command::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Command::$variant => $name),*
                }
            }
        }

        impl FromStr for Command {
            type Err = OperationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.replace('-', "_");
                match normalized.as_str() {
                    $($name => Ok(Command::$variant),)*
                    _ => Err(OperationError::unsupported("command", s)),
                }
            }
        }
    };
}

commands! {
    Dissolve => "dissolve",
    Dissolve2 => "dissolve2",
    Union => "union",
    Buffer => "buffer",
    Clip => "clip",
    Erase => "erase",
    Simplify => "simplify",
    Filter => "filter",
    Calc => "calc",
    Each => "each",
    Sort => "sort",
    Uniq => "uniq",
    Join => "join",
    Snap => "snap",
    FilterSlivers => "filter_slivers",
    FilterIslands => "filter_islands",
    Clean => "clean",
    Explode => "explode",
    Points => "points",
    Lines => "lines",
    Polygons => "polygons",
    Mosaic => "mosaic",
    Innerlines => "innerlines",
    Inlay => "inlay",
    Split => "split",
    MergeLayers => "merge_layers",
    Divide => "divide",
    Rectangle => "rectangle",
    Graticule => "graticule",
    PointGrid => "point_grid",
    Affine => "affine",
    Proj => "proj",
    RenameFields => "rename_fields",
    FilterFields => "filter_fields",
    Drop => "drop",
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry mapping command names to collaborators.
#[derive(Debug, Default)]
pub struct Commands {
    ops: HashMap<Command, Operation>,
}

impl Commands {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in collaborator.
    pub fn builtin() -> Self {
        crate::algs::builtin_commands()
    }

    /// Installs `op` for `command`, returning the collaborator it replaced.
    pub fn register(&mut self, command: Command, op: Operation) -> Option<Operation> {
        self.ops.insert(command, op)
    }

    pub fn get(&self, command: Command) -> Option<&Operation> {
        self.ops.get(&command)
    }

    pub fn contains(&self, command: Command) -> bool {
        self.ops.contains_key(&command)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::layer::Record;
    use serde_json::json;

    fn two_feature_dataset() -> Dataset {
        let mut layer = Layer::new(None);
        layer.push(None, json!({ "v": 1 }).as_object().cloned().unwrap());
        layer.push(None, json!({ "v": 2 }).as_object().cloned().unwrap());
        Dataset {
            layers: vec![layer],
            ..Dataset::default()
        }
    }

    #[test]
    fn names_round_trip() {
        for &c in Command::ALL {
            assert_eq!(c.name().parse::<Command>().unwrap(), c);
        }
        assert_eq!("filter-slivers".parse::<Command>().unwrap(), Command::FilterSlivers);
        assert!("dots".parse::<Command>().is_err());
    }

    #[test]
    fn mutating_edits_in_place() {
        let op = Operation::mutating(|layer, _, _| {
            layer.records.iter_mut().for_each(|r| {
                r.insert("seen".into(), json!(true));
            });
            Ok(())
        });
        let mut ds = two_feature_dataset();
        assert_eq!(op.invoke(&mut ds, None, &OptionMap::new()), Ok(Outcome::InPlace));
        assert!(ds.layers[0].records.iter().all(|r| r["seen"] == json!(true)));
    }

    #[test]
    fn replacing_returns_one_layer() {
        let op = Operation::replacing(|layer, _, _| {
            let mut out = Layer::new(layer.geometry_type);
            out.push(None, Record::new());
            Ok(out)
        });
        let mut ds = two_feature_dataset();
        let outcome = op.invoke(&mut ds, None, &OptionMap::new()).unwrap();
        outcome.apply(&mut ds);
        assert_eq!(ds.layers.len(), 1);
        assert_eq!(ds.layers[0].len(), 1);
    }

    #[test]
    fn dual_dataset_requires_source() {
        let op = Operation::dual_dataset(|targets, _, _, _, _| Ok(targets.to_vec()));
        let mut ds = two_feature_dataset();
        assert!(matches!(
            op.invoke(&mut ds, None, &OptionMap::new()),
            Err(OperationError::Failed(_))
        ));
        let source = two_feature_dataset();
        assert!(op.invoke(&mut ds, Some(&source), &OptionMap::new()).is_ok());
    }

    #[test]
    fn registry_replaces_collaborators() {
        let mut commands = Commands::new();
        assert!(commands
            .register(Command::Filter, Operation::mutating(|_, _, _| Ok(())))
            .is_none());
        assert!(commands
            .register(Command::Filter, Operation::mutating(|_, _, _| Ok(())))
            .is_some());
        assert_eq!(commands.len(), 1);
    }
}
