//! Built-in operation collaborators.
//!
//! Each function here has the signature of one [`Operation`] calling
//! convention and is registered under its [`Command`] by
//! [`builtin_commands`].

pub mod attributes;
pub mod buffer;
pub mod convert;
pub mod dissolve;
pub mod error;
pub mod info;
pub mod overlay;
pub mod simplify;
pub mod slivers;
pub mod split;
pub mod synth;
pub mod transform;

pub use error::{OpResult, OperationError};
pub use info::{Info, LayerInfo, dataset_info};

use crate::api::operation::{Command, Commands, Operation};

/// Registry with a collaborator for every built-in command.
pub fn builtin_commands() -> Commands {
    let mut commands = Commands::new();
    let table: Vec<(Command, Operation)> = vec![
        (Command::Dissolve, Operation::replacing(dissolve::dissolve)),
        (Command::Dissolve2, Operation::splitting(dissolve::dissolve2)),
        (Command::Union, Operation::splitting(dissolve::union)),
        (Command::Buffer, Operation::replacing(buffer::buffer)),
        (Command::Clip, Operation::dual_dataset(overlay::clip)),
        (Command::Erase, Operation::dual_dataset(overlay::erase)),
        (Command::Simplify, Operation::mutating(simplify::simplify)),
        (Command::Filter, Operation::mutating(attributes::filter)),
        (Command::Calc, Operation::mutating(attributes::calc)),
        (Command::Each, Operation::mutating(attributes::each)),
        (Command::Sort, Operation::mutating(attributes::sort)),
        (Command::Uniq, Operation::mutating(attributes::uniq)),
        (Command::Join, Operation::dual_dataset(attributes::join)),
        (Command::Snap, Operation::mutating(transform::snap)),
        (Command::FilterSlivers, Operation::mutating(slivers::filter_slivers)),
        (Command::FilterIslands, Operation::mutating(slivers::filter_islands)),
        (Command::Clean, Operation::replacing(overlay::clean)),
        (Command::Explode, Operation::replacing(convert::explode)),
        (Command::Points, Operation::replacing(convert::points)),
        (Command::Lines, Operation::replacing(convert::lines)),
        (Command::Polygons, Operation::replacing(convert::polygons)),
        (Command::Mosaic, Operation::replacing(overlay::mosaic)),
        (Command::Innerlines, Operation::replacing(convert::innerlines)),
        (Command::Inlay, Operation::dual_dataset(overlay::inlay)),
        (Command::Split, Operation::splitting(split::split)),
        (Command::MergeLayers, Operation::splitting(split::merge_layers)),
        (Command::Divide, Operation::dual_dataset(overlay::divide)),
        (Command::Rectangle, Operation::synthesizing(synth::rectangle)),
        (Command::Graticule, Operation::synthesizing(synth::graticule)),
        (Command::PointGrid, Operation::synthesizing(synth::point_grid)),
        (Command::Affine, Operation::mutating(transform::affine)),
        (Command::Proj, Operation::mutating(transform::proj)),
        (Command::RenameFields, Operation::mutating(attributes::rename_fields)),
        (Command::FilterFields, Operation::mutating(attributes::filter_fields)),
        (Command::Drop, Operation::mutating(attributes::drop)),
    ];
    for (command, op) in table {
        commands.register(command, op);
    }
    commands
}
