//! Rivet's netlist structure layer.
//!
//! This crate defines the pure-data side of the framework: the [`Arena`] and
//! its opaque ID newtypes, name handling, the behavioral [`Conditional`] AST,
//! the [`Module`] structure populated during elaboration, and the textual
//! emission seam. The runtime (wires, scheduler, execution) lives in
//! `rivet_sim`.

#![warn(missing_docs)]

pub mod arena;
pub mod conditional;
pub mod emit;
pub mod ids;
pub mod module;
pub mod naming;

pub use arena::{Arena, ArenaId};
pub use conditional::{
    all_drivers, all_receivers, case_matches, CaseItem, CaseKind, Conditional, ConditionalError,
    IfBranch,
};
pub use emit::{EmitContents, EmitKind, PortMap};
pub use ids::{ActionId, CombId, GateId, ModuleId, SeqId, SignalId, TapId, WireId};
pub use module::{Module, ModuleKind, Port, PortDirection};
pub use naming::{sanitize, validate, NameError, Uniquifier};
