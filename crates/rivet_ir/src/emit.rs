//! The textual emission seam between the core and an external emitter.
//!
//! The core never interprets emitted strings; it only routes them. A module
//! that wants textual representation implements [`EmitContents`]; the
//! simulator stores the implementation alongside the module and applies the
//! inline-expression filter before handing strings out.

use std::collections::BTreeMap;

/// Maps port names to the textual expressions connected to them.
///
/// Ordered so emitted text is deterministic.
pub type PortMap = BTreeMap<String, String>;

/// The flavor of textual representation requested from a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitKind {
    /// An expression substituted where the output is used. Inputs must be
    /// simple identifiers (expression-free).
    InlineExpression,
    /// A standalone instantiation block.
    Instantiation,
}

/// Implemented by modules that can describe themselves textually.
pub trait EmitContents {
    /// Returns the textual representation for the given port bindings, or
    /// `None` when this module has no representation of the requested kind.
    fn emit_contents(&self, port_map: &PortMap, kind: EmitKind) -> Option<String>;
}
