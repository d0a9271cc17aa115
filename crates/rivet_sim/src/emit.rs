//! Routing of module emission strings.
//!
//! The core never interprets emitted text. It stores one
//! [`EmitContents`] implementation per module, and for inline expressions
//! enforces the expression-free filter on input bindings: an inline
//! expression may only be substituted where its inputs are plain
//! identifiers.

use std::sync::OnceLock;

use regex::Regex;
use rivet_ir::{EmitContents, EmitKind, ModuleId, PortMap};

use crate::sim::Sim;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

impl Sim {
    /// Installs an emitter for a module, replacing any existing one.
    pub fn register_emitter(&mut self, module: ModuleId, emitter: Box<dyn EmitContents>) {
        self.emitters.insert(module, emitter);
    }

    /// Routes an emission request to the module's emitter, if any.
    ///
    /// For [`EmitKind::InlineExpression`], every input binding in `port_map`
    /// must be a plain identifier; otherwise the request yields `None` and
    /// the caller falls back to an instantiation.
    pub fn emit_module(
        &self,
        module: ModuleId,
        port_map: &PortMap,
        kind: EmitKind,
    ) -> Option<String> {
        let emitter = self.emitters.get(&module)?;
        if kind == EmitKind::InlineExpression {
            for port in &self.modules[module].inputs {
                if let Some(expr) = port_map.get(&port.name) {
                    if !identifier_re().is_match(expr) {
                        return None;
                    }
                }
            }
        }
        emitter.emit_contents(port_map, kind)
    }
}
