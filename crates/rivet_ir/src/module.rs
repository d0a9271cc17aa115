//! Module structure — the organizational unit of an elaborated design.
//!
//! A [`Module`] is pure structure: named port lists, internal signals, and
//! child modules. It is populated by the user-facing construction API and
//! finalized by the build traversal; it does not participate in the runtime
//! hot path after build.

use crate::ids::{CombId, GateId, ModuleId, SeqId, SignalId};
use serde::{Deserialize, Serialize};

/// The direction of a module port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Driven from outside, read inside.
    Input,
    /// Driven inside, read outside.
    Output,
    /// Bidirectional net.
    InOut,
}

/// A named port on a module.
///
/// `inner` is the inside-the-module view of the port. For inputs and in-outs,
/// `source` caches the outside signal that drives (or shares) the port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// The port name, unique within the module.
    pub name: String,
    /// The inside-the-module port signal.
    pub inner: SignalId,
    /// The outside signal, cached for inputs and in-outs.
    pub source: Option<SignalId>,
    /// The port direction.
    pub direction: PortDirection,
}

/// What produced a module: user code or a framework primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    /// A user-defined module.
    User,
    /// A gate primitive's leaf module.
    Gate(GateId),
    /// A combinational always block's module.
    Combinational(CombId),
    /// A sequential always block's module.
    Sequential(SeqId),
}

/// A single hardware module in the design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// The requested instance name.
    pub name: String,
    /// The de-duplicated instance name, resolved at build.
    pub unique_instance_name: Option<String>,
    /// The definition (type) name used by emission, if any.
    pub definition_name: Option<String>,
    /// When set, the instance name must survive uniquification unchanged.
    pub reserve_name: bool,
    /// When set, the definition name must survive uniquification unchanged.
    pub reserve_definition_name: bool,
    /// What produced this module.
    pub kind: ModuleKind,
    /// Input ports, in declaration order.
    pub inputs: Vec<Port>,
    /// Output ports, in declaration order.
    pub outputs: Vec<Port>,
    /// Bidirectional ports, in declaration order.
    pub in_outs: Vec<Port>,
    /// Non-port signals owned by this module, claimed during build.
    pub internal_signals: Vec<SignalId>,
    /// Child modules adopted during build.
    pub children: Vec<ModuleId>,
    /// The parent module, set when adopted.
    pub parent: Option<ModuleId>,
    /// Whether the build traversal has finalized this module.
    pub is_built: bool,
}

impl Module {
    /// Creates an empty user module with the given instance name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_instance_name: None,
            definition_name: None,
            reserve_name: false,
            reserve_definition_name: false,
            kind: ModuleKind::User,
            inputs: Vec::new(),
            outputs: Vec::new(),
            in_outs: Vec::new(),
            internal_signals: Vec::new(),
            children: Vec::new(),
            parent: None,
            is_built: false,
        }
    }

    /// Iterates over all ports in declaration order: inputs, outputs, in-outs.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .chain(self.in_outs.iter())
    }

    /// Returns true if a port with this name already exists.
    pub fn has_port(&self, name: &str) -> bool {
        self.ports().any(|p| p.name == name)
    }

    /// Finds the port whose inside signal is `signal`.
    pub fn port_of_signal(&self, signal: SignalId) -> Option<&Port> {
        self.ports().find(|p| p.inner == signal)
    }

    /// Returns true if `signal` is one of this module's port signals.
    pub fn is_port(&self, signal: SignalId) -> bool {
        self.port_of_signal(signal).is_some()
    }

    /// Finds an input port by name.
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Finds an output port by name.
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Finds a bidirectional port by name.
    pub fn in_out(&self, name: &str) -> Option<&Port> {
        self.in_outs.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(n: u32) -> SignalId {
        SignalId::from_raw(n)
    }

    fn port(name: &str, inner: u32, direction: PortDirection) -> Port {
        Port {
            name: name.to_string(),
            inner: sig(inner),
            source: None,
            direction,
        }
    }

    #[test]
    fn new_module_is_empty() {
        let m = Module::new("dut");
        assert_eq!(m.name, "dut");
        assert!(!m.is_built);
        assert!(m.ports().next().is_none());
        assert!(m.children.is_empty());
        assert!(m.parent.is_none());
    }

    #[test]
    fn port_lookup_by_name() {
        let mut m = Module::new("dut");
        m.inputs.push(port("a", 0, PortDirection::Input));
        m.outputs.push(port("y", 1, PortDirection::Output));
        m.in_outs.push(port("pad", 2, PortDirection::InOut));
        assert!(m.has_port("a"));
        assert!(m.has_port("y"));
        assert!(m.has_port("pad"));
        assert!(!m.has_port("b"));
        assert_eq!(m.input("a").unwrap().inner, sig(0));
        assert_eq!(m.output("y").unwrap().inner, sig(1));
        assert_eq!(m.in_out("pad").unwrap().inner, sig(2));
        assert!(m.input("y").is_none());
    }

    #[test]
    fn port_lookup_by_signal() {
        let mut m = Module::new("dut");
        m.inputs.push(port("a", 7, PortDirection::Input));
        assert!(m.is_port(sig(7)));
        assert!(!m.is_port(sig(8)));
        assert_eq!(m.port_of_signal(sig(7)).unwrap().name, "a");
    }

    #[test]
    fn ports_iterates_in_declaration_order() {
        let mut m = Module::new("dut");
        m.inputs.push(port("a", 0, PortDirection::Input));
        m.inputs.push(port("b", 1, PortDirection::Input));
        m.outputs.push(port("y", 2, PortDirection::Output));
        let names: Vec<_> = m.ports().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "y"]);
    }

    #[test]
    fn serde_roundtrip() {
        let mut m = Module::new("dut");
        m.inputs.push(port("a", 0, PortDirection::Input));
        let json = serde_json::to_string(&m).unwrap();
        let back: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "dut");
        assert!(back.has_port("a"));
    }
}
