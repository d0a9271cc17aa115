//! Module construction: ports and their outside/inside views.
//!
//! `add_input` and `add_in_out` cache the outside `source` signal and return
//! the inside-the-module port signal; `add_output` returns the port signal
//! the module drives internally and the outside reads.

use rivet_ir::{Module, ModuleId, Port, PortDirection, SignalId};

use crate::error::SimError;
use crate::sim::Sim;

impl Sim {
    /// Creates an empty user module.
    pub fn module(&mut self, name: &str) -> ModuleId {
        self.modules.alloc(Module::new(rivet_ir::sanitize(name)))
    }

    /// Sets the definition (type) name used at emission.
    pub fn set_definition_name(&mut self, module: ModuleId, name: &str, reserve: bool) {
        self.modules[module].definition_name = Some(name.to_string());
        self.modules[module].reserve_definition_name = reserve;
    }

    /// Marks the instance name as reserved: uniquification must keep it.
    pub fn reserve_instance_name(&mut self, module: ModuleId) {
        self.modules[module].reserve_name = true;
    }

    fn check_port(
        &self,
        module: ModuleId,
        name: &str,
        source: Option<SignalId>,
        width: u32,
    ) -> Result<(), SimError> {
        rivet_ir::validate(name)?;
        if self.modules[module].has_port(name) {
            return Err(SimError::DuplicatePort {
                module: self.modules[module].name.clone(),
                port: name.to_string(),
            });
        }
        if let Some(source) = source {
            let found = self.signals[source].width;
            if found != width {
                return Err(SimError::WidthMismatch {
                    context: format!(
                        "port `{name}` of module `{}`",
                        self.modules[module].name
                    ),
                    expected: width,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Adds an input port driven by `source` from outside.
    ///
    /// Returns the inside-the-module port signal, which shares `source`'s
    /// wire.
    pub fn add_input(
        &mut self,
        module: ModuleId,
        name: &str,
        source: SignalId,
        width: u32,
    ) -> Result<SignalId, SimError> {
        self.check_port(module, name, Some(source), width)?;
        let inner = self.block_signal(name, width);
        self.connect(inner, source)?;
        self.signals[inner].port_of = Some(module);
        self.modules[module].inputs.push(Port {
            name: name.to_string(),
            inner,
            source: Some(source),
            direction: PortDirection::Input,
        });
        Ok(inner)
    }

    /// Adds an output port.
    ///
    /// The module drives the returned signal internally; the outside reads
    /// it (or connects another signal to follow it).
    pub fn add_output(
        &mut self,
        module: ModuleId,
        name: &str,
        width: u32,
    ) -> Result<SignalId, SimError> {
        self.check_port(module, name, None, width)?;
        let inner = self.block_signal(name, width);
        self.signals[inner].port_of = Some(module);
        self.modules[module].outputs.push(Port {
            name: name.to_string(),
            inner,
            source: None,
            direction: PortDirection::Output,
        });
        Ok(inner)
    }

    /// Adds a bidirectional port sharing `source`'s wire.
    ///
    /// Both views are nets; multi-driver resolution applies to whatever is
    /// attached on either side.
    pub fn add_in_out(
        &mut self,
        module: ModuleId,
        name: &str,
        source: SignalId,
        width: u32,
    ) -> Result<SignalId, SimError> {
        self.check_port(module, name, Some(source), width)?;
        let inner = self.block_signal(name, width);
        self.signals[inner].is_net = true;
        self.signals[source].is_net = true;
        let old = self.signals[inner].wire;
        let new = self.signals[source].wire;
        self.adopt_wire(old, new)?;
        let canonical = self.resolve_wire(new);
        self.signals[inner].wire = canonical;
        self.signals[inner].net_peers.push(source);
        self.signals[source].net_peers.push(inner);
        self.signals[inner].port_of = Some(module);
        self.modules[module].in_outs.push(Port {
            name: name.to_string(),
            inner,
            source: Some(source),
            direction: PortDirection::InOut,
        });
        Ok(inner)
    }

    /// Adds one input per source, named `name_0`, `name_1`, ...
    pub fn add_input_array(
        &mut self,
        module: ModuleId,
        name: &str,
        sources: &[SignalId],
        width: u32,
    ) -> Result<Vec<SignalId>, SimError> {
        sources
            .iter()
            .enumerate()
            .map(|(i, &source)| self.add_input(module, &format!("{name}_{i}"), source, width))
            .collect()
    }

    /// Adds `count` outputs named `name_0`, `name_1`, ...
    pub fn add_output_array(
        &mut self,
        module: ModuleId,
        name: &str,
        count: usize,
        width: u32,
    ) -> Result<Vec<SignalId>, SimError> {
        (0..count)
            .map(|i| self.add_output(module, &format!("{name}_{i}"), width))
            .collect()
    }

    /// Adds one bidirectional port per source, named `name_0`, `name_1`, ...
    pub fn add_in_out_array(
        &mut self,
        module: ModuleId,
        name: &str,
        sources: &[SignalId],
        width: u32,
    ) -> Result<Vec<SignalId>, SimError> {
        sources
            .iter()
            .enumerate()
            .map(|(i, &source)| self.add_in_out(module, &format!("{name}_{i}"), source, width))
            .collect()
    }
}
