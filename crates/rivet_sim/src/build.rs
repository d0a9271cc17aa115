//! The build traversal: ownership, child adoption, and hierarchy checks.
//!
//! Build walks signal connectivity outward from a module's ports: backward
//! from outputs and in-outs, forward from inputs and in-outs. Ports of
//! not-yet-built modules adopt those modules as children (building them
//! recursively); unowned non-port signals become internals of the module
//! being built. After traversal, child instance names are uniquified and the
//! hierarchy is verified to be a tree.

use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;

use rivet_ir::{ModuleId, SignalId, Uniquifier};

use crate::error::SimError;
use crate::sim::Sim;

impl Sim {
    /// Builds `top` and everything reachable from its ports.
    ///
    /// Fatal on double build, input-feeds-input violations, self-containing
    /// modules, and modules shared between hierarchies.
    pub fn build(&mut self, top: ModuleId) -> Result<(), SimError> {
        self.build_module(top)?;
        self.verify_hierarchy(top)?;
        Ok(())
    }

    /// The modules from the root down to `module`, inclusive.
    ///
    /// Only meaningful after build.
    pub fn hierarchy(&self, module: ModuleId) -> Vec<ModuleId> {
        let mut chain = vec![module];
        let mut current = module;
        while let Some(parent) = self.modules[current].parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    fn build_module(&mut self, module: ModuleId) -> Result<(), SimError> {
        if self.modules[module].is_built {
            return Err(SimError::AlreadyBuilt {
                module: self.modules[module].name.clone(),
            });
        }
        self.modules[module].is_built = true;

        self.check_input_feeds_input(module)?;

        // Seed from the inner side of every port; the outer side belongs to
        // whoever builds the parent. Inputs trace forward, outputs backward,
        // in-outs both ways.
        let mut stack: Vec<SignalId> = Vec::new();
        let ports: Vec<SignalId> = self.modules[module].ports().map(|p| p.inner).collect();
        let mut visited: HashSet<SignalId> = HashSet::new();
        for inner in ports {
            visited.insert(inner);
            self.push_through_port(module, inner, true, &mut stack);
        }

        while let Some(signal) = stack.pop() {
            if !visited.insert(signal) {
                continue;
            }
            let port_of = self.signals[signal].port_of;
            match port_of {
                Some(other) if other != module => {
                    if self.hierarchy(module).contains(&other) {
                        // A port of an enclosing module: the edge of our scope.
                        continue;
                    }
                    match self.modules[other].parent {
                        Some(parent) if parent == module => {
                            // An already-adopted child's port; continue on
                            // our side of its boundary.
                            self.push_through_port(other, signal, false, &mut stack);
                        }
                        Some(_) if self.hierarchy(other).contains(&module) => {
                            // A deeper descendant, handled by its own parent.
                        }
                        Some(_) => {
                            return Err(SimError::SharedSubmodule {
                                module: self.modules[other].name.clone(),
                            });
                        }
                        None => {
                            self.adopt_child(module, other)?;
                            // Resume our own traversal from the whole child
                            // boundary.
                            let child_ports: Vec<SignalId> =
                                self.modules[other].ports().map(|p| p.inner).collect();
                            for inner in child_ports {
                                visited.insert(inner);
                                self.push_through_port(other, inner, false, &mut stack);
                            }
                        }
                    }
                }
                Some(_) => {
                    // One of our own ports reached again through the fabric.
                    self.push_through_port(module, signal, true, &mut stack);
                }
                None => {
                    if self.signals[signal].owner.is_none() {
                        self.signals[signal].owner = Some(module);
                        self.modules[module].internal_signals.push(signal);
                        self.push_neighbors(signal, &mut stack);
                    }
                    // Already owned: internal to a built module, stop here.
                }
            }
        }

        self.uniquify_children(module)
    }

    /// Pushes the neighbors of a port signal that lie on the side being
    /// traversed: the inside of `module` when `inward` (our own ports), the
    /// outside when not (an adopted child's ports).
    fn push_through_port(
        &self,
        module: ModuleId,
        inner: SignalId,
        inward: bool,
        stack: &mut Vec<SignalId>,
    ) {
        use rivet_ir::PortDirection;
        let Some(port) = self.modules[module].port_of_signal(inner) else {
            return;
        };
        let follow_forward = match (port.direction, inward) {
            // Our input feeds logic inside; a child's input is fed from here.
            (PortDirection::Input, true) => true,
            (PortDirection::Input, false) => false,
            // Our output is driven from inside; a child's output feeds here.
            (PortDirection::Output, true) => false,
            (PortDirection::Output, false) => true,
            (PortDirection::InOut, _) => {
                self.push_neighbors(inner, stack);
                return;
            }
        };
        if follow_forward {
            for &dst in &self.signals[inner].dsts {
                stack.push(dst);
            }
        } else if let Some(src) = self.signals[inner].src {
            stack.push(src);
        }
    }

    fn push_neighbors(&self, signal: SignalId, stack: &mut Vec<SignalId>) {
        if let Some(src) = self.signals[signal].src {
            stack.push(src);
        }
        for &dst in &self.signals[signal].dsts {
            stack.push(dst);
        }
        for &driver in &self.signals[signal].net_drivers {
            stack.push(driver);
        }
        for &peer in &self.signals[signal].net_peers {
            stack.push(peer);
        }
    }

    fn adopt_child(&mut self, parent: ModuleId, child: ModuleId) -> Result<(), SimError> {
        match self.modules[child].parent {
            Some(existing) if existing == parent => Ok(()),
            Some(_) => Err(SimError::SharedSubmodule {
                module: self.modules[child].name.clone(),
            }),
            None => {
                if child == parent || self.hierarchy(parent).contains(&child) {
                    return Err(SimError::SelfContainingModule {
                        module: self.modules[child].name.clone(),
                    });
                }
                self.modules[child].parent = Some(parent);
                self.modules[parent].children.push(child);
                if !self.modules[child].is_built {
                    self.build_module(child)?;
                }
                Ok(())
            }
        }
    }

    /// An input port may not be driven, directly or through plain
    /// connections, by another input of the same module.
    fn check_input_feeds_input(&self, module: ModuleId) -> Result<(), SimError> {
        let inputs: Vec<SignalId> =
            self.modules[module].inputs.iter().map(|p| p.inner).collect();
        for port in &self.modules[module].inputs {
            let Some(source) = port.source else { continue };
            let mut current = Some(source);
            let mut hops = 0;
            while let Some(signal) = current {
                if inputs.contains(&signal) {
                    return Err(SimError::InputDependsOnInput {
                        module: self.modules[module].name.clone(),
                        signal: port.name.clone(),
                    });
                }
                current = self.signals[signal].src;
                hops += 1;
                if hops > self.signals.len() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn uniquify_children(&mut self, module: ModuleId) -> Result<(), SimError> {
        let children = self.modules[module].children.clone();
        let mut uniq = Uniquifier::new();
        for &child in &children {
            if self.modules[child].reserve_name {
                let name = self.modules[child].name.clone();
                let unique = uniq.claim(&name, true)?;
                self.modules[child].unique_instance_name = Some(unique);
            }
        }
        for &child in &children {
            if !self.modules[child].reserve_name {
                let name = self.modules[child].name.clone();
                let unique = uniq.claim(&name, false)?;
                self.modules[child].unique_instance_name = Some(unique);
            }
        }
        Ok(())
    }

    /// The hierarchy must be a forest: no cycles, no module with two parents.
    fn verify_hierarchy(&self, top: ModuleId) -> Result<(), SimError> {
        let mut graph: DiGraph<ModuleId, ()> = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut stack = vec![top];
        let mut seen = HashSet::new();
        while let Some(m) = stack.pop() {
            if !seen.insert(m) {
                continue;
            }
            nodes.entry(m).or_insert_with(|| graph.add_node(m));
            for &child in &self.modules[m].children {
                stack.push(child);
            }
        }
        for (&m, &node) in &nodes {
            for &child in &self.modules[m].children {
                let child_node = *nodes.get(&child).expect("child was visited");
                graph.add_edge(node, child_node, ());
                if child == m {
                    return Err(SimError::SelfContainingModule {
                        module: self.modules[m].name.clone(),
                    });
                }
            }
        }
        if is_cyclic_directed(&graph) {
            return Err(SimError::SelfContainingModule {
                module: self.modules[top].name.clone(),
            });
        }
        for &node in nodes.values() {
            let parents = graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .count();
            if parents > 1 {
                return Err(SimError::SharedSubmodule {
                    module: self.modules[graph[node]].name.clone(),
                });
            }
        }
        Ok(())
    }
}
