//! Construction-time SSA rewrite for combinational blocks.
//!
//! The body is written against remapped SSA nodes minted by [`SsaScope`];
//! each node refers to the value of its base signal at one program point.
//! The rewrite walks the conditional list tracking the current definition of
//! each base, resolves reads (found by tracing driver fan-in cones through
//! connections and gates) against that mapping, and joins branch definitions
//! with phi signals assigned at the end of every branch — synthesizing an
//! empty `else` when needed. The rewritten list feeds a standard
//! [`Combinational`](crate::sim::Sim::combinational) block.

use std::collections::{HashMap, HashSet};

use rivet_ir::{CaseItem, CaseKind, CombId, Conditional, IfBranch, SignalId};

use crate::error::SimError;
use crate::signal::SignalOrigin;
use crate::sim::Sim;

/// Mints SSA node signals for one `combinational_ssa` construction.
pub struct SsaScope {
    context: u32,
    /// node -> base signal.
    nodes: HashMap<SignalId, SignalId>,
    counter: u32,
}

impl SsaScope {
    /// Creates a fresh SSA node referring to `base` at the point of use.
    ///
    /// A node used as a receiver becomes the new definition of `base`; any
    /// other node is a read, resolved to the definition current at its
    /// position.
    pub fn remap(&mut self, sim: &mut Sim, base: SignalId) -> SignalId {
        let name = format!(
            "ssa{}_{}_{}",
            self.context,
            sim.name_of(base),
            self.counter
        );
        self.counter += 1;
        let width = sim.width_of(base);
        let node = sim.block_signal(&name, width);
        self.nodes.insert(node, base);
        node
    }
}

/// The per-path mapping from base signals to their current definitions.
///
/// Kept as an association list so joins iterate deterministically.
#[derive(Clone, Default)]
struct SsaMapping {
    entries: Vec<(SignalId, SignalId)>,
    /// Bases whose definition does not cover every path.
    poisoned: Vec<SignalId>,
}

impl SsaMapping {
    fn get(&self, base: SignalId) -> Option<SignalId> {
        self.entries
            .iter()
            .find(|(b, _)| *b == base)
            .map(|(_, d)| *d)
    }

    fn set(&mut self, base: SignalId, def: SignalId) {
        match self.entries.iter_mut().find(|(b, _)| *b == base) {
            Some(entry) => entry.1 = def,
            None => self.entries.push((base, def)),
        }
        self.poisoned.retain(|b| *b != base);
    }

    fn poison(&mut self, base: SignalId) {
        if !self.poisoned.contains(&base) {
            self.poisoned.push(base);
        }
    }

    fn is_poisoned(&self, base: SignalId) -> bool {
        self.poisoned.contains(&base)
    }

    fn bases(&self) -> Vec<SignalId> {
        self.entries.iter().map(|(b, _)| *b).collect()
    }
}

struct Rewriter<'a> {
    sim: &'a mut Sim,
    nodes: &'a HashMap<SignalId, SignalId>,
    defs: &'a HashSet<SignalId>,
    context: u32,
    phi_counter: u32,
}

impl Sim {
    /// Builds a combinational block from an SSA-remapped body.
    ///
    /// The closure receives the simulator and an [`SsaScope`] whose
    /// [`remap`](SsaScope::remap) mints node signals. Every node must be
    /// mapped (used as a receiver) at most once, and every read must see a
    /// definition on all paths.
    pub fn combinational_ssa<F>(&mut self, build: F) -> Result<CombId, SimError>
    where
        F: FnOnce(&mut Sim, &mut SsaScope) -> Result<Vec<Conditional>, SimError>,
    {
        let context = self.next_ssa_context;
        self.next_ssa_context += 1;
        let mut scope = SsaScope {
            context,
            nodes: HashMap::new(),
            counter: 0,
        };
        let roots = build(self, &mut scope)?;

        // Each node may be mapped (written) at most once.
        let mut write_counts: HashMap<SignalId, u32> = HashMap::new();
        for root in &roots {
            count_receiver_writes(root, &mut write_counts);
        }
        let mut defs = HashSet::new();
        for (&node, &count) in &write_counts {
            if !scope.nodes.contains_key(&node) {
                continue;
            }
            if count > 1 {
                return Err(SimError::SsaDoubleMapped {
                    signal: self.name_of(node).to_string(),
                });
            }
            defs.insert(node);
        }

        let mut rewriter = Rewriter {
            sim: self,
            nodes: &scope.nodes,
            defs: &defs,
            context,
            phi_counter: 0,
        };
        let mut mapping = SsaMapping::default();
        let mut rewritten = Vec::with_capacity(roots.len());
        for root in roots {
            rewritten.push(rewriter.rewrite(root, &mut mapping)?);
        }

        // Route every mapped base back onto the real signal.
        for base in mapping.bases() {
            if mapping.is_poisoned(base) {
                return Err(SimError::UninitializedSsa {
                    signal: self.name_of(base).to_string(),
                });
            }
            let def = mapping.get(base).expect("mapped base has a definition");
            rewritten.push(Conditional::assign(base, def));
        }
        self.combinational(rewritten)
    }
}

fn count_receiver_writes(cond: &Conditional, counts: &mut HashMap<SignalId, u32>) {
    match cond {
        Conditional::Assign { receiver, .. } => {
            *counts.entry(*receiver).or_insert(0) += 1;
        }
        Conditional::Group { children } => {
            for c in children {
                count_receiver_writes(c, counts);
            }
        }
        Conditional::If {
            branches,
            else_body,
        } => {
            for b in branches {
                for c in &b.body {
                    count_receiver_writes(c, counts);
                }
            }
            for c in else_body.iter().flatten() {
                count_receiver_writes(c, counts);
            }
        }
        Conditional::Case {
            items, default, ..
        } => {
            for item in items {
                for c in &item.body {
                    count_receiver_writes(c, counts);
                }
            }
            for c in default.iter().flatten() {
                count_receiver_writes(c, counts);
            }
        }
    }
}

impl Rewriter<'_> {
    fn rewrite(
        &mut self,
        cond: Conditional,
        mapping: &mut SsaMapping,
    ) -> Result<Conditional, SimError> {
        match cond {
            Conditional::Assign { receiver, driver } => {
                self.resolve_reads(driver, mapping)?;
                if let Some(&base) = self.nodes.get(&receiver) {
                    mapping.set(base, receiver);
                }
                Ok(Conditional::Assign { receiver, driver })
            }
            Conditional::Group { children } => {
                let mut out = Vec::with_capacity(children.len());
                for c in children {
                    out.push(self.rewrite(c, mapping)?);
                }
                Ok(Conditional::Group { children: out })
            }
            Conditional::If {
                branches,
                else_body,
            } => {
                for b in &branches {
                    self.resolve_reads(b.condition, mapping)?;
                }
                let entry = mapping.clone();
                let mut arms = Vec::with_capacity(branches.len() + 1);
                for b in branches {
                    let mut bm = entry.clone();
                    let mut body = Vec::with_capacity(b.body.len());
                    for c in b.body {
                        body.push(self.rewrite(c, &mut bm)?);
                    }
                    arms.push((Some(b.condition), body, bm));
                }
                {
                    // The else arm always exists for phi routing, synthesized
                    // empty when the user wrote none.
                    let mut em = entry.clone();
                    let mut body = Vec::new();
                    for c in else_body.unwrap_or_default() {
                        body.push(self.rewrite(c, &mut em)?);
                    }
                    arms.push((None, body, em));
                }
                self.join(&entry, &mut arms, mapping);
                let mut out_branches = Vec::new();
                let mut out_else = None;
                for (condition, body, _) in arms {
                    match condition {
                        Some(c) => out_branches.push(IfBranch { condition: c, body }),
                        None => out_else = Some(body),
                    }
                }
                Ok(Conditional::If {
                    branches: out_branches,
                    else_body: out_else,
                })
            }
            Conditional::Case {
                expr,
                items,
                default,
                kind,
                wildcard,
            } => {
                self.resolve_reads(expr, mapping)?;
                for item in &items {
                    self.resolve_reads(item.value, mapping)?;
                }
                let entry = mapping.clone();
                let mut arms = Vec::with_capacity(items.len() + 1);
                for item in items {
                    let mut bm = entry.clone();
                    let mut body = Vec::with_capacity(item.body.len());
                    for c in item.body {
                        body.push(self.rewrite(c, &mut bm)?);
                    }
                    arms.push((Some(item.value), body, bm));
                }
                // A default is synthesized only for a plain case; unique and
                // priority kinds keep their no-match-drives-X semantics.
                let had_default = default.is_some();
                if had_default || kind == CaseKind::None {
                    let mut dm = entry.clone();
                    let mut body = Vec::new();
                    for c in default.unwrap_or_default() {
                        body.push(self.rewrite(c, &mut dm)?);
                    }
                    arms.push((None, body, dm));
                }
                self.join(&entry, &mut arms, mapping);
                let mut out_items = Vec::new();
                let mut out_default = None;
                for (value, body, _) in arms {
                    match value {
                        Some(v) => out_items.push(CaseItem { value: v, body }),
                        None => out_default = Some(body),
                    }
                }
                Ok(Conditional::Case {
                    expr,
                    items: out_items,
                    default: out_default,
                    kind,
                    wildcard,
                })
            }
        }
    }

    /// Joins branch mappings: every base defined differently in any arm gets
    /// a phi signal assigned at the end of each arm.
    fn join(
        &mut self,
        entry: &SsaMapping,
        arms: &mut [(Option<SignalId>, Vec<Conditional>, SsaMapping)],
        mapping: &mut SsaMapping,
    ) {
        let mut changed = Vec::new();
        for (_, _, bm) in arms.iter() {
            for base in bm.bases() {
                if bm.get(base) != entry.get(base) && !changed.contains(&base) {
                    changed.push(base);
                }
            }
        }
        for base in changed {
            let width = self.sim.width_of(base);
            let phi = self.sim.block_signal(
                &format!("phi{}_{}", self.context, self.phi_counter),
                width,
            );
            self.phi_counter += 1;
            let mut partial = false;
            for (_, body, bm) in arms.iter_mut() {
                match bm.get(base) {
                    Some(def) if !bm.is_poisoned(base) => {
                        body.push(Conditional::assign(phi, def));
                    }
                    _ => partial = true,
                }
            }
            mapping.set(base, phi);
            if partial {
                mapping.poison(base);
            }
        }
    }

    /// Finds unresolved SSA read nodes in the fan-in cone of `signal` and
    /// connects each to the current definition of its base.
    fn resolve_reads(
        &mut self,
        signal: SignalId,
        mapping: &SsaMapping,
    ) -> Result<(), SimError> {
        let mut visited = HashSet::new();
        self.resolve_cone(signal, mapping, &mut visited)
    }

    fn resolve_cone(
        &mut self,
        signal: SignalId,
        mapping: &SsaMapping,
        visited: &mut HashSet<SignalId>,
    ) -> Result<(), SimError> {
        if !visited.insert(signal) {
            return Ok(());
        }
        if let Some(&base) = self.nodes.get(&signal) {
            if self.defs.contains(&signal) {
                // A definition node read directly is its own resolution.
                return Ok(());
            }
            if self.sim.signals[signal].src.is_some() {
                return Ok(());
            }
            return match mapping.get(base) {
                Some(def) if !mapping.is_poisoned(base) => self.sim.connect(signal, def),
                _ => Err(SimError::UninitializedSsa {
                    signal: self.sim.name_of(base).to_string(),
                }),
            };
        }
        if let Some(src) = self.sim.signals[signal].src {
            self.resolve_cone(src, mapping, visited)?;
        }
        if let SignalOrigin::GateOutput(gate) = self.sim.signals[signal].origin {
            let inputs = self.sim.gates[gate].inputs.clone();
            for input in inputs {
                self.resolve_cone(input, mapping, visited)?;
            }
        }
        Ok(())
    }
}
