//! Level-sensitive (combinational) always blocks.
//!
//! A combinational block re-executes its conditional AST on any driver-port
//! glitch. Reentrant glitches during a pass are suppressed — the running
//! pass observes the newer value when it dereferences the driver. Receivers
//! never assigned in a pass are driven to all-`X` (the inferred-latch X).

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use rivet_ir::{
    all_drivers, all_receivers, CombId, Conditional, Module, ModuleKind, Port, PortDirection,
    SignalId, Uniquifier,
};
use rivet_logic::LogicValue;

use crate::error::SimError;
use crate::exec::{exec_roots, validate_conditions, BlockBody, BlockRef};
use crate::sim::Sim;
use crate::wire::GlitchHandler;

/// The runtime state of one combinational block.
pub(crate) struct CombBlock {
    pub(crate) body: Rc<BlockBody>,
    /// The block's leaf module (for hierarchy introspection).
    pub(crate) _module: rivet_ir::ModuleId,
    /// Holding this flag = an execution of this block is on the call stack.
    pub(crate) is_executing: bool,
    /// Receivers assigned during the current pass.
    pub(crate) driven: HashSet<SignalId>,
    /// Drivers read during the current pass (write-after-read detection).
    pub(crate) glanced: HashSet<SignalId>,
    /// Drivers that already carry a guard subscription.
    pub(crate) guarded: HashSet<SignalId>,
}

impl Sim {
    /// Creates a combinational always block from a list of conditional roots.
    ///
    /// The block materializes an input port per unique driver and an output
    /// port per unique receiver, connects them (sharing wires with the
    /// externals), subscribes to every input glitch, and executes once.
    pub fn combinational(&mut self, roots: Vec<Conditional>) -> Result<CombId, SimError> {
        validate_conditions(self, &roots)?;
        let drivers = all_drivers(&roots);
        let receivers = all_receivers(&roots);

        let id = CombId::from_raw(self.combs.len() as u32);
        let mut module = Module::new(format!("comb_{}", id.as_raw()));
        module.definition_name = Some("combinational".to_string());
        module.kind = ModuleKind::Combinational(id);
        let module_id = self.modules.alloc(module);

        let mut uniq = Uniquifier::new();
        let mut input_ports = HashMap::new();
        for &driver in &drivers {
            let requested = format!("in_{}", self.signals[driver].name);
            let port_name = uniq.claim(&requested, false)?;
            let port = self.block_signal(&port_name, self.signals[driver].width);
            self.connect(port, driver)?;
            self.signals[port].port_of = Some(module_id);
            self.modules[module_id].inputs.push(Port {
                name: port_name,
                inner: port,
                source: Some(driver),
                direction: PortDirection::Input,
            });
            input_ports.insert(driver, port);
        }

        let mut output_ports = HashMap::new();
        for &receiver in &receivers {
            let requested = format!("out_{}", self.signals[receiver].name);
            let port_name = uniq.claim(&requested, false)?;
            let port = self.block_signal(&port_name, self.signals[receiver].width);
            self.connect(receiver, port)?;
            self.signals[port].port_of = Some(module_id);
            self.modules[module_id].outputs.push(Port {
                name: port_name,
                inner: port,
                source: None,
                direction: PortDirection::Output,
            });
            output_ports.insert(receiver, port);
        }

        let body = Rc::new(BlockBody {
            roots,
            input_ports: input_ports.clone(),
            output_ports,
            receivers,
        });
        let alloc_id = self.combs.alloc(CombBlock {
            body,
            _module: module_id,
            is_executing: false,
            driven: HashSet::new(),
            glanced: HashSet::new(),
            guarded: HashSet::new(),
        });
        debug_assert_eq!(alloc_id, id);

        for port in input_ports.values() {
            let wire = self.signals[*port].wire;
            self.subscribe_glitch(wire, GlitchHandler::Comb(id));
        }
        self.run_comb(id)?;
        Ok(id)
    }

    /// Executes a combinational block once.
    ///
    /// Reentrant invocations while a pass is running are suppressed.
    pub(crate) fn run_comb(&mut self, id: CombId) -> Result<(), SimError> {
        if self.combs[id].is_executing {
            return Ok(());
        }
        self.combs[id].is_executing = true;
        self.combs[id].driven.clear();
        self.combs[id].glanced.clear();
        let body = self.combs[id].body.clone();
        let mut result = exec_roots(self, BlockRef::Comb(id), &body);
        if result.is_ok() {
            // Receivers never assigned this pass model an inferred latch: X.
            for &receiver in &body.receivers {
                if !self.combs[id].driven.contains(&receiver) {
                    let width = self.width_of(receiver);
                    let port = body.output_ports[&receiver];
                    let wire = self.signals[port].wire;
                    result = self.put_wire(wire, LogicValue::xs(width));
                    if result.is_err() {
                        break;
                    }
                }
            }
        }
        self.combs[id].driven.clear();
        self.combs[id].glanced.clear();
        self.combs[id].is_executing = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_ir::{CaseItem, CaseKind};
    use rivet_logic::Logic;

    fn lv(s: &str) -> LogicValue {
        LogicValue::from_binary_str(s).unwrap()
    }

    #[test]
    fn simple_assign_follows_driver() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::assign(y, a)]).unwrap();
        sim.put(a, 0b1010u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(0b1010));
        sim.put(a, 0b0001u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(1));
    }

    #[test]
    fn receiver_becomes_unassignable() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 1);
        let y = sim.signal("y", 1);
        sim.combinational(vec![Conditional::assign(y, a)]).unwrap();
        assert!(matches!(sim.put(y, 0u64), Err(SimError::Unassignable { .. })));
    }

    #[test]
    fn assign_promotes_z_to_x() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::assign(y, a)]).unwrap();
        sim.put(a, lv("10Z0")).unwrap();
        assert_eq!(sim.value_of(y), lv("10X0"));
    }

    #[test]
    fn if_else_selects_branch() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 1);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::if_else(
            sel,
            vec![Conditional::assign(y, a)],
            vec![Conditional::assign(y, b)],
        )])
        .unwrap();
        sim.put(a, 0b1100u64).unwrap();
        sim.put(b, 0b0011u64).unwrap();
        sim.put(sel, 1u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(0b1100));
        sim.put(sel, 0u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(0b0011));
    }

    #[test]
    fn invalid_condition_drives_receivers_x() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 1);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::if_else(
            sel,
            vec![Conditional::assign(y, a)],
            vec![Conditional::assign(y, b)],
        )])
        .unwrap();
        sim.put(a, 1u64).unwrap();
        sim.put(b, 2u64).unwrap();
        sim.put(sel, Logic::X).unwrap();
        assert_eq!(sim.value_of(y), LogicValue::xs(4));
    }

    #[test]
    fn missing_else_infers_latch_x() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 1);
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::if_then(
            sel,
            vec![Conditional::assign(y, a)],
        )])
        .unwrap();
        sim.put(a, 0b0110u64).unwrap();
        sim.put(sel, 1u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(0b0110));
        // Condition false and no else: y was never driven in that pass.
        sim.put(sel, 0u64).unwrap();
        assert_eq!(sim.value_of(y), LogicValue::xs(4));
    }

    #[test]
    fn wide_condition_is_rejected() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 2);
        let a = sim.signal("a", 1);
        let y = sim.signal("y", 1);
        let err = sim
            .combinational(vec![Conditional::if_then(
                sel,
                vec![Conditional::assign(y, a)],
            )])
            .unwrap_err();
        assert!(matches!(err, SimError::MalformedConditional { .. }));
    }

    #[test]
    fn case_selects_matching_item() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 2);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let d = sim.signal("d", 4);
        let y = sim.signal("y", 4);
        let c0 = sim.constant(2, 0u64).unwrap();
        let c1 = sim.constant(2, 1u64).unwrap();
        sim.combinational(vec![Conditional::case(
            sel,
            vec![
                CaseItem {
                    value: c0,
                    body: vec![Conditional::assign(y, a)],
                },
                CaseItem {
                    value: c1,
                    body: vec![Conditional::assign(y, b)],
                },
            ],
            Some(vec![Conditional::assign(y, d)]),
            CaseKind::None,
            false,
        )
        .unwrap()])
        .unwrap();
        sim.put(a, 1u64).unwrap();
        sim.put(b, 2u64).unwrap();
        sim.put(d, 9u64).unwrap();
        sim.put(sel, 0u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(1));
        sim.put(sel, 1u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(2));
        sim.put(sel, 3u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(9));
    }

    #[test]
    fn invalid_case_expression_drives_x() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 2);
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        let c0 = sim.constant(2, 0u64).unwrap();
        sim.combinational(vec![Conditional::case(
            sel,
            vec![CaseItem {
                value: c0,
                body: vec![Conditional::assign(y, a)],
            }],
            None,
            CaseKind::None,
            false,
        )
        .unwrap()])
        .unwrap();
        sim.put(a, 5u64).unwrap();
        // sel is still all-X.
        assert_eq!(sim.value_of(y), LogicValue::xs(4));
    }

    #[test]
    fn unique_case_double_match_drives_x() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 2);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let y = sim.signal("y", 4);
        let c2a = sim.constant(2, 2u64).unwrap();
        let c2b = sim.constant(2, 2u64).unwrap();
        sim.combinational(vec![Conditional::case(
            sel,
            vec![
                CaseItem {
                    value: c2a,
                    body: vec![Conditional::assign(y, a)],
                },
                CaseItem {
                    value: c2b,
                    body: vec![Conditional::assign(y, b)],
                },
            ],
            None,
            CaseKind::Unique,
            false,
        )
        .unwrap()])
        .unwrap();
        sim.put(a, 1u64).unwrap();
        sim.put(b, 2u64).unwrap();
        sim.put(sel, 2u64).unwrap();
        assert_eq!(sim.value_of(y), LogicValue::xs(4));
    }

    #[test]
    fn unique_case_no_match_no_default_drives_x() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 2);
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        let c0 = sim.constant(2, 0u64).unwrap();
        sim.combinational(vec![Conditional::case(
            sel,
            vec![CaseItem {
                value: c0,
                body: vec![Conditional::assign(y, a)],
            }],
            None,
            CaseKind::Unique,
            false,
        )
        .unwrap()])
        .unwrap();
        sim.put(a, 5u64).unwrap();
        sim.put(sel, 3u64).unwrap();
        assert_eq!(sim.value_of(y), LogicValue::xs(4));
    }

    #[test]
    fn priority_case_first_match_wins() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 2);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let y = sim.signal("y", 4);
        let c1a = sim.constant(2, 1u64).unwrap();
        let c1b = sim.constant(2, 1u64).unwrap();
        sim.combinational(vec![Conditional::case(
            sel,
            vec![
                CaseItem {
                    value: c1a,
                    body: vec![Conditional::assign(y, a)],
                },
                CaseItem {
                    value: c1b,
                    body: vec![Conditional::assign(y, b)],
                },
            ],
            None,
            CaseKind::Priority,
            false,
        )
        .unwrap()])
        .unwrap();
        sim.put(a, 7u64).unwrap();
        sim.put(b, 8u64).unwrap();
        sim.put(sel, 1u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(7));
        // No match, no default.
        sim.put(sel, 0u64).unwrap();
        assert_eq!(sim.value_of(y), LogicValue::xs(4));
    }

    #[test]
    fn casez_wildcard_matches() {
        let mut sim = Sim::new();
        let sel = sim.signal("sel", 3);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let y = sim.signal("y", 4);
        let item = sim.constant(3, lv("1ZZ")).unwrap();
        sim.combinational(vec![Conditional::case(
            sel,
            vec![CaseItem {
                value: item,
                body: vec![Conditional::assign(y, a)],
            }],
            Some(vec![Conditional::assign(y, b)]),
            CaseKind::None,
            true,
        )
        .unwrap()])
        .unwrap();
        sim.put(a, 5u64).unwrap();
        sim.put(b, 6u64).unwrap();
        sim.put(sel, 0b101u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(5));
        sim.put(sel, 0b001u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(6));
    }

    #[test]
    fn idempotent_re_execution() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        let id = sim.combinational(vec![Conditional::assign(y, a)]).unwrap();
        sim.put(a, 6u64).unwrap();
        let before = sim.value_of(y);
        sim.run_comb(id).unwrap();
        assert_eq!(sim.value_of(y), before);
    }

    #[test]
    fn group_executes_in_order_last_wins() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::group(vec![
            Conditional::assign(y, a),
            Conditional::assign(y, b),
        ])])
        .unwrap();
        sim.put(a, 1u64).unwrap();
        sim.put(b, 2u64).unwrap();
        assert_eq!(sim.value_of(y).to_u64(), Some(2));
    }

    #[test]
    fn write_after_read_is_fatal() {
        let mut sim = Sim::new();
        let x = sim.signal("x", 4);
        let y = sim.signal("y", 4);
        let zero = sim.constant(4, 0u64).unwrap();
        // y reads x, then x is written in the same pass.
        sim.combinational(vec![
            Conditional::assign(y, x),
            Conditional::assign(x, zero),
        ])
        .unwrap_err();
    }
}
