//! Execution of conditional ASTs inside always blocks.
//!
//! Both block kinds share the same walk; they differ only in how drivers are
//! fetched (combinational blocks read live port values and arm the
//! write-after-read guard; sequential blocks read the pre-tick map, except
//! for triggers which always sample their new value) and in how duplicate
//! receiver writes are policed.

use std::collections::HashMap;

use rivet_ir::{case_matches, CaseKind, CombId, Conditional, SeqId, SignalId};
use rivet_logic::{Logic, LogicValue};

use crate::error::SimError;
use crate::sim::Sim;
use crate::wire::GlitchHandler;

/// The immutable part of an always block, shared via `Rc` so execution can
/// borrow it while mutating the simulator.
pub(crate) struct BlockBody {
    pub(crate) roots: Vec<Conditional>,
    /// External driver signal -> inside input port signal.
    pub(crate) input_ports: HashMap<SignalId, SignalId>,
    /// External receiver signal -> inside output port signal.
    pub(crate) output_ports: HashMap<SignalId, SignalId>,
    /// External receivers in first-seen order.
    pub(crate) receivers: Vec<SignalId>,
}

/// Which block an execution belongs to.
#[derive(Clone, Copy)]
pub(crate) enum BlockRef {
    Comb(CombId),
    Seq(SeqId),
}

/// Validates that every `If` condition in the tree is one bit wide.
pub(crate) fn validate_conditions(
    sim: &Sim,
    roots: &[Conditional],
) -> Result<(), SimError> {
    fn walk(sim: &Sim, cond: &Conditional) -> Result<(), SimError> {
        match cond {
            Conditional::Assign { .. } => Ok(()),
            Conditional::Group { children } => children.iter().try_for_each(|c| walk(sim, c)),
            Conditional::If {
                branches,
                else_body,
            } => {
                for b in branches {
                    if sim.width_of(b.condition) != 1 {
                        return Err(SimError::MalformedConditional {
                            reason: format!(
                                "if condition `{}` must be 1 bit, is {}",
                                sim.name_of(b.condition),
                                sim.width_of(b.condition)
                            ),
                        });
                    }
                    b.body.iter().try_for_each(|c| walk(sim, c))?;
                }
                else_body
                    .iter()
                    .flatten()
                    .try_for_each(|c| walk(sim, c))
            }
            Conditional::Case {
                items, default, ..
            } => {
                for item in items {
                    item.body.iter().try_for_each(|c| walk(sim, c))?;
                }
                default.iter().flatten().try_for_each(|c| walk(sim, c))
            }
        }
    }
    roots.iter().try_for_each(|c| walk(sim, c))
}

pub(crate) fn exec_roots(
    sim: &mut Sim,
    block: BlockRef,
    body: &BlockBody,
) -> Result<(), SimError> {
    for cond in &body.roots {
        exec_conditional(sim, block, body, cond)?;
    }
    Ok(())
}

fn exec_conditional(
    sim: &mut Sim,
    block: BlockRef,
    body: &BlockBody,
    cond: &Conditional,
) -> Result<(), SimError> {
    match cond {
        Conditional::Assign { receiver, driver } => {
            let mut value = read_driver(sim, block, body, *driver)?;
            if !value.is_valid() {
                // AND with itself promotes Z to X while keeping driven bits.
                value = &value & &value;
            }
            write_receiver(sim, block, body, *receiver, value)
        }
        Conditional::Group { children } => {
            for child in children {
                exec_conditional(sim, block, body, child)?;
            }
            Ok(())
        }
        Conditional::If {
            branches,
            else_body,
        } => {
            for branch in branches {
                let c = read_driver(sim, block, body, branch.condition)?;
                match c.get(0) {
                    Logic::One => {
                        for child in &branch.body {
                            exec_conditional(sim, block, body, child)?;
                        }
                        return Ok(());
                    }
                    Logic::Zero => continue,
                    _ => {
                        log::warn!(
                            "invalid if condition `{}`; driving receivers X",
                            sim.name_of(branch.condition)
                        );
                        return drive_node_receivers_x(sim, block, body, cond);
                    }
                }
            }
            for child in else_body.iter().flatten() {
                exec_conditional(sim, block, body, child)?;
            }
            Ok(())
        }
        Conditional::Case {
            expr,
            items,
            default,
            kind,
            wildcard,
        } => {
            let subject = read_driver(sim, block, body, *expr)?;
            if !subject.is_valid() {
                log::warn!(
                    "invalid case expression `{}`; driving receivers X",
                    sim.name_of(*expr)
                );
                return drive_node_receivers_x(sim, block, body, cond);
            }
            let mut matched = Vec::new();
            for item in items {
                let value = read_driver(sim, block, body, item.value)?;
                if case_matches(&value, &subject, *wildcard) {
                    matched.push(item);
                    // Unique must see every match; the others stop at the first.
                    if *kind != CaseKind::Unique {
                        break;
                    }
                }
            }
            match kind {
                CaseKind::None => match matched.first() {
                    Some(item) => exec_body(sim, block, body, &item.body),
                    None => match default {
                        Some(d) => exec_body(sim, block, body, d),
                        None => Ok(()),
                    },
                },
                CaseKind::Unique => {
                    if matched.len() > 1 {
                        log::warn!("unique case matched more than one item; driving receivers X");
                        drive_node_receivers_x(sim, block, body, cond)
                    } else if let Some(item) = matched.first() {
                        exec_body(sim, block, body, &item.body)
                    } else if let Some(d) = default {
                        exec_body(sim, block, body, d)
                    } else {
                        log::warn!("unique case matched nothing; driving receivers X");
                        drive_node_receivers_x(sim, block, body, cond)
                    }
                }
                CaseKind::Priority => {
                    if let Some(item) = matched.first() {
                        exec_body(sim, block, body, &item.body)
                    } else if let Some(d) = default {
                        exec_body(sim, block, body, d)
                    } else {
                        log::warn!("priority case matched nothing; driving receivers X");
                        drive_node_receivers_x(sim, block, body, cond)
                    }
                }
            }
        }
    }
}

fn exec_body(
    sim: &mut Sim,
    block: BlockRef,
    body: &BlockBody,
    stmts: &[Conditional],
) -> Result<(), SimError> {
    for child in stmts {
        exec_conditional(sim, block, body, child)?;
    }
    Ok(())
}

/// Drives every receiver of `node` (recursively) to all-`X`.
fn drive_node_receivers_x(
    sim: &mut Sim,
    block: BlockRef,
    body: &BlockBody,
    node: &Conditional,
) -> Result<(), SimError> {
    for receiver in node.receivers() {
        let width = sim.width_of(receiver);
        write_receiver(sim, block, body, receiver, LogicValue::xs(width))?;
    }
    Ok(())
}

fn read_driver(
    sim: &mut Sim,
    block: BlockRef,
    body: &BlockBody,
    driver: SignalId,
) -> Result<LogicValue, SimError> {
    let port = body.input_ports[&driver];
    match block {
        BlockRef::Comb(id) => {
            // Arm the write-after-read detector on first glance.
            if !sim.combs[id].guarded.contains(&driver) {
                let wire = sim.signals[port].wire;
                sim.subscribe_glitch(wire, GlitchHandler::CombGuard(id, driver));
                sim.combs[id].guarded.insert(driver);
            }
            sim.combs[id].glanced.insert(driver);
            Ok(sim.value_of(port))
        }
        BlockRef::Seq(id) => {
            if sim.seqs[id].is_trigger(driver) {
                // Triggers always sample their new value.
                Ok(sim.value_of(port))
            } else {
                match sim.seqs[id].pre_tick.get(&driver) {
                    Some(v) => Ok(v.clone()),
                    None => Ok(sim.value_of(port)),
                }
            }
        }
    }
}

fn write_receiver(
    sim: &mut Sim,
    block: BlockRef,
    body: &BlockBody,
    receiver: SignalId,
    value: LogicValue,
) -> Result<(), SimError> {
    match block {
        BlockRef::Comb(id) => {
            sim.combs[id].driven.insert(receiver);
        }
        BlockRef::Seq(id) => {
            let first_write = sim.seqs[id].driven.insert(receiver);
            if !first_write && !sim.seqs[id].allow_multiple_assignments {
                return Err(SimError::RedrivenSignal {
                    signal: sim.name_of(receiver).to_string(),
                });
            }
        }
    }
    let port = body.output_ports[&receiver];
    let wire = sim.signals[port].wire;
    sim.put_wire(wire, value)
}
