//! Edge-triggered (sequential) always blocks.
//!
//! A sequential block samples its non-trigger drivers at their pre-tick
//! values and executes at `ClkStable` when a trigger shows its configured
//! edge. Invalid trigger values and same-tick trigger/driver races drive
//! every output to all-`X` instead of executing.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use rivet_ir::{
    all_drivers, all_receivers, Conditional, Module, ModuleKind, Port, PortDirection, SeqId,
    SignalId, Uniquifier,
};
use rivet_logic::LogicValue;

use crate::error::SimError;
use crate::exec::{exec_roots, validate_conditions, BlockBody, BlockRef};
use crate::sim::Sim;
use crate::wire::GlitchHandler;

/// A clock/trigger edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Rising edge (0 -> 1).
    Pos,
    /// Falling edge (1 -> 0).
    Neg,
}

/// A 1-bit signal and the edge that wakes the block.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    /// The external trigger signal.
    pub signal: SignalId,
    /// The edge to fire on.
    pub edge: Edge,
}

/// Options for [`Sim::sequential`].
pub struct SeqOptions {
    /// When set, the whole body is wrapped in `If(reset) {resets} else {body}`.
    pub reset: Option<SignalId>,
    /// Receiver-to-value reset overrides; uncovered receivers reset to zero.
    pub reset_values: Vec<(SignalId, SignalId)>,
    /// Adds the reset as a positive-edge trigger.
    pub async_reset: bool,
    /// When false, a duplicate receiver write in one execution is fatal.
    pub allow_multiple_assignments: bool,
}

impl Default for SeqOptions {
    fn default() -> Self {
        Self {
            reset: None,
            reset_values: Vec::new(),
            async_reset: false,
            allow_multiple_assignments: true,
        }
    }
}

/// Options for [`Sim::flip_flop`].
#[derive(Default)]
pub struct FlipFlopOptions {
    /// Optional clock-enable signal.
    pub enable: Option<SignalId>,
    /// Optional reset signal.
    pub reset: Option<SignalId>,
    /// Optional reset value signal; defaults to zero.
    pub reset_value: Option<SignalId>,
    /// Adds the reset as a positive-edge trigger.
    pub async_reset: bool,
}

/// The runtime state of one sequential block.
pub(crate) struct SeqBlock {
    pub(crate) body: Rc<BlockBody>,
    /// The block's leaf module (for hierarchy introspection).
    pub(crate) _module: rivet_ir::ModuleId,
    pub(crate) triggers: Vec<Trigger>,
    /// External driver -> value at the start of the current tick.
    pub(crate) pre_tick: HashMap<SignalId, LogicValue>,
    pub(crate) allow_multiple_assignments: bool,
    /// A trigger glitched; execute at the next `ClkStable`.
    pub(crate) pending_trigger: bool,
    /// Already executed during this tick's `ClkStable`.
    pub(crate) fired_this_tick: bool,
    /// A trigger glitched during `BeforeTick`/`MainTick` of this tick.
    pub(crate) trigger_glitched: bool,
    /// A non-trigger driver glitched during `BeforeTick`/`MainTick`.
    pub(crate) driver_glitched: bool,
    /// Trigger and driver both toggled this tick; outputs go X.
    pub(crate) in_violation: bool,
    /// Receivers assigned during the current execution.
    pub(crate) driven: HashSet<SignalId>,
}

impl SeqBlock {
    pub(crate) fn is_trigger(&self, signal: SignalId) -> bool {
        self.triggers.iter().any(|t| t.signal == signal)
    }
}

impl Sim {
    /// Creates an edge-triggered always block.
    ///
    /// With a reset configured, the body becomes
    /// `If(reset) {reset assigns} else {body}`; receivers without an entry in
    /// `reset_values` reset to zero. `async_reset` additionally triggers on
    /// the reset's rising edge.
    pub fn sequential(
        &mut self,
        triggers: Vec<Trigger>,
        roots: Vec<Conditional>,
        options: SeqOptions,
    ) -> Result<SeqId, SimError> {
        validate_conditions(self, &roots)?;
        for t in &triggers {
            if self.signals[t.signal].width != 1 {
                return Err(SimError::WidthMismatch {
                    context: format!("trigger `{}`", self.signals[t.signal].name),
                    expected: 1,
                    found: self.signals[t.signal].width,
                });
            }
        }

        let receivers = all_receivers(&roots);
        for (target, _) in &options.reset_values {
            if !receivers.contains(target) {
                return Err(SimError::UnknownResetTarget {
                    signal: self.signals[*target].name.clone(),
                });
            }
        }

        let mut triggers = triggers;
        let roots = match options.reset {
            Some(reset) => {
                if self.signals[reset].width != 1 {
                    return Err(SimError::WidthMismatch {
                        context: format!("reset `{}`", self.signals[reset].name),
                        expected: 1,
                        found: self.signals[reset].width,
                    });
                }
                let mut reset_assigns = Vec::with_capacity(receivers.len());
                for &receiver in &receivers {
                    let value = match options
                        .reset_values
                        .iter()
                        .find(|(target, _)| *target == receiver)
                    {
                        Some((_, value)) => *value,
                        None => self.constant(self.signals[receiver].width, 0u64)?,
                    };
                    reset_assigns.push(Conditional::assign(receiver, value));
                }
                if options.async_reset {
                    triggers.push(Trigger {
                        signal: reset,
                        edge: Edge::Pos,
                    });
                }
                vec![Conditional::if_else(reset, reset_assigns, roots)]
            }
            None => roots,
        };

        let mut drivers = all_drivers(&roots);
        for t in &triggers {
            if !drivers.contains(&t.signal) {
                drivers.push(t.signal);
            }
        }
        let receivers = all_receivers(&roots);

        let id = SeqId::from_raw(self.seqs.len() as u32);
        let mut module = Module::new(format!("seq_{}", id.as_raw()));
        module.definition_name = Some("sequential".to_string());
        module.kind = ModuleKind::Sequential(id);
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

        // Start the pre-tick map from current values.
        let mut pre_tick = HashMap::new();
        for (&driver, &port) in &input_ports {
            pre_tick.insert(driver, self.value_of(port));
        }

        let trigger_list = triggers.clone();
        let body = Rc::new(BlockBody {
            roots,
            input_ports: input_ports.clone(),
            output_ports,
            receivers,
        });
        let alloc_id = self.seqs.alloc(SeqBlock {
            body,
            _module: module_id,
            triggers: trigger_list,
            pre_tick,
            allow_multiple_assignments: options.allow_multiple_assignments,
            pending_trigger: false,
            fired_this_tick: false,
            trigger_glitched: false,
            driver_glitched: false,
            in_violation: false,
            driven: HashSet::new(),
        });
        debug_assert_eq!(alloc_id, id);

        for (&driver, &port) in &input_ports {
            let wire = self.signals[port].wire;
            let handler = if self.seqs[id].is_trigger(driver) {
                GlitchHandler::SeqTrigger(id)
            } else {
                GlitchHandler::SeqDriver(id)
            };
            self.subscribe_glitch(wire, handler);
        }
        Ok(id)
    }

    /// A D flip-flop: `q <= d` on the clock's rising edge, optionally gated
    /// by an enable and wrapped in a reset.
    pub fn flip_flop(
        &mut self,
        clk: SignalId,
        d: SignalId,
        q: SignalId,
        options: FlipFlopOptions,
    ) -> Result<SeqId, SimError> {
        let assign = Conditional::assign(q, d);
        let body = match options.enable {
            Some(en) => vec![Conditional::if_then(en, vec![assign])],
            None => vec![assign],
        };
        let reset_values = match (options.reset, options.reset_value) {
            (Some(_), Some(value)) => vec![(q, value)],
            _ => Vec::new(),
        };
        self.sequential(
            vec![Trigger {
                signal: clk,
                edge: Edge::Pos,
            }],
            body,
            SeqOptions {
                reset: options.reset,
                reset_values,
                async_reset: options.async_reset,
                ..SeqOptions::default()
            },
        )
    }

    /// Runs every sequential block whose trigger glitched, looping so blocks
    /// triggered during `ClkStable` itself (ripple clocks) also fire.
    pub(crate) fn fire_sequential_blocks(&mut self) -> Result<(), SimError> {
        loop {
            let ready: Vec<SeqId> = self
                .seqs
                .iter()
                .filter(|(_, s)| s.pending_trigger && !s.fired_this_tick)
                .map(|(id, _)| id)
                .collect();
            if ready.is_empty() {
                return Ok(());
            }
            for id in ready {
                self.run_seq(id)?;
            }
        }
    }

    fn run_seq(&mut self, id: SeqId) -> Result<(), SimError> {
        self.seqs[id].pending_trigger = false;
        self.seqs[id].fired_this_tick = true;
        let body = self.seqs[id].body.clone();

        let triggers = self.seqs[id].triggers.clone();
        let mut edge_seen = false;
        for t in &triggers {
            let port = body.input_ports[&t.signal];
            let current = self.value_of(port);
            let previous = match self.seqs[id].pre_tick.get(&t.signal) {
                Some(v) => v.clone(),
                None => current.clone(),
            };
            if !current.is_valid() || !previous.is_valid() {
                log::warn!(
                    "invalid value on trigger `{}`; driving X",
                    self.signals[t.signal].name
                );
                return self.drive_block_outputs_x(&body);
            }
            let fired = match t.edge {
                Edge::Pos => LogicValue::is_posedge(&previous, &current, false)?,
                Edge::Neg => LogicValue::is_negedge(&previous, &current, false)?,
            };
            edge_seen |= fired;
        }
        if !edge_seen {
            // A toggle in the non-firing direction neither executes nor races.
            return Ok(());
        }

        if self.seqs[id].trigger_glitched && self.seqs[id].driver_glitched {
            self.seqs[id].in_violation = true;
        }
        if self.seqs[id].in_violation {
            log::warn!("trigger and driver toggled in the same tick; driving X");
            return self.drive_block_outputs_x(&body);
        }

        self.seqs[id].driven.clear();
        let result = exec_roots(self, BlockRef::Seq(id), &body);
        self.seqs[id].driven.clear();
        result
    }

    fn drive_block_outputs_x(&mut self, body: &BlockBody) -> Result<(), SimError> {
        for &receiver in &body.receivers {
            let width = self.width_of(receiver);
            let port = body.output_ports[&receiver];
            let wire = self.signals[port].wire;
            self.put_wire(wire, LogicValue::xs(width))?;
        }
        Ok(())
    }

    /// At `PostTick`, copies current driver values into each block's pre-tick
    /// map and clears the per-tick flags. Values that changed during
    /// `ClkStable` are therefore deferred until now.
    pub(crate) fn roll_sequential_pre_tick(&mut self) {
        for i in 0..self.seqs.len() {
            let id = SeqId::from_raw(i as u32);
            let body = self.seqs[id].body.clone();
            for (&driver, &port) in &body.input_ports {
                let value = self.value_of(port);
                self.seqs[id].pre_tick.insert(driver, value);
            }
            let block = &mut self.seqs[id];
            block.trigger_glitched = false;
            block.driver_glitched = false;
            block.in_violation = false;
            block.fired_this_tick = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drives `signal` to `value` at `time` through a scheduled action.
    fn drive_at(sim: &mut Sim, time: u64, signal: SignalId, value: u64) {
        sim.register_action(time, Box::new(move |s| s.put(signal, value)))
            .unwrap();
    }

    #[test]
    fn flop_updates_only_on_posedge() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        sim.flip_flop(clk, d, q, FlipFlopOptions::default()).unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 1, d, 5);
        drive_at(&mut sim, 2, clk, 1); // posedge at t=2
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(5));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn flop_samples_pre_tick_value_of_d() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        sim.flip_flop(clk, d, q, FlipFlopOptions::default()).unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 1, d, 3);
        // d changes in the same tick as the posedge: a race, outputs X.
        drive_at(&mut sim, 2, clk, 1);
        drive_at(&mut sim, 2, d, 9);
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q), LogicValue::xs(4));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn no_edge_means_no_update() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        sim.flip_flop(clk, d, q, FlipFlopOptions::default()).unwrap();

        drive_at(&mut sim, 0, clk, 1);
        drive_at(&mut sim, 1, d, 7);
        drive_at(&mut sim, 2, clk, 0); // negedge only
        sim.register_action(
            3,
            Box::new(move |s| {
                // Never saw a valid posedge; q still X from the initial edge
                // attempt at t=0 (X -> 1 is invalid).
                assert_eq!(s.value_of(q), LogicValue::xs(4));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn negedge_trigger_fires_on_falling_edge() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let d = sim.signal("d", 2);
        let q = sim.signal("q", 2);
        sim.sequential(
            vec![Trigger {
                signal: clk,
                edge: Edge::Neg,
            }],
            vec![Conditional::assign(q, d)],
            SeqOptions::default(),
        )
        .unwrap();

        drive_at(&mut sim, 0, clk, 1);
        drive_at(&mut sim, 1, d, 2);
        drive_at(&mut sim, 2, clk, 0);
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(2));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn reset_drives_declared_and_default_values() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let rst = sim.signal("rst", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        let other = sim.signal("other", 4);
        let reset_val = sim.constant(4, 0xAu64).unwrap();
        sim.sequential(
            vec![Trigger {
                signal: clk,
                edge: Edge::Pos,
            }],
            vec![
                Conditional::assign(q, d),
                Conditional::assign(other, d),
            ],
            SeqOptions {
                reset: Some(rst),
                reset_values: vec![(q, reset_val)],
                ..SeqOptions::default()
            },
        )
        .unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 0, rst, 1);
        drive_at(&mut sim, 1, d, 7);
        drive_at(&mut sim, 2, clk, 1); // posedge with reset asserted
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(0xA));
                assert_eq!(s.value_of(other).to_u64(), Some(0));
                Ok(())
            }),
        )
        .unwrap();
        drive_at(&mut sim, 4, rst, 0);
        drive_at(&mut sim, 5, clk, 0);
        drive_at(&mut sim, 6, clk, 1); // posedge with reset released
        sim.register_action(
            7,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(7));
                assert_eq!(s.value_of(other).to_u64(), Some(7));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn unknown_reset_target_is_fatal() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let rst = sim.signal("rst", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        let stranger = sim.signal("stranger", 4);
        let v = sim.constant(4, 1u64).unwrap();
        let err = sim
            .sequential(
                vec![Trigger {
                    signal: clk,
                    edge: Edge::Pos,
                }],
                vec![Conditional::assign(q, d)],
                SeqOptions {
                    reset: Some(rst),
                    reset_values: vec![(stranger, v)],
                    ..SeqOptions::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownResetTarget { .. }));
    }

    #[test]
    fn wide_trigger_is_rejected() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 2);
        let d = sim.signal("d", 1);
        let q = sim.signal("q", 1);
        let err = sim
            .sequential(
                vec![Trigger {
                    signal: clk,
                    edge: Edge::Pos,
                }],
                vec![Conditional::assign(q, d)],
                SeqOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, SimError::WidthMismatch { .. }));
    }

    #[test]
    fn strict_block_rejects_double_write() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        sim.sequential(
            vec![Trigger {
                signal: clk,
                edge: Edge::Pos,
            }],
            vec![
                Conditional::assign(q, d),
                Conditional::assign(q, d),
            ],
            SeqOptions {
                allow_multiple_assignments: false,
                ..SeqOptions::default()
            },
        )
        .unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 1, d, 1);
        drive_at(&mut sim, 2, clk, 1);
        let err = sim.run().unwrap_err();
        assert!(matches!(err, SimError::RedrivenSignal { .. }));
    }

    #[test]
    fn permissive_block_last_write_wins() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let a = sim.signal("a", 4);
        let b = sim.signal("b", 4);
        let q = sim.signal("q", 4);
        sim.sequential(
            vec![Trigger {
                signal: clk,
                edge: Edge::Pos,
            }],
            vec![
                Conditional::assign(q, a),
                Conditional::assign(q, b),
            ],
            SeqOptions::default(),
        )
        .unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 1, a, 1);
        drive_at(&mut sim, 1, b, 2);
        drive_at(&mut sim, 2, clk, 1);
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(2));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn async_reset_fires_without_clock_edge() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let rst = sim.signal("rst", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        sim.flip_flop(
            clk,
            d,
            q,
            FlipFlopOptions {
                reset: Some(rst),
                async_reset: true,
                ..FlipFlopOptions::default()
            },
        )
        .unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 0, rst, 0);
        drive_at(&mut sim, 1, d, 6);
        // No clock edge here, only the async reset rising.
        drive_at(&mut sim, 2, rst, 1);
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(0));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn flop_with_enable_holds_when_disabled() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let en = sim.signal("en", 1);
        let d = sim.signal("d", 4);
        let q = sim.signal("q", 4);
        sim.flip_flop(
            clk,
            d,
            q,
            FlipFlopOptions {
                enable: Some(en),
                ..FlipFlopOptions::default()
            },
        )
        .unwrap();

        drive_at(&mut sim, 0, clk, 0);
        drive_at(&mut sim, 0, en, 1);
        drive_at(&mut sim, 1, d, 4);
        drive_at(&mut sim, 2, clk, 1);
        sim.register_action(
            3,
            Box::new(move |s| {
                assert_eq!(s.value_of(q).to_u64(), Some(4));
                Ok(())
            }),
        )
        .unwrap();
        drive_at(&mut sim, 4, clk, 0);
        drive_at(&mut sim, 5, en, 0);
        drive_at(&mut sim, 6, d, 9);
        drive_at(&mut sim, 8, clk, 1);
        sim.register_action(
            9,
            Box::new(move |s| {
                // Enable low: q holds its previous value.
                assert_eq!(s.value_of(q).to_u64(), Some(4));
                Ok(())
            }),
        )
        .unwrap();
        sim.run().unwrap();
    }
}
