//! Wire cells: the only mutable shared state in the simulator.
//!
//! Every wire is an arena-allocated cell identified by a stable [`WireId`].
//! Subscribers are entries in a synchronous dispatch table; adoption merges
//! one wire into another by migrating subscribers and installing a redirect
//! so stale handles keep resolving.

use rivet_ir::{CombId, GateId, SeqId, SignalId, WireId};
use rivet_logic::LogicValue;

use crate::error::SimError;
use crate::scheduler::Phase;
use crate::sim::Sim;

/// A subscriber in a wire's glitch dispatch table.
///
/// Handlers are plain data so dispatch needs no reentrant closures; the
/// simulator interprets each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GlitchHandler {
    /// Recompute a gate.
    Gate(GateId),
    /// Re-execute a combinational block.
    Comb(CombId),
    /// A combinational write-after-read detector for one driver.
    CombGuard(CombId, SignalId),
    /// A sequential block's trigger input glitched.
    SeqTrigger(SeqId),
    /// A sequential block's non-trigger driver glitched.
    SeqDriver(SeqId),
    /// Re-resolve a multi-driver net.
    Net(SignalId),
}

/// The interior state of one wire cell.
pub(crate) struct Wire {
    pub(crate) width: u32,
    pub(crate) current: LogicValue,
    /// Captured at `BeforeTick` once any stable subscriber exists.
    pub(crate) pre_tick: Option<LogicValue>,
    /// Set once a stable-change subscriber has ever been registered.
    pub(crate) observed: bool,
    pub(crate) glitch_subs: Vec<GlitchHandler>,
    /// Holding this flag = a `put` on this wire is on the synchronous call stack.
    pub(crate) is_putting: bool,
    /// A reentrant `put` arrived while `is_putting` was held.
    pub(crate) contended: bool,
    /// When set, this wire has been adopted; all access resolves through here.
    pub(crate) redirect: Option<WireId>,
}

impl Wire {
    pub(crate) fn new(width: u32) -> Self {
        Self {
            width,
            current: LogicValue::xs(width),
            pre_tick: None,
            observed: false,
            glitch_subs: Vec::new(),
            is_putting: false,
            contended: false,
            redirect: None,
        }
    }
}

impl Sim {
    pub(crate) fn alloc_wire(&mut self, width: u32) -> WireId {
        self.wires.alloc(Wire::new(width))
    }

    /// Follows adoption redirects to the canonical wire.
    pub(crate) fn resolve_wire(&self, mut wire: WireId) -> WireId {
        while let Some(next) = self.wires[wire].redirect {
            wire = next;
        }
        wire
    }

    /// The current value of a wire (canonical).
    pub(crate) fn wire_value(&self, wire: WireId) -> LogicValue {
        let w = self.resolve_wire(wire);
        self.wires[w].current.clone()
    }

    pub(crate) fn subscribe_glitch(&mut self, wire: WireId, handler: GlitchHandler) {
        let w = self.resolve_wire(wire);
        self.wires[w].glitch_subs.push(handler);
    }

    /// Drives `value` onto a wire, synchronously notifying glitch subscribers
    /// on every change.
    ///
    /// A reentrant `put` on the same wire is a contention: the wire is forced
    /// to all-`X` and subscribers are re-notified. Width mismatch is fatal.
    pub(crate) fn put_wire(&mut self, wire: WireId, value: LogicValue) -> Result<(), SimError> {
        let w = self.resolve_wire(wire);
        let width = self.wires[w].width;
        if value.width() != width {
            return Err(SimError::WidthMismatch {
                context: "put onto wire".into(),
                expected: width,
                found: value.width(),
            });
        }
        if self.wires[w].is_putting {
            self.wires[w].contended = true;
            return Ok(());
        }
        self.wires[w].is_putting = true;
        let result = self.put_wire_held(w, value);
        self.wires[w].is_putting = false;
        self.wires[w].contended = false;
        result
    }

    fn put_wire_held(&mut self, w: WireId, value: LogicValue) -> Result<(), SimError> {
        let mut next = value;
        loop {
            if next == self.wires[w].current {
                return Ok(());
            }
            self.wires[w].current = next;
            let subs = self.wires[w].glitch_subs.clone();
            for handler in subs {
                self.dispatch_glitch(handler)?;
            }
            if self.wires[w].contended {
                self.wires[w].contended = false;
                log::warn!("contention on wire; forcing all-X");
                next = LogicValue::xs(self.wires[w].width);
                continue;
            }
            return Ok(());
        }
    }

    pub(crate) fn dispatch_glitch(&mut self, handler: GlitchHandler) -> Result<(), SimError> {
        match handler {
            GlitchHandler::Gate(id) => self.run_gate(id),
            GlitchHandler::Comb(id) => self.run_comb(id),
            GlitchHandler::CombGuard(id, driver) => {
                let block = &self.combs[id];
                if block.is_executing && block.glanced.contains(&driver) {
                    return Err(SimError::WriteAfterRead {
                        signal: self.signals[driver].name.clone(),
                    });
                }
                Ok(())
            }
            GlitchHandler::SeqTrigger(id) => {
                let phase = self.scheduler.phase();
                let block = &mut self.seqs[id];
                block.pending_trigger = true;
                if matches!(phase, Phase::BeforeTick | Phase::MainTick) {
                    block.trigger_glitched = true;
                }
                Ok(())
            }
            GlitchHandler::SeqDriver(id) => {
                let phase = self.scheduler.phase();
                if matches!(phase, Phase::BeforeTick | Phase::MainTick) {
                    self.seqs[id].driver_glitched = true;
                }
                Ok(())
            }
            GlitchHandler::Net(signal) => self.run_net(signal),
        }
    }

    /// Merges wire `old` into wire `new`.
    ///
    /// The adopter's current value is propagated to the old wire's consumers
    /// first, then subscribers and observation state migrate, then a redirect
    /// makes stale handles resolve to `new`.
    pub(crate) fn adopt_wire(&mut self, old: WireId, new: WireId) -> Result<(), SimError> {
        let old = self.resolve_wire(old);
        let new = self.resolve_wire(new);
        if old == new {
            return Ok(());
        }
        let value = self.wires[new].current.clone();
        self.put_wire(old, value)?;
        let subs = std::mem::take(&mut self.wires[old].glitch_subs);
        self.wires[new].glitch_subs.extend(subs);
        if self.wires[old].observed {
            self.wires[new].observed = true;
            self.observed_wires.push(new);
        }
        self.wires[old].redirect = Some(new);
        Ok(())
    }

    /// Snapshots every observed wire at `BeforeTick`.
    pub(crate) fn capture_pre_tick_values(&mut self) {
        for i in 0..self.observed_wires.len() {
            let w = self.resolve_wire(self.observed_wires[i]);
            let current = self.wires[w].current.clone();
            self.wires[w].pre_tick = Some(current);
        }
    }
}
