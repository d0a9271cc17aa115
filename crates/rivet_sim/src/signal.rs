//! Named signal handles and connection semantics.
//!
//! A signal exposes its wire's value. `connect` ("gets") merges the two ends
//! onto one wire via adoption, so a driven signal never listens forever —
//! it *is* the driver's wire. Nets additionally support multi-driver
//! resolution with the [`Logic::resolve`](rivet_logic::Logic::resolve) merge.

use rivet_ir::{GateId, ModuleId, SignalId, WireId};
use rivet_logic::{LogicValue, Value};

use crate::error::SimError;
use crate::sim::Sim;
use crate::wire::GlitchHandler;

/// What produced a signal. Used by build traversal and SSA cone walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalOrigin {
    /// Created directly by user code.
    User,
    /// A constant; unassignable.
    Const,
    /// The output port of a gate; unassignable.
    GateOutput(GateId),
    /// An input or output port of an always block or gate.
    BlockPort,
}

/// The per-signal metadata record.
pub(crate) struct SignalState {
    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) wire: WireId,
    /// The single signal driving this one, set at most once.
    pub(crate) src: Option<SignalId>,
    /// Signals this one drives.
    pub(crate) dsts: Vec<SignalId>,
    pub(crate) assignable: bool,
    pub(crate) origin: SignalOrigin,
    /// The module that owns this signal as an internal, set during build.
    pub(crate) owner: Option<ModuleId>,
    /// The module this signal is a port of, if any.
    pub(crate) port_of: Option<ModuleId>,
    /// Net signals resolve multiple drivers instead of taking one source.
    pub(crate) is_net: bool,
    /// Drivers attached to this net.
    pub(crate) net_drivers: Vec<SignalId>,
    /// Bidirectional peers (the two views of an in-out port).
    pub(crate) net_peers: Vec<SignalId>,
}

impl Sim {
    /// Creates a named signal of the given width, initialized to all-`X`.
    ///
    /// The name is sanitized into a legal identifier. Width 0 is legal and
    /// represents the empty bus.
    pub fn signal(&mut self, name: &str, width: u32) -> SignalId {
        self.new_signal(name, width, SignalOrigin::User, true)
    }

    /// Creates a net: a signal whose value is the resolution of all attached
    /// drivers.
    pub fn net(&mut self, name: &str, width: u32) -> SignalId {
        let id = self.new_signal(name, width, SignalOrigin::User, false);
        self.signals[id].is_net = true;
        id
    }

    pub(crate) fn new_signal(
        &mut self,
        name: &str,
        width: u32,
        origin: SignalOrigin,
        assignable: bool,
    ) -> SignalId {
        let wire = self.alloc_wire(width);
        self.signals.alloc(SignalState {
            name: rivet_ir::sanitize(name),
            width,
            wire,
            src: None,
            dsts: Vec::new(),
            assignable,
            origin,
            owner: None,
            port_of: None,
            is_net: false,
            net_drivers: Vec::new(),
            net_peers: Vec::new(),
        })
    }

    pub(crate) fn block_signal(&mut self, name: &str, width: u32) -> SignalId {
        self.new_signal(name, width, SignalOrigin::BlockPort, true)
    }

    /// Creates an unassignable constant signal of the given width.
    pub fn constant(&mut self, width: u32, value: impl Into<Value>) -> Result<SignalId, SimError> {
        let logic = value.into().to_logic_value(width)?;
        let id = self.new_signal("const", width, SignalOrigin::Const, false);
        let wire = self.signals[id].wire;
        self.put_wire(wire, logic)?;
        Ok(id)
    }

    /// The signal's name (after sanitization).
    pub fn name_of(&self, signal: SignalId) -> &str {
        &self.signals[signal].name
    }

    /// The signal's width.
    pub fn width_of(&self, signal: SignalId) -> u32 {
        self.signals[signal].width
    }

    /// The signal's current value.
    pub fn value_of(&self, signal: SignalId) -> LogicValue {
        self.wire_value(self.signals[signal].wire)
    }

    pub(crate) fn is_constant(&self, signal: SignalId) -> bool {
        self.signals[signal].origin == SignalOrigin::Const
    }

    /// Drives a value onto an assignable signal.
    ///
    /// Fatal if the signal is unassignable or already has a source.
    pub fn put(&mut self, signal: SignalId, value: impl Into<Value>) -> Result<(), SimError> {
        let logic = value.into().to_logic_value(self.signals[signal].width)?;
        self.put_checked(signal, logic)
    }

    /// Drives a 1-bit value broadcast across the signal's width.
    pub fn put_fill(&mut self, signal: SignalId, value: impl Into<Value>) -> Result<(), SimError> {
        let logic = value.into().to_logic_value_fill(self.signals[signal].width)?;
        self.put_checked(signal, logic)
    }

    fn put_checked(&mut self, signal: SignalId, value: LogicValue) -> Result<(), SimError> {
        let state = &self.signals[signal];
        if !state.assignable || state.src.is_some() {
            return Err(SimError::Unassignable {
                signal: state.name.clone(),
            });
        }
        let wire = state.wire;
        self.put_wire(wire, value)
    }

    /// Connects `dst` to follow `src` ("gets").
    ///
    /// After this call the two signals share one wire: `dst` adopts `src`'s
    /// wire, its subscribers migrate, and every downstream connection of
    /// `dst` resolves to the same wire. `dst` becomes unassignable.
    pub fn connect(&mut self, dst: SignalId, src: SignalId) -> Result<(), SimError> {
        let dst_state = &self.signals[dst];
        let src_width = self.signals[src].width;
        if dst_state.width != src_width {
            return Err(SimError::WidthMismatch {
                context: format!(
                    "connect `{}` to `{}`",
                    self.signals[dst].name, self.signals[src].name
                ),
                expected: dst_state.width,
                found: src_width,
            });
        }
        if dst_state.src.is_some() {
            return Err(SimError::SourceAlreadyConnected {
                signal: dst_state.name.clone(),
            });
        }
        if !dst_state.assignable {
            return Err(SimError::Unassignable {
                signal: dst_state.name.clone(),
            });
        }
        self.signals[dst].src = Some(src);
        self.signals[dst].assignable = false;
        self.signals[src].dsts.push(dst);
        let old = self.signals[dst].wire;
        let new = self.signals[src].wire;
        self.adopt_wire(old, new)?;
        let canonical = self.resolve_wire(new);
        self.repoint_signal_wire(dst, canonical);
        Ok(())
    }

    fn repoint_signal_wire(&mut self, signal: SignalId, wire: WireId) {
        self.signals[signal].wire = wire;
        let dsts = self.signals[signal].dsts.clone();
        for d in dsts {
            self.repoint_signal_wire(d, wire);
        }
    }

    /// Returns true when two signals share one wire (connected via `connect`
    /// or adoption).
    pub fn same_wire(&self, a: SignalId, b: SignalId) -> bool {
        self.resolve_wire(self.signals[a].wire) == self.resolve_wire(self.signals[b].wire)
    }

    /// Attaches a driver to a net; the net re-resolves on every driver glitch.
    pub fn attach_net_driver(
        &mut self,
        net: SignalId,
        driver: SignalId,
    ) -> Result<(), SimError> {
        if !self.signals[net].is_net {
            return Err(SimError::NotANet {
                signal: self.signals[net].name.clone(),
            });
        }
        let net_width = self.signals[net].width;
        let drv_width = self.signals[driver].width;
        if net_width != drv_width {
            return Err(SimError::WidthMismatch {
                context: format!("attach driver to net `{}`", self.signals[net].name),
                expected: net_width,
                found: drv_width,
            });
        }
        self.signals[net].net_drivers.push(driver);
        let wire = self.signals[driver].wire;
        self.subscribe_glitch(wire, GlitchHandler::Net(net));
        self.run_net(net)
    }

    /// Re-resolves a net from its drivers: `Z` yields, agreement keeps the
    /// value, conflicts and `X` produce `X`. No drivers leaves the net
    /// floating.
    pub(crate) fn run_net(&mut self, net: SignalId) -> Result<(), SimError> {
        let width = self.signals[net].width;
        let drivers = self.signals[net].net_drivers.clone();
        let mut resolved = LogicValue::zs(width);
        for d in drivers {
            let v = self.value_of(d);
            resolved = LogicValue::from_bits(
                (0..width).map(|i| resolved.get(i).resolve(v.get(i))),
            );
        }
        let wire = self.signals[net].wire;
        self.put_wire(wire, resolved)
    }
}
