//! The virtual-time event queue and phase machine.
//!
//! [`Scheduler`] is pure state: the time-ordered action queue, the injected
//! and end-of-simulation FIFOs, the current phase, and collected asynchronous
//! errors. The tick loop that drives it lives on [`Sim`](crate::sim::Sim),
//! which owns the scheduler alongside the netlist so actions can mutate both.

use std::collections::{BTreeMap, VecDeque};

use rivet_ir::ActionId;

use crate::error::SimError;
use crate::sim::Sim;

/// A scheduled callback, run once with full access to the simulator.
pub type Action = Box<dyn FnOnce(&mut Sim) -> Result<(), SimError>>;

/// The four phases of a tick.
///
/// Every tick advances `BeforeTick -> MainTick -> ClkStable -> OutOfTick`.
/// Outside of any tick the phase is `OutOfTick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pre-tick value capture; nothing may change signal values yet.
    BeforeTick,
    /// Scheduled actions execute; combinational logic settles.
    MainTick,
    /// Sequential blocks sample their triggers and fire.
    ClkStable,
    /// Between ticks: injected actions drained, stable changes emitted.
    OutOfTick,
}

/// The four broadcast streams surrounding a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseStream {
    /// Fired at the start of `BeforeTick`.
    PreTick,
    /// Fired at the start of `MainTick`, before any action runs.
    StartTick,
    /// Fired during `ClkStable`, after sequential blocks execute.
    ClkStable,
    /// Fired at the end of the tick, after stable changes are emitted.
    PostTick,
}

impl PhaseStream {
    pub(crate) fn index(self) -> usize {
        match self {
            PhaseStream::PreTick => 0,
            PhaseStream::StartTick => 1,
            PhaseStream::ClkStable => 2,
            PhaseStream::PostTick => 3,
        }
    }
}

/// Virtual-time event queue state.
///
/// Time is a plain `u64` and is monotonically non-decreasing; registering an
/// action in the past is a hard error. Actions at the same time run in
/// registration (FIFO) order.
pub struct Scheduler {
    current_time: u64,
    phase: Phase,
    pending: BTreeMap<u64, VecDeque<(ActionId, Action)>>,
    injected: VecDeque<Action>,
    end_of_sim: VecDeque<Action>,
    next_action_id: u64,
    max_sim_time: Option<u64>,
    end_requested: bool,
    ended: bool,
    async_errors: Vec<SimError>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler at time 0, outside of any tick.
    pub fn new() -> Self {
        Self {
            current_time: 0,
            phase: Phase::OutOfTick,
            pending: BTreeMap::new(),
            injected: VecDeque::new(),
            end_of_sim: VecDeque::new(),
            next_action_id: 0,
            max_sim_time: None,
            end_requested: false,
            ended: false,
            async_errors: Vec::new(),
        }
    }

    /// The current virtual time.
    pub fn time(&self) -> u64 {
        self.current_time
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn advance_to(&mut self, time: u64) {
        debug_assert!(
            time >= self.current_time,
            "scheduler time moved backwards: {} -> {}",
            self.current_time,
            time
        );
        self.current_time = time;
    }

    /// Registers `action` to run at `time`.
    ///
    /// Registering at the current time during a tick creates a delta cycle:
    /// the action runs in the next tick at the same timestamp.
    pub fn register_action(&mut self, time: u64, action: Action) -> Result<ActionId, SimError> {
        if time < self.current_time {
            return Err(SimError::PastTimeAction {
                requested: time,
                current: self.current_time,
            });
        }
        let id = ActionId::from_raw(self.next_action_id);
        self.next_action_id += 1;
        self.pending.entry(time).or_default().push_back((id, action));
        Ok(id)
    }

    /// Removes a previously registered action by identity.
    ///
    /// Returns whether the action was found (and not yet executed).
    pub fn cancel_action(&mut self, time: u64, id: ActionId) -> bool {
        let Some(slot) = self.pending.get_mut(&time) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|(aid, _)| *aid != id);
        let removed = slot.len() != before;
        if slot.is_empty() {
            self.pending.remove(&time);
        }
        removed
    }

    /// Appends an action to the injected FIFO.
    ///
    /// Injected actions always run at the end of the current tick; outside of
    /// a tick they force a new tick at the current timestamp.
    pub fn inject_action(&mut self, action: Action) {
        self.injected.push_back(action);
    }

    /// Registers an action to run after the main simulation loop exits.
    pub fn register_end_of_simulation_action(&mut self, action: Action) {
        self.end_of_sim.push_back(action);
    }

    /// Collects an asynchronous error, to be re-raised at the end of the tick.
    pub fn throw_exception(&mut self, error: SimError) {
        self.async_errors.push(error);
    }

    /// Sets the time past which the run loop stops with a warning.
    pub fn set_max_sim_time(&mut self, time: u64) {
        self.max_sim_time = Some(time);
    }

    /// The configured maximum simulation time, if any.
    pub fn max_sim_time(&self) -> Option<u64> {
        self.max_sim_time
    }

    /// Requests a graceful stop after the current tick completes.
    pub fn end_simulation(&mut self) {
        self.end_requested = true;
    }

    /// Whether a graceful stop has been requested.
    pub fn is_end_requested(&self) -> bool {
        self.end_requested
    }

    /// Whether the simulation has completed.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn mark_ended(&mut self) {
        self.ended = true;
    }

    pub(crate) fn take_async_errors(&mut self) -> Vec<SimError> {
        std::mem::take(&mut self.async_errors)
    }

    pub(crate) fn has_injected(&self) -> bool {
        !self.injected.is_empty()
    }

    pub(crate) fn pop_injected(&mut self) -> Option<Action> {
        self.injected.pop_front()
    }

    pub(crate) fn pop_end_of_sim(&mut self) -> Option<Action> {
        self.end_of_sim.pop_front()
    }

    pub(crate) fn has_slot_at(&self, time: u64) -> bool {
        self.pending.contains_key(&time)
    }

    pub(crate) fn ensure_slot(&mut self, time: u64) {
        self.pending.entry(time).or_default();
    }

    pub(crate) fn pop_next_slot(&mut self) -> Option<(u64, VecDeque<(ActionId, Action)>)> {
        let (&time, _) = self.pending.iter().next()?;
        let slot = self.pending.remove(&time)?;
        Some((time, slot))
    }

    /// Whether any pending or injected work remains.
    pub fn has_pending_work(&self) -> bool {
        !self.pending.is_empty() || !self.injected.is_empty()
    }

    /// The timestamp of the earliest pending slot, if any.
    pub fn next_pending_time(&self) -> Option<u64> {
        self.pending.keys().next().copied()
    }
}
