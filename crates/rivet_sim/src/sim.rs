//! The simulator: one explicit struct owning the scheduler and the netlist.
//!
//! All construction and simulation goes through [`Sim`]. There is no
//! process-global state; `reset` is "drop and create a new instance".

use std::collections::HashMap;

use rivet_ir::{
    ActionId, Arena, CombId, EmitContents, GateId, Module, ModuleId, SeqId, SignalId, TapId,
    WireId,
};

use crate::comb::CombBlock;
use crate::error::SimError;
use crate::gate::Gate;
use crate::scheduler::{Action, Phase, PhaseStream, Scheduler};
use crate::seq::SeqBlock;
use crate::signal::SignalState;
use crate::tap::Tap;
use crate::wire::Wire;

/// A phase-stream subscriber.
pub type PhaseCallback = Box<dyn FnMut(&mut Sim)>;

/// The simulator: scheduler, wires, signals, gates, modules, and always
/// blocks, owned together so actions and glitch handlers can reach all of it.
pub struct Sim {
    pub(crate) scheduler: Scheduler,
    pub(crate) wires: Arena<WireId, Wire>,
    pub(crate) signals: Arena<SignalId, SignalState>,
    pub(crate) gates: Arena<GateId, Gate>,
    pub(crate) modules: Arena<ModuleId, Module>,
    pub(crate) combs: Arena<CombId, CombBlock>,
    pub(crate) seqs: Arena<SeqId, SeqBlock>,
    pub(crate) taps: Arena<TapId, Tap>,
    /// Wires with at least one stable-change subscriber, in subscription order.
    pub(crate) observed_wires: Vec<WireId>,
    pub(crate) emitters: HashMap<ModuleId, Box<dyn EmitContents>>,
    pub(crate) phase_subs: [Vec<PhaseCallback>; 4],
    pub(crate) next_ssa_context: u32,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    /// Creates an empty simulator at time 0.
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            wires: Arena::new(),
            signals: Arena::new(),
            gates: Arena::new(),
            modules: Arena::new(),
            combs: Arena::new(),
            seqs: Arena::new(),
            taps: Arena::new(),
            observed_wires: Vec::new(),
            emitters: HashMap::new(),
            phase_subs: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
            next_ssa_context: 0,
        }
    }

    /// Discards everything and starts over with a fresh instance.
    pub fn reset(&mut self) {
        *self = Sim::new();
    }

    /// Clears pending scheduler state and phase subscribers but keeps the
    /// netlist, for tests that re-run a built design.
    pub fn reset_scheduler(&mut self) {
        self.scheduler = Scheduler::new();
        self.phase_subs = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    }

    /// The current virtual time.
    pub fn time(&self) -> u64 {
        self.scheduler.time()
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    /// Whether the simulation has completed.
    pub fn is_ended(&self) -> bool {
        self.scheduler.is_ended()
    }

    /// Registers `action` to run at `time`. See [`Scheduler::register_action`].
    pub fn register_action(&mut self, time: u64, action: Action) -> Result<ActionId, SimError> {
        self.scheduler.register_action(time, action)
    }

    /// Cancels a registered action by identity.
    pub fn cancel_action(&mut self, time: u64, id: ActionId) -> bool {
        self.scheduler.cancel_action(time, id)
    }

    /// Appends an action to the injected FIFO (runs at end of current tick).
    pub fn inject_action(&mut self, action: Action) {
        self.scheduler.inject_action(action);
    }

    /// Registers an action to run after the main loop exits.
    pub fn register_end_of_simulation_action(&mut self, action: Action) {
        self.scheduler.register_end_of_simulation_action(action);
    }

    /// Collects an asynchronous error; it is re-raised at the end of the tick.
    pub fn throw_exception(&mut self, error: SimError) {
        self.scheduler.throw_exception(error);
    }

    /// Sets the time past which [`run`](Sim::run) stops with a warning.
    pub fn set_max_sim_time(&mut self, time: u64) {
        self.scheduler.set_max_sim_time(time);
    }

    /// Requests a graceful stop after the current tick.
    pub fn end_simulation(&mut self) {
        self.scheduler.end_simulation();
    }

    /// Subscribes to one of the four phase broadcast streams.
    ///
    /// Subscribers are called synchronously, in subscription order, during
    /// the corresponding step of every tick. A subscriber added during a
    /// broadcast first fires on the next tick.
    pub fn on_phase(&mut self, stream: PhaseStream, callback: PhaseCallback) {
        self.phase_subs[stream.index()].push(callback);
    }

    fn broadcast_phase(&mut self, stream: PhaseStream) {
        let idx = stream.index();
        let mut subs = std::mem::take(&mut self.phase_subs[idx]);
        for cb in subs.iter_mut() {
            cb(self);
        }
        let added = std::mem::take(&mut self.phase_subs[idx]);
        subs.extend(added);
        self.phase_subs[idx] = subs;
    }

    /// Executes one tick: the four phases at the next pending timestamp.
    ///
    /// Returns without doing anything when no work is pending. Fatal errors
    /// end the simulation and propagate.
    pub fn tick(&mut self) -> Result<(), SimError> {
        if self.scheduler.is_ended() {
            return Err(SimError::SimulationEnded);
        }
        // Injected actions waiting outside a tick force a tick at the
        // current timestamp.
        if self.scheduler.has_injected() && !self.scheduler.has_slot_at(self.scheduler.time()) {
            self.scheduler.ensure_slot(self.scheduler.time());
        }
        let Some((time, mut actions)) = self.scheduler.pop_next_slot() else {
            return Ok(());
        };
        self.scheduler.advance_to(time);

        self.scheduler.set_phase(Phase::BeforeTick);
        self.capture_pre_tick_values();
        self.broadcast_phase(PhaseStream::PreTick);

        self.scheduler.set_phase(Phase::MainTick);
        self.broadcast_phase(PhaseStream::StartTick);
        while let Some((_, action)) = actions.pop_front() {
            if let Err(e) = action(self) {
                self.scheduler.mark_ended();
                return Err(e);
            }
        }

        self.scheduler.set_phase(Phase::ClkStable);
        if let Err(e) = self.fire_sequential_blocks() {
            self.scheduler.mark_ended();
            return Err(e);
        }
        self.broadcast_phase(PhaseStream::ClkStable);

        while let Some(action) = self.scheduler.pop_injected() {
            if let Err(e) = action(self) {
                self.scheduler.mark_ended();
                return Err(e);
            }
        }
        self.emit_stable_changes();
        self.roll_sequential_pre_tick();
        self.broadcast_phase(PhaseStream::PostTick);
        self.scheduler.set_phase(Phase::OutOfTick);

        // A trigger that glitched after its block fired (or outside
        // MainTick) is honored in a delta cycle at the same timestamp.
        if self.seqs.values().any(|s| s.pending_trigger) {
            self.scheduler.ensure_slot(self.scheduler.time());
        }

        let errors = self.scheduler.take_async_errors();
        if !errors.is_empty() {
            self.scheduler.mark_ended();
            return Err(SimError::Async {
                messages: errors.iter().map(|e| e.to_string()).collect(),
            });
        }
        Ok(())
    }

    /// Runs ticks until the queue drains, a stop is requested, or
    /// `max_sim_time` is exceeded; then drains end-of-simulation actions.
    pub fn run(&mut self) -> Result<(), SimError> {
        let result = self.run_loop();
        while let Some(action) = self.scheduler.pop_end_of_sim() {
            if let Err(e) = action(self) {
                log::warn!("end-of-simulation action failed: {e}");
            }
        }
        self.scheduler.mark_ended();
        result
    }

    fn run_loop(&mut self) -> Result<(), SimError> {
        while self.scheduler.has_pending_work() && !self.scheduler.is_end_requested() {
            if let (Some(max), Some(next), false) = (
                self.scheduler.max_sim_time(),
                self.scheduler.next_pending_time(),
                self.scheduler.has_injected(),
            ) {
                if next > max {
                    log::warn!("simulation exceeded max time {max}; ending");
                    break;
                }
            }
            self.tick()?;
        }
        Ok(())
    }
}
