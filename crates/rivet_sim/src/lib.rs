//! Cycle-accurate 4-state simulator for the Rivet hardware construction
//! framework.
//!
//! Hardware is described directly in Rust — signals, gates, modules, and
//! conditional always blocks — and simulated with 4-state logic over a
//! virtual time axis. Everything hangs off one explicit [`Sim`] instance;
//! there is no process-global state.
//!
//! # Architecture
//!
//! Wires are arena-allocated cells addressed by stable IDs; connecting two
//! signals merges their wires (adoption), so connected signals literally
//! share storage. Glitches propagate synchronously and depth-first through
//! a dispatch table of gates and always blocks. The scheduler drives four
//! phases per tick (`BeforeTick -> MainTick -> ClkStable -> OutOfTick`),
//! with sequential blocks sampling pre-tick values and firing at
//! `ClkStable`.
//!
//! # Usage
//!
//! ```ignore
//! use rivet_sim::Sim;
//!
//! let mut sim = Sim::new();
//! let clk = sim.signal("clk", 1);
//! let d = sim.signal("d", 8);
//! let q = sim.signal("q", 8);
//! sim.flip_flop(clk, d, q, Default::default())?;
//! sim.start_clock(clk, 10)?;
//! sim.set_max_sim_time(200);
//! sim.run()?;
//! ```
//!
//! # Modules
//!
//! - `error` — the simulation error taxonomy
//! - `scheduler` — virtual-time queue and phase machine
//! - `wire` — shared wire cells, glitch dispatch, adoption
//! - `signal` — named handles, connection, constants, nets
//! - `gate` — gate primitives and their degraded-to-X policies
//! - `exec` — conditional AST execution
//! - `comb` / `seq` — the always-block harnesses
//! - `ssa` — construction-time SSA rewrite with phi insertion
//! - `module` / `build` — module structure and the build traversal
//! - `clock` — a simple clock generator
//! - `tap` — stable value-change subscriptions
//! - `vectors` — stimulus/expectation testbench helper
//! - `emit` — emission-string routing

#![warn(missing_docs)]

pub mod build;
pub mod clock;
pub mod comb;
pub mod emit;
pub mod error;
mod exec;
pub mod gate;
pub mod module;
pub mod scheduler;
pub mod seq;
pub mod signal;
pub mod sim;
pub mod ssa;
pub mod tap;
pub mod vectors;
pub mod wire;

pub use error::SimError;
pub use gate::GateKind;
pub use scheduler::{Action, Phase, PhaseStream, Scheduler};
pub use seq::{Edge, FlipFlopOptions, SeqOptions, Trigger};
pub use sim::Sim;
pub use ssa::SsaScope;
pub use tap::{TapCallback, ValueChange};
pub use vectors::{Probe, Stimulus};

pub use rivet_ir::{
    CaseItem, CaseKind, Conditional, EmitContents, EmitKind, PortMap, SignalId,
};
pub use rivet_logic::{Logic, LogicValue, Value};
