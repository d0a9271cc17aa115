//! Simulation error types.
//!
//! Configuration and contract-violation errors abort elaboration;
//! runtime-fatal errors end the simulation. Degraded conditions
//! (divide-by-zero, invalid mux control, trigger races) are **not** errors —
//! they produce all-`X` outputs and a log line, and simulation continues.

use rivet_ir::naming::NameError;
use rivet_logic::logic_value::EdgeError;
use rivet_logic::value::ValueError;

/// Errors that can occur during elaboration or simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A port with this name already exists on the module.
    #[error("module `{module}` already has a port named `{port}`")]
    DuplicatePort {
        /// The module being modified.
        module: String,
        /// The duplicate port name.
        port: String,
    },

    /// Two connected ends disagree on width.
    #[error("width mismatch in {context}: expected {expected}, found {found}")]
    WidthMismatch {
        /// What was being connected or driven.
        context: String,
        /// The width required at this point.
        expected: u32,
        /// The width actually supplied.
        found: u32,
    },

    /// A name failed validation.
    #[error(transparent)]
    Name(#[from] NameError),

    /// A module was found to contain itself, directly or transitively.
    #[error("module `{module}` contains itself")]
    SelfContainingModule {
        /// The offending module.
        module: String,
    },

    /// A module is reachable through two different parents.
    #[error("module `{module}` is instantiated in more than one hierarchy")]
    SharedSubmodule {
        /// The offending module.
        module: String,
    },

    /// `build` was called twice on the same module.
    #[error("module `{module}` has already been built")]
    AlreadyBuilt {
        /// The offending module.
        module: String,
    },

    /// A reset value was supplied for a signal the block never drives.
    #[error("reset value provided for `{signal}`, which is not a receiver of the block")]
    UnknownResetTarget {
        /// The offending signal.
        signal: String,
    },

    /// An SSA node was read on a path where it was never assigned.
    #[error("SSA signal `{signal}` is not initialized on every path")]
    UninitializedSsa {
        /// The base signal of the SSA node.
        signal: String,
    },

    /// An SSA node was used as a receiver more than once.
    #[error("SSA signal `{signal}` is mapped more than once")]
    SsaDoubleMapped {
        /// The offending SSA node.
        signal: String,
    },

    /// A replication gate was constructed with a zero multiplier.
    #[error("replication requires a multiplier of at least 1")]
    InvalidReplication,

    /// A conditional node failed structural validation.
    #[error("malformed conditional: {reason}")]
    MalformedConditional {
        /// Why the node is malformed.
        reason: String,
    },

    /// A signal with a fixed source was assigned.
    #[error("signal `{signal}` is not assignable")]
    Unassignable {
        /// The offending signal.
        signal: String,
    },

    /// `connect` was called on a signal that already has a source.
    #[error("signal `{signal}` already has a source connection")]
    SourceAlreadyConnected {
        /// The offending signal.
        signal: String,
    },

    /// An input port of a module is driven by another input of the same module.
    #[error("input `{signal}` of module `{module}` is driven by another input of the same module")]
    InputDependsOnInput {
        /// The module with the violation.
        module: String,
        /// The offending input port signal.
        signal: String,
    },

    /// An action was registered in the past.
    #[error("cannot register an action at time {requested}; current time is {current}")]
    PastTimeAction {
        /// The requested (past) time.
        requested: u64,
        /// The scheduler's current time.
        current: u64,
    },

    /// A receiver was driven twice in one execution of a strict sequential block.
    #[error("signal `{signal}` driven more than once in a single sequential execution")]
    RedrivenSignal {
        /// The offending signal.
        signal: String,
    },

    /// A combinational block wrote a driver it had already read in the same pass.
    #[error("write after read of signal `{signal}` in combinational block")]
    WriteAfterRead {
        /// The offending signal.
        signal: String,
    },

    /// A clock generator was started with an unusable period.
    #[error("clock period must be at least 2, got {period}")]
    InvalidClockPeriod {
        /// The offending period.
        period: u64,
    },

    /// A net operation was applied to a signal that is not a net.
    #[error("signal `{signal}` is not a net")]
    NotANet {
        /// The offending signal.
        signal: String,
    },

    /// A test vector expectation failed.
    #[error("vector mismatch on `{signal}` at time {time}: expected {expected}, found {found}")]
    VectorMismatch {
        /// The probed signal.
        signal: String,
        /// The probe time.
        time: u64,
        /// The expected value.
        expected: String,
        /// The observed value.
        found: String,
    },

    /// The simulation has already ended.
    #[error("simulation has ended")]
    SimulationEnded,

    /// Errors thrown asynchronously during a tick, re-raised at its end.
    #[error("asynchronous simulation errors: {}", messages.join("; "))]
    Async {
        /// The collected error messages.
        messages: Vec<String>,
    },

    /// A host value could not be converted for a signal.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// An edge predicate failed.
    #[error(transparent)]
    Edge(#[from] EdgeError),
}
