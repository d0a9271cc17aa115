//! A free-running clock generator built from self-re-registering actions.

use rivet_ir::SignalId;
use rivet_logic::{Logic, Value};

use crate::error::SimError;
use crate::sim::Sim;

impl Sim {
    /// Starts a clock on `signal` with the given period.
    ///
    /// The clock drives `1` for the first half period and `0` for the
    /// second, so the first rising edge after start-up lands at `period`.
    /// The generator re-registers itself forever; bound the run with
    /// [`set_max_sim_time`](Sim::set_max_sim_time) or
    /// [`end_simulation`](Sim::end_simulation).
    pub fn start_clock(&mut self, signal: SignalId, period: u64) -> Result<(), SimError> {
        if period < 2 {
            return Err(SimError::InvalidClockPeriod { period });
        }
        if self.signals[signal].width != 1 {
            return Err(SimError::WidthMismatch {
                context: format!("clock `{}`", self.signals[signal].name),
                expected: 1,
                found: self.signals[signal].width,
            });
        }
        schedule_toggle(self, signal, period / 2, Logic::One, self.time())?;
        Ok(())
    }
}

fn schedule_toggle(
    sim: &mut Sim,
    signal: SignalId,
    half_period: u64,
    value: Logic,
    at: u64,
) -> Result<(), SimError> {
    sim.register_action(
        at,
        Box::new(move |s| {
            s.put(signal, Value::Bit(value))?;
            schedule_toggle(s, signal, half_period, !value, at + half_period)
        }),
    )?;
    Ok(())
}
