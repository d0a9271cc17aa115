//! A small stimulus/expectation harness for testbenches.
//!
//! Stimuli are applied as scheduled actions; probes check settled values by
//! injecting a comparison at the end of their tick. Mismatches go through
//! the scheduler's asynchronous error channel, so they surface as a single
//! failure at the end of the offending tick.

use rivet_ir::SignalId;
use rivet_logic::{LogicValue, Value};

use crate::error::SimError;
use crate::sim::Sim;

/// Drives a signal to a value at a point in time.
#[derive(Clone)]
pub struct Stimulus {
    /// When to apply.
    pub time: u64,
    /// The signal to drive.
    pub signal: SignalId,
    /// The value to drive.
    pub value: Value,
}

/// Checks a signal's settled value at a point in time.
#[derive(Clone)]
pub struct Probe {
    /// When to check (the comparison runs at the end of this tick).
    pub time: u64,
    /// The signal to observe.
    pub signal: SignalId,
    /// The expected settled value.
    pub expected: LogicValue,
}

impl Sim {
    /// Registers stimuli and probes for a subsequent [`run`](Sim::run).
    pub fn apply_vectors(
        &mut self,
        stimuli: Vec<Stimulus>,
        probes: Vec<Probe>,
    ) -> Result<(), SimError> {
        for stimulus in stimuli {
            let Stimulus { time, signal, value } = stimulus;
            self.register_action(time, Box::new(move |s| s.put(signal, value)))?;
        }
        for probe in probes {
            let Probe {
                time,
                signal,
                expected,
            } = probe;
            self.register_action(
                time,
                Box::new(move |s| {
                    s.inject_action(Box::new(move |s2| {
                        let found = s2.value_of(signal);
                        if found != expected {
                            let error = SimError::VectorMismatch {
                                signal: s2.name_of(signal).to_string(),
                                time: s2.time(),
                                expected: expected.to_string(),
                                found: found.to_string(),
                            };
                            s2.throw_exception(error);
                        }
                        Ok(())
                    }));
                    Ok(())
                }),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_ir::Conditional;

    #[test]
    fn passing_vectors_run_clean() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let y = sim.signal("y", 4);
        sim.combinational(vec![Conditional::assign(y, a)]).unwrap();
        sim.apply_vectors(
            vec![
                Stimulus {
                    time: 1,
                    signal: a,
                    value: Value::Int(3),
                },
                Stimulus {
                    time: 5,
                    signal: a,
                    value: Value::Int(9),
                },
            ],
            vec![
                Probe {
                    time: 1,
                    signal: y,
                    expected: LogicValue::from_u64(3, 4),
                },
                Probe {
                    time: 5,
                    signal: y,
                    expected: LogicValue::from_u64(9, 4),
                },
            ],
        )
        .unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn failing_probe_surfaces_as_async_error() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        sim.apply_vectors(
            vec![Stimulus {
                time: 1,
                signal: a,
                value: Value::Int(3),
            }],
            vec![Probe {
                time: 1,
                signal: a,
                expected: LogicValue::from_u64(4, 4),
            }],
        )
        .unwrap();
        let err = sim.run().unwrap_err();
        assert!(matches!(err, SimError::Async { .. }));
        assert!(err.to_string().contains("vector mismatch"));
    }
}
