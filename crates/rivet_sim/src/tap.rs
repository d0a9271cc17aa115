//! Stable value-change taps.
//!
//! External observers (waveform writers, testbench monitors) subscribe to a
//! signal's stable changes and receive `(previous, new, time)` tuples when
//! `post_tick` fires. Pre-tick values are only captured on wires that have
//! ever been observed.

use rivet_ir::{SignalId, TapId};
use rivet_logic::LogicValue;

use crate::seq::Edge;
use crate::sim::Sim;

/// One stable value change on a signal.
#[derive(Debug, Clone)]
pub struct ValueChange {
    /// The observed signal.
    pub signal: SignalId,
    /// The value at the start of the tick.
    pub previous: LogicValue,
    /// The value at the end of the tick.
    pub current: LogicValue,
    /// The virtual time of the tick.
    pub time: u64,
}

/// A tap callback, invoked during the `post_tick` step.
pub type TapCallback = Box<dyn FnMut(&ValueChange)>;

pub(crate) struct Tap {
    pub(crate) wire: rivet_ir::WireId,
    pub(crate) signal: SignalId,
    pub(crate) edge: Option<Edge>,
    pub(crate) callback: TapCallback,
}

impl Sim {
    /// Subscribes to stable value changes of a signal.
    ///
    /// The callback fires at the end of any tick in which the signal's
    /// stable value differs from its pre-tick value.
    pub fn tap_changes(&mut self, signal: SignalId, callback: TapCallback) -> TapId {
        self.add_tap(signal, None, callback)
    }

    /// Subscribes to stable `0 -> 1` transitions of a 1-bit signal.
    ///
    /// Transitions touching `X`/`Z` are treated as non-edges.
    pub fn on_posedge(&mut self, signal: SignalId, callback: TapCallback) -> TapId {
        self.add_tap(signal, Some(Edge::Pos), callback)
    }

    /// Subscribes to stable `1 -> 0` transitions of a 1-bit signal.
    pub fn on_negedge(&mut self, signal: SignalId, callback: TapCallback) -> TapId {
        self.add_tap(signal, Some(Edge::Neg), callback)
    }

    fn add_tap(&mut self, signal: SignalId, edge: Option<Edge>, callback: TapCallback) -> TapId {
        let wire = self.resolve_wire(self.signals[signal].wire);
        if !self.wires[wire].observed {
            self.wires[wire].observed = true;
        }
        self.observed_wires.push(wire);
        self.taps.alloc(Tap {
            wire,
            signal,
            edge,
            callback,
        })
    }

    /// At the `post_tick` step, fires taps for every observed wire whose
    /// value differs from its pre-tick snapshot.
    pub(crate) fn emit_stable_changes(&mut self) {
        let time = self.scheduler.time();
        let mut events: Vec<(TapId, ValueChange)> = Vec::new();
        for i in 0..self.observed_wires.len() {
            let wire = self.resolve_wire(self.observed_wires[i]);
            let Some(previous) = self.wires[wire].pre_tick.take() else {
                continue;
            };
            let current = self.wires[wire].current.clone();
            if previous == current {
                continue;
            }
            for (tap_id, tap) in self.taps.iter() {
                if self.resolve_wire(tap.wire) == wire {
                    events.push((
                        tap_id,
                        ValueChange {
                            signal: tap.signal,
                            previous: previous.clone(),
                            current: current.clone(),
                            time,
                        },
                    ));
                }
            }
        }
        for (tap_id, change) in events {
            let fire = match self.taps[tap_id].edge {
                None => true,
                Some(Edge::Pos) => {
                    LogicValue::is_posedge(&change.previous, &change.current, true)
                        .unwrap_or(false)
                }
                Some(Edge::Neg) => {
                    LogicValue::is_negedge(&change.previous, &change.current, true)
                        .unwrap_or(false)
                }
            };
            if fire {
                (self.taps[tap_id].callback)(&change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn tap_fires_on_stable_change() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let seen: Rc<RefCell<Vec<(u64, Option<u64>, Option<u64>)>>> =
            Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        sim.tap_changes(
            a,
            Box::new(move |c| {
                s.borrow_mut()
                    .push((c.time, c.previous.to_u64(), c.current.to_u64()));
            }),
        );
        sim.register_action(5, Box::new(move |s| s.put(a, 3u64)))
            .unwrap();
        sim.register_action(9, Box::new(move |s| s.put(a, 7u64)))
            .unwrap();
        sim.run().unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![(5, None, Some(3)), (9, Some(3), Some(7))]
        );
    }

    #[test]
    fn tap_does_not_fire_without_change() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        sim.tap_changes(
            a,
            Box::new(move |_| {
                *c.borrow_mut() += 1;
            }),
        );
        sim.register_action(1, Box::new(move |s| s.put(a, 3u64)))
            .unwrap();
        // Re-driving the same value produces no stable change.
        sim.register_action(2, Box::new(move |s| s.put(a, 3u64)))
            .unwrap();
        sim.run().unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn glitch_within_tick_is_not_a_stable_change() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 4);
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        sim.tap_changes(
            a,
            Box::new(move |_| {
                *c.borrow_mut() += 1;
            }),
        );
        sim.register_action(1, Box::new(move |s| s.put(a, 3u64)))
            .unwrap();
        // Toggle away and back within one tick: no stable change.
        sim.register_action(
            2,
            Box::new(move |s| {
                s.put(a, 9u64)?;
                s.put(a, 3u64)
            }),
        )
        .unwrap();
        sim.run().unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn posedge_tap_filters_edges() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let edges = Rc::new(RefCell::new(Vec::new()));
        let e = edges.clone();
        sim.on_posedge(
            clk,
            Box::new(move |c| {
                e.borrow_mut().push(c.time);
            }),
        );
        for (t, v) in [(0u64, 0u64), (5, 1), (10, 0), (15, 1)] {
            sim.register_action(t, Box::new(move |s| s.put(clk, v)))
                .unwrap();
        }
        sim.run().unwrap();
        // t=0 is X -> 0 (no edge); rising at 5 and 15.
        assert_eq!(*edges.borrow(), vec![5, 15]);
    }

    #[test]
    fn negedge_tap_filters_edges() {
        let mut sim = Sim::new();
        let clk = sim.signal("clk", 1);
        let edges = Rc::new(RefCell::new(Vec::new()));
        let e = edges.clone();
        sim.on_negedge(
            clk,
            Box::new(move |c| {
                e.borrow_mut().push(c.time);
            }),
        );
        for (t, v) in [(0u64, 1u64), (5, 0), (10, 1), (15, 0)] {
            sim.register_action(t, Box::new(move |s| s.put(clk, v)))
                .unwrap();
        }
        sim.run().unwrap();
        assert_eq!(*edges.borrow(), vec![5, 15]);
    }

    #[test]
    fn tap_follows_wire_adoption() {
        let mut sim = Sim::new();
        let a = sim.signal("a", 2);
        let b = sim.signal("b", 2);
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        sim.tap_changes(
            b,
            Box::new(move |_| {
                *c.borrow_mut() += 1;
            }),
        );
        // b adopts a's wire after the tap was registered.
        sim.connect(b, a).unwrap();
        sim.register_action(1, Box::new(move |s| s.put(a, 2u64)))
            .unwrap();
        sim.run().unwrap();
        assert_eq!(*count.borrow(), 1);
    }
}
