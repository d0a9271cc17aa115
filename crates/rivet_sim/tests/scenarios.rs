//! End-to-end simulation scenarios: clocked designs driven over a virtual
//! time axis and checked against expected waveforms.

use rivet_sim::{
    Conditional, FlipFlopOptions, LogicValue, Probe, SeqOptions, Sim, SignalId, Stimulus, Value,
};

fn stim(time: u64, signal: SignalId, value: u64) -> Stimulus {
    Stimulus {
        time,
        signal,
        value: Value::Int(value),
    }
}

fn probe(time: u64, signal: SignalId, expected: u64, width: u32) -> Probe {
    Probe {
        time,
        signal,
        expected: LogicValue::from_u64(expected, width),
    }
}

/// An 8-bit shift register: on every rising clock edge the register shifts
/// left and takes `sin` into the LSB. Reset clears it. The expected values
/// follow the serial input pattern 1,1,1,0,0,0,1,1,1.
#[test]
fn shift_register() {
    let mut sim = Sim::new();
    let clk = sim.signal("clk", 1);
    let reset = sim.signal("reset", 1);
    let sin = sim.signal("sin", 1);
    let sout = sim.signal("sout", 8);

    let tail = sim.slice_of(sout, 6, 0).unwrap();
    let next = sim.swizzle_of(&[tail, sin]).unwrap();
    sim.sequential(
        vec![rivet_sim::Trigger {
            signal: clk,
            edge: rivet_sim::Edge::Pos,
        }],
        vec![Conditional::assign(sout, next)],
        SeqOptions {
            reset: Some(reset),
            ..SeqOptions::default()
        },
    )
    .unwrap();

    sim.start_clock(clk, 10).unwrap();
    sim.apply_vectors(
        vec![
            stim(0, reset, 1),
            stim(0, sin, 0),
            stim(15, reset, 0),
            stim(15, sin, 1),
            stim(45, sin, 0),
            stim(75, sin, 1),
        ],
        vec![
            probe(10, sout, 0b0000_0000, 8),
            probe(20, sout, 0b0000_0001, 8),
            probe(30, sout, 0b0000_0011, 8),
            probe(40, sout, 0b0000_0111, 8),
            probe(50, sout, 0b0000_1110, 8),
            probe(60, sout, 0b0001_1100, 8),
            probe(70, sout, 0b0011_1000, 8),
            probe(80, sout, 0b0111_0001, 8),
            probe(90, sout, 0b1110_0011, 8),
            probe(100, sout, 0b1100_0111, 8),
        ],
    )
    .unwrap();
    sim.set_max_sim_time(110);
    sim.run().unwrap();
}

/// A D flip-flop with a period-10 clock: `d` toggles at time 25 (between
/// edges), so `q` picks the new value up at the next rising edge, time 30.
#[test]
fn dff_updates_on_next_posedge() {
    let mut sim = Sim::new();
    let clk = sim.signal("clk", 1);
    let d = sim.signal("d", 1);
    let q = sim.signal("q", 1);
    sim.flip_flop(clk, d, q, FlipFlopOptions::default()).unwrap();

    sim.start_clock(clk, 10).unwrap();
    sim.apply_vectors(
        vec![stim(1, d, 0), stim(25, d, 1)],
        vec![
            probe(20, q, 0, 1),
            // d already changed, but no edge has sampled it yet.
            probe(25, q, 0, 1),
            probe(30, q, 1, 1),
            probe(40, q, 1, 1),
        ],
    )
    .unwrap();
    sim.set_max_sim_time(50);
    sim.run().unwrap();
}

/// A 4-bit counter: a combinational adder feeds a resettable flop. Checks
/// that each rising edge latches the adder's pre-tick output.
#[test]
fn counter_counts_edges() {
    let mut sim = Sim::new();
    let clk = sim.signal("clk", 1);
    let reset = sim.signal("reset", 1);
    let q = sim.signal("count", 4);
    let one = sim.constant(4, 1u64).unwrap();
    let next = sim.add_of(q, one).unwrap();
    sim.sequential(
        vec![rivet_sim::Trigger {
            signal: clk,
            edge: rivet_sim::Edge::Pos,
        }],
        vec![Conditional::assign(q, next)],
        SeqOptions {
            reset: Some(reset),
            ..SeqOptions::default()
        },
    )
    .unwrap();

    sim.start_clock(clk, 10).unwrap();
    sim.apply_vectors(
        vec![stim(0, reset, 1), stim(15, reset, 0)],
        vec![
            probe(10, q, 0, 4),
            probe(20, q, 1, 4),
            probe(30, q, 2, 4),
            probe(40, q, 3, 4),
            probe(100, q, 9, 4),
        ],
    )
    .unwrap();
    sim.set_max_sim_time(110);
    sim.run().unwrap();
}

/// Two flip-flops in series: the second samples the first's previous output,
/// so it lags by exactly one cycle.
#[test]
fn flop_chain_lags_one_cycle() {
    let mut sim = Sim::new();
    let clk = sim.signal("clk", 1);
    let d = sim.signal("d", 1);
    let q1 = sim.signal("q1", 1);
    let q2 = sim.signal("q2", 1);
    sim.flip_flop(clk, d, q1, FlipFlopOptions::default()).unwrap();
    sim.flip_flop(clk, q1, q2, FlipFlopOptions::default()).unwrap();

    sim.start_clock(clk, 10).unwrap();
    sim.apply_vectors(
        vec![stim(1, d, 0), stim(12, d, 1)],
        vec![
            probe(20, q1, 1, 1),
            probe(20, q2, 0, 1),
            probe(30, q2, 1, 1),
        ],
    )
    .unwrap();
    sim.set_max_sim_time(40);
    sim.run().unwrap();
}

/// A mux with an unknown control degrades to all-X but recovers once the
/// control becomes valid, all under the running scheduler.
#[test]
fn mux_degrades_and_recovers() {
    let mut sim = Sim::new();
    let sel = sim.signal("sel", 1);
    let d1 = sim.constant(4, 0b1010u64).unwrap();
    let d0 = sim.constant(4, 0b0101u64).unwrap();
    let y = sim.mux(sel, d1, d0).unwrap();

    assert_eq!(sim.value_of(y), LogicValue::xs(4));
    sim.apply_vectors(
        vec![stim(5, sel, 1), stim(10, sel, 0)],
        vec![probe(5, y, 0b1010, 4), probe(10, y, 0b0101, 4)],
    )
    .unwrap();
    sim.run().unwrap();
}

/// A module wrapping a small datapath builds into a hierarchy and still
/// simulates: y = (a & b) | c.
#[test]
fn built_module_simulates() {
    let mut sim = Sim::new();
    let a = sim.signal("a", 4);
    let b = sim.signal("b", 4);
    let c = sim.signal("c", 4);
    let y = sim.signal("y", 4);

    let m = sim.module("andor");
    let a_in = sim.add_input(m, "a", a, 4).unwrap();
    let b_in = sim.add_input(m, "b", b, 4).unwrap();
    let c_in = sim.add_input(m, "c", c, 4).unwrap();
    let y_out = sim.add_output(m, "y", 4).unwrap();
    let anded = sim.and2(a_in, b_in).unwrap();
    let ored = sim.or2(anded, c_in).unwrap();
    sim.connect(y_out, ored).unwrap();
    sim.connect(y, y_out).unwrap();
    sim.build(m).unwrap();

    sim.apply_vectors(
        vec![
            stim(1, a, 0b1100),
            stim(1, b, 0b1010),
            stim(1, c, 0b0001),
            stim(5, c, 0b0111),
        ],
        vec![probe(1, y, 0b1001, 4), probe(5, y, 0b1111, 4)],
    )
    .unwrap();
    sim.run().unwrap();
}

/// Tri-state drivers on a shared net: exactly one enabled driver wins, both
/// disabled floats the net, and conflicting enabled drivers produce X.
#[test]
fn tristate_bus_resolution() {
    let mut sim = Sim::new();
    let bus = sim.net("bus", 4);
    let en_a = sim.signal("en_a", 1);
    let en_b = sim.signal("en_b", 1);
    let da = sim.signal("da", 4);
    let db = sim.signal("db", 4);
    let drv_a = sim.tristate(en_a, da).unwrap();
    let drv_b = sim.tristate(en_b, db).unwrap();
    sim.attach_net_driver(bus, drv_a).unwrap();
    sim.attach_net_driver(bus, drv_b).unwrap();

    sim.put(da, 0b1010u64).unwrap();
    sim.put(db, 0b0101u64).unwrap();
    sim.put(en_a, 1u64).unwrap();
    sim.put(en_b, 0u64).unwrap();
    assert_eq!(sim.value_of(bus).to_u64(), Some(0b1010));

    sim.put(en_a, 0u64).unwrap();
    assert!(sim.value_of(bus).is_floating());

    sim.put(en_a, 1u64).unwrap();
    sim.put(en_b, 1u64).unwrap();
    assert_eq!(sim.value_of(bus), LogicValue::xs(4));
}

/// The value-change tap sees exactly the stable transitions of a clocked
/// register, in order, with correct timestamps.
#[test]
fn taps_record_register_history() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut sim = Sim::new();
    let clk = sim.signal("clk", 1);
    let reset = sim.signal("reset", 1);
    let q = sim.signal("count", 2);
    let one = sim.constant(2, 1u64).unwrap();
    let next = sim.add_of(q, one).unwrap();
    sim.sequential(
        vec![rivet_sim::Trigger {
            signal: clk,
            edge: rivet_sim::Edge::Pos,
        }],
        vec![Conditional::assign(q, next)],
        SeqOptions {
            reset: Some(reset),
            ..SeqOptions::default()
        },
    )
    .unwrap();

    let history: Rc<RefCell<Vec<(u64, Option<u64>)>>> = Rc::new(RefCell::new(Vec::new()));
    let h = history.clone();
    sim.tap_changes(
        q,
        Box::new(move |change| {
            h.borrow_mut().push((change.time, change.current.to_u64()));
        }),
    );

    sim.start_clock(clk, 10).unwrap();
    sim.apply_vectors(vec![stim(0, reset, 1), stim(12, reset, 0)], vec![])
        .unwrap();
    sim.set_max_sim_time(45);
    sim.run().unwrap();

    // X -> 0 at the first reset edge, then counting with wraparound.
    assert_eq!(
        *history.borrow(),
        vec![
            (10, Some(0)),
            (20, Some(1)),
            (30, Some(2)),
            (40, Some(3)),
        ]
    );
}
