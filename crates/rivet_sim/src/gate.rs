//! Gate primitives: pure functional reactive blocks.
//!
//! Each gate is a leaf module holding input port signals, an unassignable
//! output port signal, and a [`GateKind`] interpreted by a pure evaluator.
//! On construction the gate subscribes to every input's glitch stream and
//! evaluates once to populate its initial value. Degraded conditions
//! (divide-by-zero, invalid mux control, invalid shift amount) produce
//! all-`X` outputs and a log line, never an error.

use rivet_ir::{
    EmitContents, EmitKind, GateId, Module, ModuleKind, Port, PortDirection, PortMap, SignalId,
};
use rivet_logic::{Logic, LogicValue};

use crate::error::SimError;
use crate::signal::SignalOrigin;
use crate::sim::Sim;
use crate::wire::GlitchHandler;

/// The operation a gate performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Bitwise NOT.
    Not,
    /// AND-reduction to one bit.
    RAnd,
    /// OR-reduction to one bit.
    ROr,
    /// XOR-reduction to one bit.
    RXor,
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise XOR.
    Xor,
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Unsigned division; divide-by-zero drives all-`X`.
    Div,
    /// Unsigned remainder; divide-by-zero drives all-`X`.
    Mod,
    /// Wrapping exponentiation.
    Pow,
    /// Equality; 1-bit result.
    Eq,
    /// Inequality; 1-bit result.
    Neq,
    /// Unsigned less-than; 1-bit result.
    Lt,
    /// Unsigned less-than-or-equal; 1-bit result.
    Lte,
    /// Unsigned greater-than; 1-bit result.
    Gt,
    /// Unsigned greater-than-or-equal; 1-bit result.
    Gte,
    /// Logical shift left by a signal amount.
    Shl,
    /// Logical shift right by a signal amount.
    Shr,
    /// Arithmetic shift right by a signal amount.
    Sra,
    /// Two-way multiplexer with a 1-bit control.
    Mux,
    /// Inclusive bit slice; reversed when `high < low`.
    Slice {
        /// High bit index (inclusive).
        high: u32,
        /// Low bit index (inclusive).
        low: u32,
    },
    /// Exclusive bit range `[low, high)`.
    Range {
        /// Low bit index (inclusive).
        low: u32,
        /// High bit index (exclusive).
        high: u32,
    },
    /// Single-bit index by a signal; out-of-bounds or invalid drives `X`.
    Index,
    /// Replication.
    Replicate {
        /// How many copies; at least 1.
        count: u32,
    },
    /// Concatenation; the first input lands in the high bits.
    Swizzle,
    /// Enable-gated driver: `1` drives the input, `0` drives `Z`, invalid
    /// drives `X`.
    TriState,
}

/// A gate instance: kind, input port signals, output port signal.
pub(crate) struct Gate {
    pub(crate) kind: GateKind,
    pub(crate) inputs: Vec<SignalId>,
    pub(crate) output: SignalId,
    /// The gate's leaf module (for hierarchy introspection).
    pub(crate) _module: rivet_ir::ModuleId,
}

/// Evaluates a gate over its input values. Pure; all degraded conditions
/// produce `X` results.
pub(crate) fn eval_gate(kind: GateKind, inputs: &[LogicValue], out_width: u32) -> LogicValue {
    match kind {
        GateKind::Not => !&inputs[0],
        GateKind::RAnd => LogicValue::bit(inputs[0].and_reduce()),
        GateKind::ROr => LogicValue::bit(inputs[0].or_reduce()),
        GateKind::RXor => LogicValue::bit(inputs[0].xor_reduce()),
        GateKind::And => &inputs[0] & &inputs[1],
        GateKind::Or => &inputs[0] | &inputs[1],
        GateKind::Xor => &inputs[0] ^ &inputs[1],
        GateKind::Add => inputs[0].add(&inputs[1]),
        GateKind::Sub => inputs[0].sub(&inputs[1]),
        GateKind::Mul => inputs[0].mul(&inputs[1]),
        GateKind::Div | GateKind::Mod => {
            if inputs[1].is_valid() && inputs[1].or_reduce() == Logic::Zero {
                log::warn!("division by zero; driving X");
            }
            if kind == GateKind::Div {
                inputs[0].div(&inputs[1])
            } else {
                inputs[0].rem(&inputs[1])
            }
        }
        GateKind::Pow => inputs[0].pow(&inputs[1]),
        GateKind::Eq => inputs[0].cmp_eq(&inputs[1]),
        GateKind::Neq => inputs[0].cmp_neq(&inputs[1]),
        GateKind::Lt => inputs[0].cmp_lt(&inputs[1]),
        GateKind::Lte => inputs[0].cmp_lte(&inputs[1]),
        GateKind::Gt => inputs[0].cmp_gt(&inputs[1]),
        GateKind::Gte => inputs[0].cmp_gte(&inputs[1]),
        GateKind::Shl => eval_shift(&inputs[0], &inputs[1], ShiftOp::Left),
        GateKind::Shr => eval_shift(&inputs[0], &inputs[1], ShiftOp::Right),
        GateKind::Sra => eval_shift(&inputs[0], &inputs[1], ShiftOp::RightArith),
        GateKind::Mux => match inputs[0].get(0) {
            Logic::One => inputs[1].clone(),
            Logic::Zero => inputs[2].clone(),
            _ => {
                log::warn!("invalid mux control; driving X");
                LogicValue::xs(out_width)
            }
        },
        GateKind::Slice { high, low } => inputs[0].slice(high, low),
        GateKind::Range { low, high } => inputs[0].get_range(low, high),
        GateKind::Index => {
            let bus = &inputs[0];
            if bus.width() == 1 {
                // A width-1 bus ignores the index and forwards the signal.
                return bus.clone();
            }
            match inputs[1].to_u64() {
                Some(i) if i < u64::from(bus.width()) => LogicValue::bit(bus.get(i as u32)),
                _ => {
                    log::warn!("invalid or out-of-bounds index; driving X");
                    LogicValue::bit(Logic::X)
                }
            }
        }
        GateKind::Replicate { count } => inputs[0].replicate(count),
        GateKind::Swizzle => LogicValue::concat_all(inputs),
        GateKind::TriState => match inputs[0].get(0) {
            Logic::One => inputs[1].clone(),
            Logic::Zero => LogicValue::zs(out_width),
            _ => LogicValue::xs(out_width),
        },
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ShiftOp {
    Left,
    Right,
    RightArith,
}

fn eval_shift(value: &LogicValue, amount: &LogicValue, op: ShiftOp) -> LogicValue {
    let width = value.width();
    let Some(n) = amount.to_big_uint() else {
        log::warn!("invalid shift amount; driving X");
        return LogicValue::xs(width);
    };
    // Shifts beyond the width saturate to a full shift-out.
    let n = u64::try_from(n)
        .unwrap_or(u64::MAX)
        .min(u64::from(width)) as u32;
    match op {
        ShiftOp::Left => value.shift_left(n),
        ShiftOp::Right => value.shift_right(n),
        ShiftOp::RightArith => value.shift_right_arith(n),
    }
}

/// The built-in inline emitter for gate modules.
struct GateEmitter {
    kind: GateKind,
    ports: Vec<String>,
}

impl GateEmitter {
    fn operand<'a>(&self, port_map: &'a PortMap, index: usize) -> Option<&'a str> {
        port_map.get(&self.ports[index]).map(String::as_str)
    }
}

impl EmitContents for GateEmitter {
    fn emit_contents(&self, port_map: &PortMap, kind: EmitKind) -> Option<String> {
        if kind != EmitKind::InlineExpression {
            return None;
        }
        let op2 = |sv: &str| -> Option<String> {
            Some(format!(
                "({} {sv} {})",
                self.operand(port_map, 0)?,
                self.operand(port_map, 1)?
            ))
        };
        match self.kind {
            GateKind::Not => Some(format!("(~{})", self.operand(port_map, 0)?)),
            GateKind::RAnd => Some(format!("(&{})", self.operand(port_map, 0)?)),
            GateKind::ROr => Some(format!("(|{})", self.operand(port_map, 0)?)),
            GateKind::RXor => Some(format!("(^{})", self.operand(port_map, 0)?)),
            GateKind::And => op2("&"),
            GateKind::Or => op2("|"),
            GateKind::Xor => op2("^"),
            GateKind::Add => op2("+"),
            GateKind::Sub => op2("-"),
            GateKind::Mul => op2("*"),
            GateKind::Div => op2("/"),
            GateKind::Mod => op2("%"),
            GateKind::Pow => op2("**"),
            GateKind::Eq => op2("=="),
            GateKind::Neq => op2("!="),
            GateKind::Lt => op2("<"),
            GateKind::Lte => op2("<="),
            GateKind::Gt => op2(">"),
            GateKind::Gte => op2(">="),
            GateKind::Shl => op2("<<"),
            GateKind::Shr => op2(">>"),
            GateKind::Sra => op2(">>>"),
            GateKind::Mux => Some(format!(
                "({} ? {} : {})",
                self.operand(port_map, 0)?,
                self.operand(port_map, 1)?,
                self.operand(port_map, 2)?
            )),
            GateKind::Slice { high, low } => {
                Some(format!("{}[{high}:{low}]", self.operand(port_map, 0)?))
            }
            GateKind::Range { low, high } => Some(format!(
                "{}[{}:{low}]",
                self.operand(port_map, 0)?,
                high.saturating_sub(1)
            )),
            GateKind::Index => Some(format!(
                "{}[{}]",
                self.operand(port_map, 0)?,
                self.operand(port_map, 1)?
            )),
            GateKind::Replicate { count } => {
                Some(format!("{{{count}{{{}}}}}", self.operand(port_map, 0)?))
            }
            GateKind::Swizzle => {
                let parts: Option<Vec<&str>> =
                    (0..self.ports.len()).map(|i| self.operand(port_map, i)).collect();
                Some(format!("{{{}}}", parts?.join(", ")))
            }
            GateKind::TriState => Some(format!(
                "({} ? {} : 'z)",
                self.operand(port_map, 0)?,
                self.operand(port_map, 1)?
            )),
        }
    }
}

impl Sim {
    fn build_gate(
        &mut self,
        kind: GateKind,
        def_name: &str,
        port_names: &[&str],
        operands: &[SignalId],
        out_width: u32,
    ) -> Result<SignalId, SimError> {
        debug_assert_eq!(port_names.len(), operands.len());
        let gate_id = GateId::from_raw(self.gates.len() as u32);
        let inst = format!("{def_name}_{}", gate_id.as_raw());
        let mut module = Module::new(inst.clone());
        module.definition_name = Some(def_name.to_string());
        module.kind = ModuleKind::Gate(gate_id);
        let module_id = self.modules.alloc(module);

        let mut input_ports = Vec::with_capacity(operands.len());
        for (pname, &op) in port_names.iter().zip(operands) {
            let width = self.signals[op].width;
            let port = self.block_signal(&format!("{inst}_{pname}"), width);
            self.connect(port, op)?;
            self.signals[port].port_of = Some(module_id);
            self.modules[module_id].inputs.push(Port {
                name: (*pname).to_string(),
                inner: port,
                source: Some(op),
                direction: PortDirection::Input,
            });
            input_ports.push(port);
        }

        let output = self.new_signal(
            &format!("{inst}_y"),
            out_width,
            SignalOrigin::GateOutput(gate_id),
            false,
        );
        self.signals[output].port_of = Some(module_id);
        self.modules[module_id].outputs.push(Port {
            name: "y".to_string(),
            inner: output,
            source: None,
            direction: PortDirection::Output,
        });

        let id = self.gates.alloc(Gate {
            kind,
            inputs: input_ports.clone(),
            output,
            _module: module_id,
        });
        debug_assert_eq!(id, gate_id);
        for &port in &input_ports {
            let wire = self.signals[port].wire;
            self.subscribe_glitch(wire, GlitchHandler::Gate(id));
        }
        self.emitters.insert(
            module_id,
            Box::new(GateEmitter {
                kind,
                ports: port_names.iter().map(|s| s.to_string()).collect(),
            }),
        );
        self.run_gate(id)?;
        Ok(output)
    }

    /// Recomputes a gate from its current input values.
    pub(crate) fn run_gate(&mut self, id: GateId) -> Result<(), SimError> {
        let inputs: Vec<LogicValue> = self.gates[id]
            .inputs
            .clone()
            .into_iter()
            .map(|s| self.value_of(s))
            .collect();
        let kind = self.gates[id].kind;
        let output = self.gates[id].output;
        let out_width = self.signals[output].width;
        let result = eval_gate(kind, &inputs, out_width);
        let wire = self.signals[output].wire;
        self.put_wire(wire, result)
    }

    /// Widens a constant operand to match the other side; anything else must
    /// already agree on width.
    fn coerce_binary(
        &mut self,
        a: SignalId,
        b: SignalId,
        context: &str,
    ) -> Result<(SignalId, SignalId), SimError> {
        let wa = self.signals[a].width;
        let wb = self.signals[b].width;
        if wa == wb {
            return Ok((a, b));
        }
        if wa < wb && self.is_constant(a) {
            let v = self.value_of(a).zero_extend(wb);
            let c = self.constant(wb, v)?;
            return Ok((c, b));
        }
        if wb < wa && self.is_constant(b) {
            let v = self.value_of(b).zero_extend(wa);
            let c = self.constant(wa, v)?;
            return Ok((a, c));
        }
        Err(SimError::WidthMismatch {
            context: context.to_string(),
            expected: wa,
            found: wb,
        })
    }

    fn binary_gate(
        &mut self,
        kind: GateKind,
        def_name: &str,
        a: SignalId,
        b: SignalId,
        out_width_of: impl Fn(u32) -> u32,
    ) -> Result<SignalId, SimError> {
        let (a, b) = self.coerce_binary(a, b, def_name)?;
        let w = self.signals[a].width;
        self.build_gate(kind, def_name, &["a", "b"], &[a, b], out_width_of(w))
    }

    /// Bitwise NOT of `a`.
    pub fn not_of(&mut self, a: SignalId) -> Result<SignalId, SimError> {
        let w = self.signals[a].width;
        self.build_gate(GateKind::Not, "not", &["a"], &[a], w)
    }

    /// AND-reduction of `a` to one bit.
    pub fn and_reduce_of(&mut self, a: SignalId) -> Result<SignalId, SimError> {
        self.build_gate(GateKind::RAnd, "rand", &["a"], &[a], 1)
    }

    /// OR-reduction of `a` to one bit.
    pub fn or_reduce_of(&mut self, a: SignalId) -> Result<SignalId, SimError> {
        self.build_gate(GateKind::ROr, "ror", &["a"], &[a], 1)
    }

    /// XOR-reduction (parity) of `a` to one bit.
    pub fn xor_reduce_of(&mut self, a: SignalId) -> Result<SignalId, SimError> {
        self.build_gate(GateKind::RXor, "rxor", &["a"], &[a], 1)
    }

    /// Bitwise AND of two equal-width signals.
    pub fn and2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::And, "and", a, b, |w| w)
    }

    /// Bitwise OR of two equal-width signals.
    pub fn or2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Or, "or", a, b, |w| w)
    }

    /// Bitwise XOR of two equal-width signals.
    pub fn xor2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Xor, "xor", a, b, |w| w)
    }

    /// Wrapping sum of two equal-width signals.
    pub fn add_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Add, "add", a, b, |w| w)
    }

    /// Wrapping difference of two equal-width signals.
    pub fn sub_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Sub, "sub", a, b, |w| w)
    }

    /// Wrapping product of two equal-width signals.
    pub fn mul_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Mul, "mul", a, b, |w| w)
    }

    /// Unsigned quotient; divide-by-zero drives all-`X`.
    pub fn div_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Div, "div", a, b, |w| w)
    }

    /// Unsigned remainder; divide-by-zero drives all-`X`.
    pub fn mod_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Mod, "mod", a, b, |w| w)
    }

    /// Wrapping power.
    pub fn pow_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Pow, "pow", a, b, |w| w)
    }

    /// 1-bit equality.
    pub fn eq_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Eq, "eq", a, b, |_| 1)
    }

    /// 1-bit inequality.
    pub fn neq_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Neq, "neq", a, b, |_| 1)
    }

    /// 1-bit unsigned less-than.
    pub fn lt_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Lt, "lt", a, b, |_| 1)
    }

    /// 1-bit unsigned less-than-or-equal.
    pub fn lte_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Lte, "lte", a, b, |_| 1)
    }

    /// 1-bit unsigned greater-than.
    pub fn gt_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Gt, "gt", a, b, |_| 1)
    }

    /// 1-bit unsigned greater-than-or-equal.
    pub fn gte_of(&mut self, a: SignalId, b: SignalId) -> Result<SignalId, SimError> {
        self.binary_gate(GateKind::Gte, "gte", a, b, |_| 1)
    }

    /// Logical shift left; output width equals the left operand's.
    pub fn shl_of(&mut self, a: SignalId, amount: SignalId) -> Result<SignalId, SimError> {
        let w = self.signals[a].width;
        self.build_gate(GateKind::Shl, "shl", &["a", "amount"], &[a, amount], w)
    }

    /// Logical shift right; output width equals the left operand's.
    pub fn shr_of(&mut self, a: SignalId, amount: SignalId) -> Result<SignalId, SimError> {
        let w = self.signals[a].width;
        self.build_gate(GateKind::Shr, "shr", &["a", "amount"], &[a, amount], w)
    }

    /// Arithmetic shift right; sign-extends from the MSB.
    pub fn sra_of(&mut self, a: SignalId, amount: SignalId) -> Result<SignalId, SimError> {
        let w = self.signals[a].width;
        self.build_gate(GateKind::Sra, "sra", &["a", "amount"], &[a, amount], w)
    }

    /// Two-way mux: `sel == 1` selects `d1`, `sel == 0` selects `d0`, an
    /// invalid control drives all-`X`.
    pub fn mux(
        &mut self,
        sel: SignalId,
        d1: SignalId,
        d0: SignalId,
    ) -> Result<SignalId, SimError> {
        if self.signals[sel].width != 1 {
            return Err(SimError::WidthMismatch {
                context: "mux control".into(),
                expected: 1,
                found: self.signals[sel].width,
            });
        }
        let (d1, d0) = self.coerce_binary(d1, d0, "mux data")?;
        let w = self.signals[d1].width;
        self.build_gate(GateKind::Mux, "mux", &["sel", "d1", "d0"], &[sel, d1, d0], w)
    }

    /// Inclusive slice `a[high:low]`; reversed when `high < low`.
    pub fn slice_of(&mut self, a: SignalId, high: u32, low: u32) -> Result<SignalId, SimError> {
        let w = self.signals[a].width;
        if high >= w || low >= w {
            return Err(SimError::WidthMismatch {
                context: format!("slice [{high}:{low}]"),
                expected: w,
                found: high.max(low) + 1,
            });
        }
        let out_w = high.abs_diff(low) + 1;
        self.build_gate(GateKind::Slice { high, low }, "slice", &["a"], &[a], out_w)
    }

    /// Exclusive range `[low, high)`.
    pub fn range_of(&mut self, a: SignalId, low: u32, high: u32) -> Result<SignalId, SimError> {
        let w = self.signals[a].width;
        if low > high || high > w {
            return Err(SimError::WidthMismatch {
                context: format!("range [{low}, {high})"),
                expected: w,
                found: high,
            });
        }
        self.build_gate(
            GateKind::Range { low, high },
            "range",
            &["a"],
            &[a],
            high - low,
        )
    }

    /// Indexes one bit of `bus` by `index`.
    ///
    /// An invalid or out-of-bounds index drives a 1-bit `X`; a width-1 bus
    /// ignores the index and forwards the signal.
    pub fn index_bit(&mut self, bus: SignalId, index: SignalId) -> Result<SignalId, SimError> {
        self.build_gate(GateKind::Index, "index", &["bus", "idx"], &[bus, index], 1)
    }

    /// Replicates `a` `count` times.
    pub fn replicate_of(&mut self, a: SignalId, count: u32) -> Result<SignalId, SimError> {
        if count == 0 {
            return Err(SimError::InvalidReplication);
        }
        let w = self.signals[a].width;
        self.build_gate(
            GateKind::Replicate { count },
            "replicate",
            &["a"],
            &[a],
            w * count,
        )
    }

    /// Concatenates `parts`; the first lands in the high bits.
    pub fn swizzle_of(&mut self, parts: &[SignalId]) -> Result<SignalId, SimError> {
        let names: Vec<String> = (0..parts.len()).map(|i| format!("i{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let out_w = parts.iter().map(|&p| self.signals[p].width).sum();
        self.build_gate(GateKind::Swizzle, "swizzle", &name_refs, parts, out_w)
    }

    /// Tri-state buffer: `enable == 1` drives `d`, `0` drives all-`Z`,
    /// invalid drives all-`X`. The output is typically attached to a net.
    pub fn tristate(&mut self, enable: SignalId, d: SignalId) -> Result<SignalId, SimError> {
        if self.signals[enable].width != 1 {
            return Err(SimError::WidthMismatch {
                context: "tri-state enable".into(),
                expected: 1,
                found: self.signals[enable].width,
            });
        }
        let w = self.signals[d].width;
        self.build_gate(GateKind::TriState, "tristate", &["en", "d"], &[enable, d], w)
    }
}
