//! The conditional AST executed by always blocks.
//!
//! [`Conditional`] is the data model of behavioral code: procedural
//! assignments, groups, if/else chains, and case statements. The tree is pure
//! structure — execution lives in the simulator, which walks it against the
//! block's port bindings.

use crate::ids::SignalId;
use rivet_logic::{Logic, LogicValue};
use serde::{Deserialize, Serialize};

/// Errors from conditional construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConditionalError {
    /// An `If` node was constructed with no branches.
    #[error("if-chain must have at least one branch")]
    EmptyIf,
    /// A `Case` node was constructed with no items and no default.
    #[error("case must have at least one item or a default")]
    EmptyCase,
}

/// The matching discipline of a [`Conditional::Case`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseKind {
    /// Execute the first matching item; fall through to the default.
    None,
    /// Exactly one item must match; violations drive all receivers to `X`.
    Unique,
    /// At least one item must match; the first wins. No match and no
    /// default drives all receivers to `X`.
    Priority,
}

/// One condition/body pair in an [`Conditional::If`] chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    /// The 1-bit condition signal.
    pub condition: SignalId,
    /// The statements executed when the condition is `1`.
    pub body: Vec<Conditional>,
}

/// One match arm of a [`Conditional::Case`] node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    /// The signal holding the match value (typically a constant).
    pub value: SignalId,
    /// The statements executed when the item matches.
    pub body: Vec<Conditional>,
}

/// A node in the behavioral AST of an always block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Conditional {
    /// A procedural assignment `receiver < driver`.
    Assign {
        /// The signal being written.
        receiver: SignalId,
        /// The signal being read.
        driver: SignalId,
    },
    /// A sequence of statements executed in order.
    Group {
        /// The child statements.
        children: Vec<Conditional>,
    },
    /// An if/else-if/else chain.
    If {
        /// The condition/body pairs, evaluated in order.
        branches: Vec<IfBranch>,
        /// The body executed when no condition is `1`. Always last.
        else_body: Option<Vec<Conditional>>,
    },
    /// A case statement.
    Case {
        /// The subject signal being matched.
        expr: SignalId,
        /// The match arms, searched in order.
        items: Vec<CaseItem>,
        /// The default arm, if any.
        default: Option<Vec<Conditional>>,
        /// The matching discipline.
        kind: CaseKind,
        /// When set, `Z` bits in item values are wildcards (`casez`).
        wildcard: bool,
    },
}

impl Conditional {
    /// A procedural assignment node.
    pub fn assign(receiver: SignalId, driver: SignalId) -> Self {
        Conditional::Assign { receiver, driver }
    }

    /// A group node executing `children` in order.
    pub fn group(children: Vec<Conditional>) -> Self {
        Conditional::Group { children }
    }

    /// A single-branch `if` with no `else`.
    pub fn if_then(condition: SignalId, body: Vec<Conditional>) -> Self {
        Conditional::If {
            branches: vec![IfBranch { condition, body }],
            else_body: None,
        }
    }

    /// A single-branch `if` with an `else`.
    pub fn if_else(
        condition: SignalId,
        body: Vec<Conditional>,
        else_body: Vec<Conditional>,
    ) -> Self {
        Conditional::If {
            branches: vec![IfBranch { condition, body }],
            else_body: Some(else_body),
        }
    }

    /// A full if/else-if/else chain.
    ///
    /// The branch list must not be empty; the `else` is last by construction.
    pub fn if_chain(
        branches: Vec<IfBranch>,
        else_body: Option<Vec<Conditional>>,
    ) -> Result<Self, ConditionalError> {
        if branches.is_empty() {
            return Err(ConditionalError::EmptyIf);
        }
        Ok(Conditional::If {
            branches,
            else_body,
        })
    }

    /// A case statement.
    pub fn case(
        expr: SignalId,
        items: Vec<CaseItem>,
        default: Option<Vec<Conditional>>,
        kind: CaseKind,
        wildcard: bool,
    ) -> Result<Self, ConditionalError> {
        if items.is_empty() && default.is_none() {
            return Err(ConditionalError::EmptyCase);
        }
        Ok(Conditional::Case {
            expr,
            items,
            default,
            kind,
            wildcard,
        })
    }

    /// All signals this node reads, recursively, in first-seen order.
    ///
    /// Conditions, case subjects, and case item values are drivers.
    pub fn drivers(&self) -> Vec<SignalId> {
        let mut out = Vec::new();
        self.collect_drivers(&mut out);
        out
    }

    /// All signals this node writes, recursively, in first-seen order.
    pub fn receivers(&self) -> Vec<SignalId> {
        let mut out = Vec::new();
        self.collect_receivers(&mut out);
        out
    }

    fn collect_drivers(&self, out: &mut Vec<SignalId>) {
        fn push(out: &mut Vec<SignalId>, id: SignalId) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        match self {
            Conditional::Assign { driver, .. } => push(out, *driver),
            Conditional::Group { children } => {
                for c in children {
                    c.collect_drivers(out);
                }
            }
            Conditional::If {
                branches,
                else_body,
            } => {
                for b in branches {
                    push(out, b.condition);
                    for c in &b.body {
                        c.collect_drivers(out);
                    }
                }
                for c in else_body.iter().flatten() {
                    c.collect_drivers(out);
                }
            }
            Conditional::Case {
                expr,
                items,
                default,
                ..
            } => {
                push(out, *expr);
                for item in items {
                    push(out, item.value);
                    for c in &item.body {
                        c.collect_drivers(out);
                    }
                }
                for c in default.iter().flatten() {
                    c.collect_drivers(out);
                }
            }
        }
    }

    fn collect_receivers(&self, out: &mut Vec<SignalId>) {
        match self {
            Conditional::Assign { receiver, .. } => {
                if !out.contains(receiver) {
                    out.push(*receiver);
                }
            }
            Conditional::Group { children } => {
                for c in children {
                    c.collect_receivers(out);
                }
            }
            Conditional::If {
                branches,
                else_body,
            } => {
                for b in branches {
                    for c in &b.body {
                        c.collect_receivers(out);
                    }
                }
                for c in else_body.iter().flatten() {
                    c.collect_receivers(out);
                }
            }
            Conditional::Case {
                items, default, ..
            } => {
                for item in items {
                    for c in &item.body {
                        c.collect_receivers(out);
                    }
                }
                for c in default.iter().flatten() {
                    c.collect_receivers(out);
                }
            }
        }
    }
}

/// Collects the union of drivers across a list of roots, in first-seen order.
pub fn all_drivers(roots: &[Conditional]) -> Vec<SignalId> {
    let mut out = Vec::new();
    for root in roots {
        for d in root.drivers() {
            if !out.contains(&d) {
                out.push(d);
            }
        }
    }
    out
}

/// Collects the union of receivers across a list of roots, in first-seen order.
pub fn all_receivers(roots: &[Conditional]) -> Vec<SignalId> {
    let mut out = Vec::new();
    for root in roots {
        for r in root.receivers() {
            if !out.contains(&r) {
                out.push(r);
            }
        }
    }
    out
}

/// Decides whether a case item value matches the (valid) subject value.
///
/// Plain matching is exact 4-state equality. With `wildcard` set (`casez`),
/// `Z` bits in the **item** value match any subject bit.
pub fn case_matches(item: &LogicValue, expr: &LogicValue, wildcard: bool) -> bool {
    if item.width() != expr.width() {
        return false;
    }
    if !wildcard {
        return item == expr;
    }
    (0..item.width()).all(|i| {
        let ib = item.get(i);
        ib == Logic::Z || ib == expr.get(i)
    })
}
