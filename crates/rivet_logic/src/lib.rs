//! Four-state logic values for the Rivet hardware construction framework.
//!
//! This crate provides the scalar [`Logic`] type, the packed [`LogicValue`]
//! bit-vector with its full arithmetic and slicing algebra, and the [`Value`]
//! conversion entry point that normalizes host-language values before they
//! are driven onto wires.

#![warn(missing_docs)]

pub mod logic;
pub mod logic_value;
pub mod value;

pub use logic::Logic;
pub use logic_value::{EdgeError, LogicValue};
pub use value::{Value, ValueError};
