//! The single conversion entry point for putting host values onto signals.

use crate::logic::Logic;
use crate::logic_value::LogicValue;
use num_bigint::BigUint;

/// Errors from converting a [`Value`] into a [`LogicValue`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    /// The converted value does not match the target width.
    #[error("value of width {found} cannot drive a signal of width {expected}")]
    WidthMismatch {
        /// The target width.
        expected: u32,
        /// The width of the source value.
        found: u32,
    },
    /// A fill source was wider than one bit.
    #[error("fill requires a 1-bit source, got width {width}")]
    FillTooWide {
        /// The width of the source value.
        width: u32,
    },
    /// A fill source integer was neither 0 nor 1.
    #[error("fill requires a 0 or 1 integer source, got {value}")]
    FillBadInt {
        /// The offending integer.
        value: u64,
    },
}

/// A host-language value convertible to a [`LogicValue`] of a known width.
///
/// This is the one place where heterogeneous inputs (booleans, integers,
/// big integers, single bits, full vectors) are normalized before they touch
/// a wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A boolean, converted as the integer 0 or 1.
    Bool(bool),
    /// A single 4-state bit.
    Bit(Logic),
    /// A list of bits, LSB first; must match the target width exactly.
    Bits(Vec<Logic>),
    /// An unsigned integer, little-endian, truncated to the target width.
    Int(u64),
    /// A big unsigned integer, truncated to the target width.
    BigUint(BigUint),
    /// A full vector; must match the target width exactly.
    Logic(LogicValue),
}

impl Value {
    /// Converts to a [`LogicValue`] of exactly `width` bits.
    ///
    /// Integer forms are truncated to `width`; `Bit` and `Logic` forms must
    /// match the width exactly.
    pub fn to_logic_value(&self, width: u32) -> Result<LogicValue, ValueError> {
        match self {
            Value::Bool(b) => Ok(LogicValue::from_u64(u64::from(*b), width)),
            Value::Int(n) => Ok(LogicValue::from_u64(*n, width)),
            Value::BigUint(n) => Ok(LogicValue::from_big_uint(n, width)),
            Value::Bit(b) => {
                if width != 1 {
                    return Err(ValueError::WidthMismatch {
                        expected: width,
                        found: 1,
                    });
                }
                Ok(LogicValue::bit(*b))
            }
            Value::Bits(bits) => {
                if bits.len() as u32 != width {
                    return Err(ValueError::WidthMismatch {
                        expected: width,
                        found: bits.len() as u32,
                    });
                }
                Ok(LogicValue::from_bits(bits.iter().copied()))
            }
            Value::Logic(v) => {
                if v.width() != width {
                    return Err(ValueError::WidthMismatch {
                        expected: width,
                        found: v.width(),
                    });
                }
                Ok(v.clone())
            }
        }
    }

    /// Converts to a [`LogicValue`] by broadcasting a 1-bit source across
    /// `width` bits.
    ///
    /// Any single-bit source (including `X` and `Z`) broadcasts; a multi-bit
    /// source or an integer other than 0/1 is an error.
    pub fn to_logic_value_fill(&self, width: u32) -> Result<LogicValue, ValueError> {
        let bit = match self {
            Value::Bool(b) => Logic::from_bool(*b),
            Value::Bit(b) => *b,
            Value::Int(0) => Logic::Zero,
            Value::Int(1) => Logic::One,
            Value::Int(n) => return Err(ValueError::FillBadInt { value: *n }),
            Value::BigUint(n) => {
                let as_u64 = u64::try_from(n.clone()).map_err(|_| ValueError::FillBadInt {
                    value: u64::MAX,
                })?;
                return Value::Int(as_u64).to_logic_value_fill(width);
            }
            Value::Bits(bits) => {
                if bits.len() != 1 {
                    return Err(ValueError::FillTooWide {
                        width: bits.len() as u32,
                    });
                }
                bits[0]
            }
            Value::Logic(v) => {
                if v.width() != 1 {
                    return Err(ValueError::FillTooWide { width: v.width() });
                }
                v.get(0)
            }
        };
        Ok(LogicValue::filled(width, bit))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value)
    }
}

impl From<Logic> for Value {
    fn from(value: Logic) -> Self {
        Value::Bit(value)
    }
}

impl From<LogicValue> for Value {
    fn from(value: LogicValue) -> Self {
        Value::Logic(value)
    }
}

impl From<BigUint> for Value {
    fn from(value: BigUint) -> Self {
        Value::BigUint(value)
    }
}
