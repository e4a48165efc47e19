//! Pure evaluation of operand expressions.
//!
//! Registers are never read from shared state. Instead, the caller passes the
//! values it knows as `Bindings`, and evaluation fails (returns `None`) as
//! soon as an unbound register or a dereference is encountered.

use crate::insn::{Expression, Register};
use rustc_hash::FxHashMap;

/// Known values of registers, keyed by register name.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    values: FxHashMap<String, i64>,
}

impl Bindings {
    pub fn new() -> Bindings {
        Bindings::default()
    }

    /// Bind `register` to `value`.
    pub fn bind(&mut self, register: &Register, value: i64) {
        self.values.insert(register.name().to_string(), value);
    }

    /// Bind every register in `registers` to `value`.
    pub fn bind_all<'r, I>(&mut self, registers: I, value: i64)
    where
        I: IntoIterator<Item = &'r Register>,
    {
        for register in registers {
            self.bind(register, value);
        }
    }

    pub fn get(&self, register: &Register) -> Option<i64> {
        self.values.get(register.name()).copied()
    }

    pub fn is_bound(&self, register: &Register) -> bool {
        self.values.contains_key(register.name())
    }
}

fn truncate(value: u64, bits: usize) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1 << bits) - 1)
    }
}

fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits >= 64 || bits == 0 {
        return value as i64;
    }
    let value = truncate(value, bits);
    if value & (1 << (bits - 1)) != 0 {
        (value | (u64::MAX << bits)) as i64
    } else {
        value as i64
    }
}

fn eval(expression: &Expression, bindings: &Bindings) -> Option<u64> {
    Some(match expression {
        Expression::Register(register) => bindings.get(register)? as u64,
        Expression::Immediate(value) => *value as u64,
        Expression::Add(lhs, rhs) => eval(lhs, bindings)?.wrapping_add(eval(rhs, bindings)?),
        Expression::Sub(lhs, rhs) => eval(lhs, bindings)?.wrapping_sub(eval(rhs, bindings)?),
        Expression::Mul(lhs, rhs) => eval(lhs, bindings)?.wrapping_mul(eval(rhs, bindings)?),
        Expression::Shl(lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            if rhs >= 64 {
                0
            } else {
                lhs << rhs
            }
        }
        Expression::And(lhs, rhs) => eval(lhs, bindings)? & eval(rhs, bindings)?,
        Expression::Dereference(_, _) => return None,
    })
}

/// Evaluate `expression` under `bindings` at a word width of `bits`.
///
/// Arithmetic wraps. The result is truncated to `bits` and sign-extended, so
/// stack displacements come back as negative values where appropriate.
/// Returns `None` if the expression reads an unbound register, or memory.
pub fn evaluate(expression: &Expression, bindings: &Bindings, bits: usize) -> Option<i64> {
    eval(expression, bindings).map(|value| sign_extend(value, bits))
}

/// Like `evaluate`, but zero-extends the result, for use as an absolute
/// address.
pub fn evaluate_address(expression: &Expression, bindings: &Bindings, bits: usize) -> Option<u64> {
    eval(expression, bindings).map(|value| truncate(value, bits))
}
