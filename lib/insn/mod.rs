//! The decoded instruction model consumed by absflow.
//!
//! Absflow does not decode machine code. An instruction decoder hands over
//! instructions through the `Instruction` trait: an operation tag, the ordered
//! operand expressions, the registers read and written, and the address
//! expressions of any memory read or written. `DecodedInstruction` is a plain
//! implementation of that trait for decoders which lift into owned values.
//!
//! ## `Register` and `Expression`
//!
//! Operands are small expression trees over registers and immediates.
//! `Expression::Dereference` marks a memory access. The address inside a
//! dereference can be evaluated with `evaluate` once the registers it
//! mentions are bound to constant values.

mod eval;
mod expression;
mod instruction;
mod register;

pub use self::eval::*;
pub use self::expression::*;
pub use self::instruction::*;
pub use self::register::*;

/// A convenience function to create a new register.
///
/// This is the preferred way to create a `Register`.
pub fn reg<S>(name: S, bits: usize) -> Register
where
    S: Into<String>,
{
    Register::new(name, bits)
}

/// A convenience function to create a new register expression.
///
/// This is the preferred way to create an `Expression::Register`.
pub fn expr_reg<S>(name: S, bits: usize) -> Expression
where
    S: Into<String>,
{
    Expression::register(Register::new(name, bits))
}

/// A convenience function to create a new immediate expression.
pub fn expr_imm(value: i64) -> Expression {
    Expression::immediate(value)
}

/// A convenience function to create a dereference of `bits` bits at
/// `address`.
pub fn deref(address: Expression, bits: usize) -> Expression {
    Expression::dereference(address, bits)
}
