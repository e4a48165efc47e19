use crate::insn::Register;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An operand expression, as reported by the instruction decoder.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expression {
    Register(Register),
    Immediate(i64),
    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Mul(Box<Expression>, Box<Expression>),
    Shl(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    /// A read or write of `bits` bits of memory at the address given by the
    /// inner expression.
    Dereference(Box<Expression>, usize),
}

impl Expression {
    /// Create a new expression from a register.
    pub fn register(register: Register) -> Expression {
        Expression::Register(register)
    }

    /// Create a new expression from an immediate value.
    pub fn immediate(value: i64) -> Expression {
        Expression::Immediate(value)
    }

    /// Create an addition expression.
    #[allow(clippy::should_implement_trait)]
    pub fn add(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Add(Box::new(lhs), Box::new(rhs))
    }

    /// Create a subtraction expression.
    #[allow(clippy::should_implement_trait)]
    pub fn sub(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Sub(Box::new(lhs), Box::new(rhs))
    }

    /// Create a multiplication expression.
    #[allow(clippy::should_implement_trait)]
    pub fn mul(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Mul(Box::new(lhs), Box::new(rhs))
    }

    /// Create a logical shift-left expression.
    #[allow(clippy::should_implement_trait)]
    pub fn shl(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Shl(Box::new(lhs), Box::new(rhs))
    }

    /// Create a binary and expression.
    pub fn and(lhs: Expression, rhs: Expression) -> Expression {
        Expression::And(Box::new(lhs), Box::new(rhs))
    }

    /// Create a dereference of `bits` bits at `address`.
    pub fn dereference(address: Expression, bits: usize) -> Expression {
        Expression::Dereference(Box::new(address), bits)
    }

    /// If this expression is a dereference, the address being dereferenced.
    pub fn dereferenced(&self) -> Option<&Expression> {
        match self {
            Expression::Dereference(address, _) => Some(address),
            _ => None,
        }
    }

    pub fn is_dereference(&self) -> bool {
        self.dereferenced().is_some()
    }

    /// Returns every register used in the expression, in order of first
    /// appearance, without duplicates.
    pub fn registers(&self) -> Vec<&Register> {
        let mut registers: Vec<&Register> = Vec::new();
        self.collect_registers(&mut registers);
        registers
    }

    fn collect_registers<'e>(&'e self, registers: &mut Vec<&'e Register>) {
        match self {
            Expression::Register(register) => {
                if !registers.contains(&register) {
                    registers.push(register);
                }
            }
            Expression::Immediate(_) => {}
            Expression::Add(lhs, rhs)
            | Expression::Sub(lhs, rhs)
            | Expression::Mul(lhs, rhs)
            | Expression::Shl(lhs, rhs)
            | Expression::And(lhs, rhs) => {
                lhs.collect_registers(registers);
                rhs.collect_registers(registers);
            }
            Expression::Dereference(address, _) => address.collect_registers(registers),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Register(register) => register.fmt(f),
            Expression::Immediate(value) => {
                if *value < 0 {
                    write!(f, "-0x{:X}", value.unsigned_abs())
                } else {
                    write!(f, "0x{:X}", value)
                }
            }
            Expression::Add(lhs, rhs) => write!(f, "({} + {})", lhs, rhs),
            Expression::Sub(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
            Expression::Mul(lhs, rhs) => write!(f, "({} * {})", lhs, rhs),
            Expression::Shl(lhs, rhs) => write!(f, "({} << {})", lhs, rhs),
            Expression::And(lhs, rhs) => write!(f, "({} & {})", lhs, rhs),
            Expression::Dereference(address, bits) => write!(f, "[{}]:{}", address, bits),
        }
    }
}
