use crate::insn::Expression;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A machine register, as named by the instruction decoder.
///
/// Sub-registers are distinct `Register` values (`eax` is not `rax`).
/// Canonicalization to the full-width register is the job of
/// `Architecture::full_register`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Register {
    name: String,
    bits: usize,
}

impl Register {
    pub fn new<S>(name: S, bits: usize) -> Register
    where
        S: Into<String>,
    {
        Register {
            name: name.into(),
            bits,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    /// An identifier uniquely identifies the register in the form
    /// `<name>:<bits>`
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.name, self.bits)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl From<Register> for Expression {
    fn from(register: Register) -> Expression {
        Expression::Register(register)
    }
}
