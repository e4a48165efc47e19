//! Absflow: abstract locations and data-flow assignments for decoded machine
//! instructions.
//!
//! Absflow turns a single decoded instruction into the set of
//! `(defined location, [input locations])` tuples it induces. Downstream
//! analyses (liveness, slicing, instrumentation safety checks) can then
//! reason about dependencies without re-interpreting instruction semantics.
//!
//! The crate is split into:
//!
//! * `insn` - The decoder-facing instruction model: registers, operand
//! expressions, operation tags, and a pure evaluator for address expressions.
//! * `architecture` - Stack pointer, frame pointer and program counter
//! registers, and register aliasing, for each supported architecture.
//! * `function` - The minimal function model used to key and scope results.
//! * `analysis` - Abstract locations, the region classifier, the assignment
//! builder, the stack height oracle interface, and conversion caches.
//!
//! # Example
//!
//! ```
//! use absflow::analysis::{AssignmentConverter, Height, StackHeight, StackHeights};
//! use absflow::architecture::Amd64;
//! use absflow::function::{Function, FunctionId};
//! use absflow::insn;
//! use absflow::Options;
//!
//! let function = Function::new(FunctionId::new(0), 0x1000, Amd64::new());
//!
//! let mut heights = StackHeights::new();
//! heights.set_stack(function.id(), 0x1000, StackHeight::Value(Height::new(0, 1)));
//! heights.set_frame(function.id(), 0x1000, StackHeight::Bottom);
//!
//! // push rbx
//! let push = insn::DecodedInstruction::new(insn::Operation::Push, 1)
//!     .operand(insn::Operand::new(insn::expr_reg("rbx", 64)))
//!     .operand(insn::Operand::implicit(insn::expr_reg("rsp", 64)));
//!
//! let mut converter = AssignmentConverter::new(&heights, Options::new());
//! let assignments = converter.convert(&push, 0x1000, &function).unwrap();
//! assert_eq!(assignments.len(), 2);
//! ```

#[macro_use]
extern crate log;

pub mod analysis;
pub mod architecture;
pub mod function;
pub mod insn;
mod options;
#[cfg(test)]
mod tests;

pub use options::{Options, OptionsBuilder};

#[cfg(not(feature = "thread_safe"))]
use std::rc::Rc;
#[cfg(feature = "thread_safe")]
use std::sync::Arc;

/// Shared reference type for values handed out by converters and their
/// caches.
#[cfg(not(feature = "thread_safe"))]
pub type RC<T> = Rc<T>;
#[cfg(feature = "thread_safe")]
pub type RC<T> = Arc<T>;

use thiserror::Error;

/// Errors raised by absflow.
///
/// Every variant is a contract violation by a collaborator (the stack height
/// oracle, or the instruction decoder). When one occurs the conversion is
/// aborted, and nothing is cached.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{operation} at 0x{address:x} resolved operand {operand} to no location")]
    MissingRegion {
        operation: String,
        address: u64,
        operand: usize,
    },
    #[error("{operation} at 0x{address:x} has {found} operands, expected {expected}")]
    OperandCount {
        operation: String,
        address: u64,
        expected: usize,
        found: usize,
    },
    #[error("{operation} at 0x{address:x} has a malformed operand {operand}: {reason}")]
    OperandShape {
        operation: String,
        address: u64,
        operand: usize,
        reason: &'static str,
    },
    #[error("The {domain} height at 0x{address:x} in {function} has not been analyzed")]
    Unanalyzed {
        domain: &'static str,
        function: String,
        address: u64,
    },
}
