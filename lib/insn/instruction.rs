use crate::insn::{Expression, Register};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The classification of an instruction's operation.
///
/// Only operations which need their own data-flow treatment get a variant of
/// their own. Everything else is `Other`, carrying the decoder's mnemonic.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Operation {
    Push,
    Pop,
    Call,
    ReturnNear,
    ReturnFar,
    /// Frame teardown: `sp = fp; fp = pop()`.
    Leave,
    Exchange,
    Other(String),
}

impl Operation {
    pub fn is_return(&self) -> bool {
        matches!(self, Operation::ReturnNear | Operation::ReturnFar)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Push => write!(f, "push"),
            Operation::Pop => write!(f, "pop"),
            Operation::Call => write!(f, "call"),
            Operation::ReturnNear => write!(f, "ret"),
            Operation::ReturnFar => write!(f, "retf"),
            Operation::Leave => write!(f, "leave"),
            Operation::Exchange => write!(f, "xchg"),
            Operation::Other(mnemonic) => write!(f, "{}", mnemonic),
        }
    }
}

/// An operand of an instruction.
///
/// Implicit operands are those the decoder reports even though they do not
/// appear in the instruction's text, like the stack pointer of a `push`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Operand {
    value: Expression,
    implicit: bool,
}

impl Operand {
    pub fn new(value: Expression) -> Operand {
        Operand {
            value,
            implicit: false,
        }
    }

    pub fn implicit(value: Expression) -> Operand {
        Operand {
            value,
            implicit: true,
        }
    }

    pub fn value(&self) -> &Expression {
        &self.value
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.implicit {
            write!(f, "{{{}}}", self.value)
        } else {
            self.value.fmt(f)
        }
    }
}

/// A decoded instruction, as supplied by an instruction decoder.
///
/// Register sets name registers as the decoder sees them. Memory operands are
/// the *address* expressions of each memory access, without the enclosing
/// dereference.
pub trait Instruction {
    /// The classification tag of this instruction.
    fn operation(&self) -> &Operation;
    /// Explicit and implicit operands, in decoder order.
    fn operands(&self) -> &[Operand];
    fn registers_read(&self) -> &[Register];
    fn registers_written(&self) -> &[Register];
    /// Address expressions of memory this instruction reads.
    fn memory_reads(&self) -> &[Expression];
    /// Address expressions of memory this instruction writes.
    fn memory_writes(&self) -> &[Expression];
    /// Encoded length of this instruction in bytes.
    fn size(&self) -> usize;

    fn reads_memory(&self) -> bool {
        !self.memory_reads().is_empty()
    }

    fn writes_memory(&self) -> bool {
        !self.memory_writes().is_empty()
    }

    /// The address of the instruction immediately following this one, when
    /// this instruction is located at `address`.
    fn next_address(&self, address: u64) -> u64 {
        address.wrapping_add(self.size() as u64)
    }
}

/// An owned, decoder-independent `Instruction`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DecodedInstruction {
    operation: Operation,
    operands: Vec<Operand>,
    registers_read: Vec<Register>,
    registers_written: Vec<Register>,
    memory_reads: Vec<Expression>,
    memory_writes: Vec<Expression>,
    size: usize,
}

impl DecodedInstruction {
    /// Create a new instruction with no operands and no side effects.
    pub fn new(operation: Operation, size: usize) -> DecodedInstruction {
        DecodedInstruction {
            operation,
            operands: Vec::new(),
            registers_read: Vec::new(),
            registers_written: Vec::new(),
            memory_reads: Vec::new(),
            memory_writes: Vec::new(),
            size,
        }
    }

    /// Append an operand.
    pub fn operand(mut self, operand: Operand) -> DecodedInstruction {
        self.operands.push(operand);
        self
    }

    /// Add a register to the read set.
    pub fn read(mut self, register: Register) -> DecodedInstruction {
        self.registers_read.push(register);
        self
    }

    /// Add a register to the write set.
    pub fn write(mut self, register: Register) -> DecodedInstruction {
        self.registers_written.push(register);
        self
    }

    /// Add the address expression of a memory read.
    pub fn read_memory(mut self, address: Expression) -> DecodedInstruction {
        self.memory_reads.push(address);
        self
    }

    /// Add the address expression of a memory write.
    pub fn write_memory(mut self, address: Expression) -> DecodedInstruction {
        self.memory_writes.push(address);
        self
    }
}

impl Instruction for DecodedInstruction {
    fn operation(&self) -> &Operation {
        &self.operation
    }

    fn operands(&self) -> &[Operand] {
        &self.operands
    }

    fn registers_read(&self) -> &[Register] {
        &self.registers_read
    }

    fn registers_written(&self) -> &[Register] {
        &self.registers_written
    }

    fn memory_reads(&self) -> &[Expression] {
        &self.memory_reads
    }

    fn memory_writes(&self) -> &[Expression] {
        &self.memory_writes
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", operand)?;
            } else {
                write!(f, ", {}", operand)?;
            }
        }
        Ok(())
    }
}

#[test]
fn decoded_instruction() {
    use crate::insn;

    // mov [rbp - 8], rax
    let address = Expression::sub(insn::expr_reg("rbp", 64), insn::expr_imm(8));
    let instruction = DecodedInstruction::new(Operation::Other("mov".to_string()), 4)
        .operand(Operand::new(insn::deref(address.clone(), 64)))
        .operand(Operand::new(insn::expr_reg("rax", 64)))
        .read(insn::reg("rbp", 64))
        .read(insn::reg("rax", 64))
        .write_memory(address);

    assert!(instruction.writes_memory());
    assert!(!instruction.reads_memory());
    assert_eq!(instruction.registers_read().len(), 2);
    assert_eq!(instruction.next_address(0x1000), 0x1004);
    assert_eq!(
        format!("{}", instruction),
        "mov [(rbp:64 - 0x8)]:64, rax:64"
    );
}
