use crate::analysis::{
    AbsLoc, AbsRegion, Height, Region, StackHeight, StackHeightOracle, StackHeights,
};
use crate::architecture::{Amd64, X86};
use crate::function::{Function, FunctionId};
use crate::insn::{
    self, DecodedInstruction, Expression, Instruction, Operand, Operation, Register,
};
use std::cell::Cell;

mod properties;

/// An oracle which counts how often it is consulted.
struct CountingOracle {
    heights: StackHeights,
    queries: Cell<usize>,
}

impl CountingOracle {
    fn new(heights: StackHeights) -> CountingOracle {
        CountingOracle {
            heights,
            queries: Cell::new(0),
        }
    }

    fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl StackHeightOracle for CountingOracle {
    fn stack_height(&self, function: &Function, address: u64) -> StackHeight {
        self.queries.set(self.queries.get() + 1);
        self.heights.stack_height(function, address)
    }

    fn frame_height(&self, function: &Function, address: u64) -> StackHeight {
        self.queries.set(self.queries.get() + 1);
        self.heights.frame_height(function, address)
    }
}

/// An instruction which counts how often the decoder is asked about it.
struct CountingInstruction {
    instruction: DecodedInstruction,
    calls: Cell<usize>,
}

impl CountingInstruction {
    fn new(instruction: DecodedInstruction) -> CountingInstruction {
        CountingInstruction {
            instruction,
            calls: Cell::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.get()
    }

    fn count(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl Instruction for CountingInstruction {
    fn operation(&self) -> &Operation {
        self.count();
        self.instruction.operation()
    }

    fn operands(&self) -> &[Operand] {
        self.count();
        self.instruction.operands()
    }

    fn registers_read(&self) -> &[Register] {
        self.count();
        self.instruction.registers_read()
    }

    fn registers_written(&self) -> &[Register] {
        self.count();
        self.instruction.registers_written()
    }

    fn memory_reads(&self) -> &[Expression] {
        self.count();
        self.instruction.memory_reads()
    }

    fn memory_writes(&self) -> &[Expression] {
        self.count();
        self.instruction.memory_writes()
    }

    fn size(&self) -> usize {
        self.count();
        self.instruction.size()
    }
}

const ENTRY: u64 = 0x401000;

fn amd64_function() -> Function {
    let mut function = Function::new(FunctionId::new(1), ENTRY, Amd64::new());
    function.set_name(Some("main".to_string()));
    function
}

fn x86_function() -> Function {
    Function::new(FunctionId::new(2), ENTRY, X86::new())
}

/// Heights for a single address in `function`.
fn heights_at(
    function: &Function,
    address: u64,
    stack: StackHeight,
    frame: StackHeight,
) -> StackHeights {
    let mut heights = StackHeights::new();
    heights.set_stack(function.id(), address, stack);
    heights.set_frame(function.id(), address, frame);
    heights
}

fn value(height: i64, region: u64) -> StackHeight {
    StackHeight::Value(Height::new(height, region))
}

fn register(name: &str, bits: usize) -> AbsRegion {
    AbsRegion::new(AbsLoc::Register(insn::reg(name, bits)))
}

fn stack_slot(function: &Function, height: i64, region: u64) -> AbsRegion {
    AbsRegion::new(AbsLoc::StackSlot {
        height,
        region: Region::new(region),
        function: function.id(),
    })
}

fn frame_slot(function: &Function, height: i64, region: u64) -> AbsRegion {
    AbsRegion::new(AbsLoc::FrameSlot {
        height,
        region: Region::new(region),
        function: function.id(),
    })
}

fn amd64_pc() -> AbsRegion {
    AbsRegion::new(AbsLoc::ProgramCounter(insn::reg("rip", 64)))
}

// push <operand>, as reported by an x86 decoder
fn push(operand: Expression, stack_pointer: &str, bits: usize) -> DecodedInstruction {
    DecodedInstruction::new(Operation::Push, 1)
        .operand(Operand::new(operand))
        .operand(Operand::implicit(insn::expr_reg(stack_pointer, bits)))
}

// pop <operand>
fn pop(operand: Expression) -> DecodedInstruction {
    DecodedInstruction::new(Operation::Pop, 1)
        .operand(Operand::new(operand))
        .operand(Operand::implicit(insn::expr_reg("rsp", 64)))
}

fn other(mnemonic: &str, size: usize) -> DecodedInstruction {
    DecodedInstruction::new(Operation::Other(mnemonic.to_string()), size)
}
