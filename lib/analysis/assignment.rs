//! Decompose instructions into abstract assignments.
//!
//! Each `Assignment` is one data-flow write: a single output region and the
//! ordered regions whose values flow into it. Instructions which touch the
//! stack or the program counter implicitly get dedicated handling. All other
//! instructions are treated as "every output depends on every input".
//!
//! Flags are ordinary registers here. A flag written by an instruction
//! depends on the instruction's inputs, never on its other outputs.

use crate::analysis::{AbsRegion, ConversionCache, RegionConverter, StackHeightOracle};
use crate::function::{Function, FunctionId};
use crate::insn::{Expression, Instruction, Operand, Operation};
use crate::{Error, Options, RC};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One output region of an instruction, and the regions it is computed from.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Assignment {
    operation: Operation,
    address: u64,
    function: FunctionId,
    output: AbsRegion,
    inputs: Vec<AbsRegion>,
}

impl Assignment {
    pub(crate) fn new(
        operation: Operation,
        address: u64,
        function: FunctionId,
        output: AbsRegion,
    ) -> Assignment {
        Assignment {
            operation,
            address,
            function,
            output,
            inputs: Vec::new(),
        }
    }

    pub(crate) fn add_input(&mut self, input: AbsRegion) {
        self.inputs.push(input);
    }

    pub(crate) fn add_inputs(&mut self, inputs: &[AbsRegion]) {
        self.inputs.extend_from_slice(inputs);
    }

    /// The operation of the instruction this assignment came from.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The address of the instruction this assignment came from.
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn function(&self) -> FunctionId {
        self.function
    }

    pub fn output(&self) -> &AbsRegion {
        &self.output
    }

    pub fn inputs(&self) -> &[AbsRegion] {
        &self.inputs
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:X} {}: {} <- [",
            self.address, self.operation, self.output
        )?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", input)?;
        }
        write!(f, "]")
    }
}

/// Builds the assignments of instructions.
///
/// A converter owns its caches. It is not meant to be shared between
/// threads: analyze functions in parallel with one converter each.
pub struct AssignmentConverter<'o> {
    regions: RegionConverter<'o>,
    cache: ConversionCache<Vec<RC<Assignment>>>,
    options: Options,
}

impl<'o> AssignmentConverter<'o> {
    pub fn new(oracle: &'o dyn StackHeightOracle, options: Options) -> AssignmentConverter<'o> {
        AssignmentConverter {
            regions: RegionConverter::new(oracle, options.clone()),
            cache: ConversionCache::new(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The region converter used to resolve operands.
    pub fn region_converter(&self) -> &RegionConverter<'o> {
        &self.regions
    }

    pub fn region_converter_mut(&mut self) -> &mut RegionConverter<'o> {
        &mut self.regions
    }

    /// Cached assignment lists, keyed by function and address.
    pub fn cache(&self) -> &ConversionCache<Vec<RC<Assignment>>> {
        &self.cache
    }

    /// Produce every assignment induced by `instruction`, located at
    /// `address` in `function`.
    ///
    /// With caching enabled, converting the same function and address again
    /// returns the stored assignments without consulting the instruction or
    /// the stack height oracle.
    pub fn convert(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<RC<Assignment>>, Error> {
        if self.options.cache() {
            if let Some(assignments) = self.cache.get(function.id(), address) {
                trace!("assignment cache hit for {}:0x{:x}", function.id(), address);
                return Ok(assignments.clone());
            }
        }

        let assignments = match instruction.operation() {
            Operation::Push => self.push(instruction, address, function)?,
            Operation::Call => self.call(instruction, address, function)?,
            Operation::Pop => self.pop(instruction, address, function)?,
            Operation::Leave => self.leave(instruction, address, function)?,
            Operation::ReturnNear | Operation::ReturnFar => {
                self.ret(instruction, address, function)?
            }
            Operation::Exchange => self.exchange(instruction, address, function)?,
            Operation::Other(_) => self.default(instruction, address, function)?,
        };

        for assignment in &assignments {
            trace!("{}", assignment);
        }

        let assignments: Vec<RC<Assignment>> = assignments.into_iter().map(RC::new).collect();

        if self.options.cache() {
            self.cache.insert(function.id(), address, assignments.clone());
        }

        Ok(assignments)
    }

    // sp = sp - word; [sp] = operand
    fn push(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        // The pushed value, then the implicit stack pointer.
        let operands = expect_stack_operands(instruction, address, function)?;
        // Registers, immediates (which have no regions) and memory may be
        // pushed.
        let pushed = self
            .regions
            .convert_operand(operands[0].value(), address, function)?;
        self.push_equivalent(instruction.operation(), address, function, &pushed)
    }

    // A push of the program counter, followed by a redefinition of it.
    fn call(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        let operation = instruction.operation();
        let pc = self.regions.program_counter(function);

        let mut assignments =
            self.push_equivalent(operation, address, function, &[pc.clone()])?;

        let (used, _) = self
            .regions
            .convert_instruction(instruction, address, function)?;

        let mut pc_assignment = Assignment::new(operation.clone(), address, function.id(), pc);
        if used.is_empty() {
            // Direct call
            pc_assignment.add_input(self.regions.program_counter(function));
        } else {
            pc_assignment.add_inputs(&used);
        }
        assignments.push(pc_assignment);

        Ok(assignments)
    }

    // operand = [sp]; sp = sp + word
    fn pop(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        // The destination, then the implicit stack pointer.
        let operands = expect_stack_operands(instruction, address, function)?;
        let destination = self
            .regions
            .convert_operand(operands[0].value(), address, function)?;
        if destination.is_empty() {
            return Err(Error::MissingRegion {
                operation: instruction.operation().to_string(),
                address,
                operand: 0,
            });
        }
        self.pop_equivalent(instruction.operation(), address, function, &destination)
    }

    // pc = [sp]; sp = sp + word
    fn ret(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        let operation = instruction.operation();
        let sp = self.regions.stack_pointer(function);

        let mut pc_assignment = Assignment::new(
            operation.clone(),
            address,
            function.id(),
            self.regions.program_counter(function),
        );
        pc_assignment.add_input(self.regions.stack_top(address, function, false)?);

        let mut sp_assignment =
            Assignment::new(operation.clone(), address, function.id(), sp.clone());
        sp_assignment.add_input(sp);

        Ok(vec![pc_assignment, sp_assignment])
    }

    // sp = fp; fp = [fp]
    //
    // The saved frame pointer is read through the frame pointer's value
    // before this instruction. No ordering between the two assignments is
    // expressed.
    fn leave(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        let operation = instruction.operation();
        let sp = self.regions.stack_pointer(function);
        let fp = self.regions.frame_pointer(function);

        let mut sp_assignment = Assignment::new(operation.clone(), address, function.id(), sp);
        sp_assignment.add_input(fp.clone());

        let mut fp_assignment = Assignment::new(operation.clone(), address, function.id(), fp);
        fp_assignment.add_input(self.regions.frame_top(address, function, false)?);

        Ok(vec![sp_assignment, fp_assignment])
    }

    // Each operand is defined by the other operand's old value.
    fn exchange(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        let operation = instruction.operation();
        let operands = expect_operands(instruction, address, 2)?;

        let mut resolved = Vec::with_capacity(2);
        for (i, operand) in operands.iter().enumerate() {
            let regions = self
                .regions
                .convert_operand(operand.value(), address, function)?;
            if regions.is_empty() {
                return Err(Error::MissingRegion {
                    operation: operation.to_string(),
                    address,
                    operand: i,
                });
            }
            resolved.push(regions);
        }

        // A memory operand resolves to its memory region first, then the
        // registers used to address it.
        let mut a = Assignment::new(
            operation.clone(),
            address,
            function.id(),
            resolved[0][0].clone(),
        );
        a.add_inputs(&resolved[1]);

        let mut b = Assignment::new(
            operation.clone(),
            address,
            function.id(),
            resolved[1][0].clone(),
        );
        b.add_inputs(&resolved[0]);

        Ok(vec![a, b])
    }

    // Every defined region depends on every used region.
    fn default(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<Vec<Assignment>, Error> {
        let operation = instruction.operation();
        let (used, defined) = self
            .regions
            .convert_instruction(instruction, address, function)?;

        Ok(defined
            .into_iter()
            .map(|output| {
                let mut assignment =
                    Assignment::new(operation.clone(), address, function.id(), output);
                assignment.add_inputs(&used);
                assignment
            })
            .collect())
    }

    fn push_equivalent(
        &self,
        operation: &Operation,
        address: u64,
        function: &Function,
        operands: &[AbsRegion],
    ) -> Result<Vec<Assignment>, Error> {
        let stack_top = self.regions.stack_top(address, function, true)?;
        let sp = self.regions.stack_pointer(function);

        let mut top_assignment =
            Assignment::new(operation.clone(), address, function.id(), stack_top);
        top_assignment.add_inputs(operands);
        top_assignment.add_input(sp.clone());

        // The new stack pointer does not depend on the pushed value.
        let mut sp_assignment =
            Assignment::new(operation.clone(), address, function.id(), sp.clone());
        sp_assignment.add_input(sp);

        Ok(vec![top_assignment, sp_assignment])
    }

    fn pop_equivalent(
        &self,
        operation: &Operation,
        address: u64,
        function: &Function,
        operands: &[AbsRegion],
    ) -> Result<Vec<Assignment>, Error> {
        let stack_top = self.regions.stack_top(address, function, false)?;
        let sp = self.regions.stack_pointer(function);

        let mut destination_assignment =
            Assignment::new(operation.clone(), address, function.id(), operands[0].clone());
        destination_assignment.add_input(stack_top);
        destination_assignment.add_input(sp.clone());
        // Registers used to address a memory destination.
        destination_assignment.add_inputs(&operands[1..]);

        let mut sp_assignment =
            Assignment::new(operation.clone(), address, function.id(), sp.clone());
        sp_assignment.add_input(sp);

        Ok(vec![destination_assignment, sp_assignment])
    }
}

fn expect_operands<'i>(
    instruction: &'i dyn Instruction,
    address: u64,
    expected: usize,
) -> Result<&'i [Operand], Error> {
    let operands = instruction.operands();
    if operands.len() != expected {
        return Err(Error::OperandCount {
            operation: instruction.operation().to_string(),
            address,
            expected,
            found: operands.len(),
        });
    }
    Ok(operands)
}

// One explicit operand, followed by the implicit stack pointer.
fn expect_stack_operands<'i>(
    instruction: &'i dyn Instruction,
    address: u64,
    function: &Function,
) -> Result<&'i [Operand], Error> {
    let operands = expect_operands(instruction, address, 2)?;

    let malformed = |operand, reason| Error::OperandShape {
        operation: instruction.operation().to_string(),
        address,
        operand,
        reason,
    };

    if operands[0].is_implicit() {
        return Err(malformed(0, "expected an explicit operand"));
    }
    if !operands[1].is_implicit() {
        return Err(malformed(1, "expected the implicit stack pointer"));
    }
    match operands[1].value() {
        Expression::Register(register)
            if function.pointer_aliases().is_stack_pointer(register) => {}
        _ => return Err(malformed(1, "expected the stack pointer")),
    }

    Ok(operands)
}
