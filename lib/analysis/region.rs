//! Resolve registers and address expressions to abstract regions.
//!
//! Memory accesses are classified as one of:
//!
//! * Frame: the address is computed from the frame pointer. If the frame
//! pointer's height is known, and the address evaluates, this is a specific
//! frame slot. Otherwise it is some location on the stack.
//! * Stack: the same, computed from the stack pointer.
//! * Memory: the address evaluates to a constant without touching the stack
//! or frame pointer.
//! * Heap: everything else.

use crate::analysis::{
    AbsLoc, AbsRegion, ConversionCache, Height, StackHeight, StackHeightOracle,
};
use crate::function::Function;
use crate::insn::{self, Bindings, Expression, Instruction, Register};
use crate::{Error, Options};

/// Converts registers, operand expressions and instructions into
/// `AbsRegion`s.
pub struct RegionConverter<'o> {
    oracle: &'o dyn StackHeightOracle,
    options: Options,
    used_cache: ConversionCache<Vec<AbsRegion>>,
    defined_cache: ConversionCache<Vec<AbsRegion>>,
}

impl<'o> RegionConverter<'o> {
    pub fn new(oracle: &'o dyn StackHeightOracle, options: Options) -> RegionConverter<'o> {
        RegionConverter {
            oracle,
            options,
            used_cache: ConversionCache::new(),
            defined_cache: ConversionCache::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Cached used regions, keyed by function and address.
    pub fn used_cache(&self) -> &ConversionCache<Vec<AbsRegion>> {
        &self.used_cache
    }

    /// Cached defined regions, keyed by function and address.
    pub fn defined_cache(&self) -> &ConversionCache<Vec<AbsRegion>> {
        &self.defined_cache
    }

    /// The region of the full-width stack pointer of `function`.
    pub fn stack_pointer(&self, function: &Function) -> AbsRegion {
        AbsRegion::new(AbsLoc::Register(
            function.architecture().stack_pointer(),
        ))
    }

    /// The region of the full-width frame pointer of `function`.
    pub fn frame_pointer(&self, function: &Function) -> AbsRegion {
        AbsRegion::new(AbsLoc::Register(
            function.architecture().frame_pointer(),
        ))
    }

    /// The region of the program counter of `function`.
    pub fn program_counter(&self, function: &Function) -> AbsRegion {
        AbsRegion::new(AbsLoc::ProgramCounter(
            function.architecture().program_counter(),
        ))
    }

    /// Classify a bare register.
    ///
    /// Sub-registers are widened to their full-width register. Every alias of
    /// the program counter becomes the program counter. No stack height is
    /// required.
    pub fn classify_register(&self, register: &Register, function: &Function) -> AbsRegion {
        if function.pointer_aliases().is_program_counter(register) {
            self.program_counter(function)
        } else {
            AbsRegion::new(AbsLoc::Register(
                function.architecture().full_register(register),
            ))
        }
    }

    /// Classify the memory location addressed by `expression`, for the
    /// instruction at `address`.
    ///
    /// `expression` is the address being accessed, not the dereference. Frame
    /// pointer relative addresses take precedence over stack pointer relative
    /// ones. Addresses which cannot be resolved degrade to `GenericStack` or
    /// `GenericHeap`.
    pub fn classify(
        &self,
        expression: &Expression,
        address: u64,
        function: &Function,
    ) -> Result<AbsRegion, Error> {
        let stack = self.stack_height(function, address)?;
        let frame = self.frame_height(function, address)?;

        let aliases = function.pointer_aliases();
        let registers = expression.registers();
        let is_stack = registers.iter().any(|r| aliases.is_stack_pointer(r));
        let is_frame = registers.iter().any(|r| aliases.is_frame_pointer(r));

        let mut bindings = Bindings::new();
        if let Some(stack) = stack {
            bindings.bind_all(aliases.stack_pointer(), stack.height());
        }
        if let Some(frame) = frame {
            bindings.bind_all(aliases.frame_pointer(), frame.height());
        }
        bindings.bind_all(aliases.program_counter(), address as i64);

        let bits = function.architecture().word_size();

        let absloc = if is_frame {
            match (insn::evaluate(expression, &bindings, bits), frame) {
                (Some(height), Some(frame)) => AbsLoc::FrameSlot {
                    height,
                    region: frame.region(),
                    function: function.id(),
                },
                _ => {
                    debug!(
                        "unresolved frame access {} at 0x{:x} in {}",
                        expression,
                        address,
                        function.name()
                    );
                    AbsLoc::GenericStack
                }
            }
        } else if is_stack {
            match (insn::evaluate(expression, &bindings, bits), stack) {
                (Some(height), Some(stack)) => AbsLoc::StackSlot {
                    height,
                    region: stack.region(),
                    function: function.id(),
                },
                _ => {
                    debug!(
                        "unresolved stack access {} at 0x{:x} in {}",
                        expression,
                        address,
                        function.name()
                    );
                    AbsLoc::GenericStack
                }
            }
        } else {
            match insn::evaluate_address(expression, &bindings, bits) {
                Some(value) => AbsLoc::Memory(value),
                None => AbsLoc::GenericHeap,
            }
        };

        trace!(
            "classified {} at 0x{:x} in {} as {}",
            expression,
            address,
            function.name(),
            absloc
        );

        Ok(AbsRegion::new(absloc))
    }

    /// Convert one operand expression into every region it touches.
    ///
    /// A dereference yields the region of the memory accessed first. Then
    /// every register appearing anywhere in the operand yields its own
    /// register region, as the instruction reads it to compute the address.
    /// Immediates yield nothing.
    pub fn convert_operand(
        &self,
        expression: &Expression,
        address: u64,
        function: &Function,
    ) -> Result<Vec<AbsRegion>, Error> {
        let mut regions = Vec::new();

        if let Some(dereferenced) = expression.dereferenced() {
            regions.push(self.classify(dereferenced, address, function)?);
        }

        for register in expression.registers() {
            let region = self.classify_register(register, function);
            if !regions.contains(&region) {
                regions.push(region);
            }
        }

        Ok(regions)
    }

    /// Convert the read and write sets of `instruction` into the regions it
    /// uses and the regions it defines, in that order.
    pub fn convert_instruction(
        &mut self,
        instruction: &dyn Instruction,
        address: u64,
        function: &Function,
    ) -> Result<(Vec<AbsRegion>, Vec<AbsRegion>), Error> {
        let cached_used = self.cached(&self.used_cache, function, address);
        let cached_defined = self.cached(&self.defined_cache, function, address);

        let used = match cached_used {
            Some(used) => used,
            None => {
                let mut used = Vec::new();
                for register in instruction.registers_read() {
                    used.push(self.classify_register(register, function));
                }
                for memory in instruction.memory_reads() {
                    used.push(self.classify(memory, address, function)?);
                }
                used
            }
        };

        let defined = match cached_defined {
            Some(defined) => defined,
            None => {
                let mut defined = Vec::new();
                for register in instruction.registers_written() {
                    defined.push(self.classify_register(register, function));
                }
                for memory in instruction.memory_writes() {
                    defined.push(self.classify(memory, address, function)?);
                }
                defined
            }
        };

        if self.options.cache() {
            if !self.used_cache.contains(function.id(), address) {
                self.used_cache.insert(function.id(), address, used.clone());
            }
            if !self.defined_cache.contains(function.id(), address) {
                self.defined_cache
                    .insert(function.id(), address, defined.clone());
            }
        }

        Ok((used, defined))
    }

    /// The stack slot at the top of the stack at `address`.
    ///
    /// When `push` is set the slot is one word below the current stack
    /// pointer, where a push writes. Returns `GenericStack` if there is no
    /// stack height at this location.
    pub fn stack_top(
        &self,
        address: u64,
        function: &Function,
        push: bool,
    ) -> Result<AbsRegion, Error> {
        Ok(AbsRegion::new(match self.stack_height(function, address)? {
            Some(stack) => AbsLoc::StackSlot {
                height: top(stack, function, push),
                region: stack.region(),
                function: function.id(),
            },
            None => AbsLoc::GenericStack,
        }))
    }

    /// The frame slot the frame pointer points to at `address`.
    ///
    /// When `push` is set the slot is one word below the frame pointer.
    /// Returns `GenericHeap` if there is no frame height at this location.
    pub fn frame_top(
        &self,
        address: u64,
        function: &Function,
        push: bool,
    ) -> Result<AbsRegion, Error> {
        Ok(AbsRegion::new(match self.frame_height(function, address)? {
            Some(frame) => AbsLoc::FrameSlot {
                height: top(frame, function, push),
                region: frame.region(),
                function: function.id(),
            },
            None => AbsLoc::GenericHeap,
        }))
    }

    fn cached(
        &self,
        cache: &ConversionCache<Vec<AbsRegion>>,
        function: &Function,
        address: u64,
    ) -> Option<Vec<AbsRegion>> {
        if !self.options.cache() {
            return None;
        }
        let regions = cache.get(function.id(), address)?;
        trace!("region cache hit for {}:0x{:x}", function.id(), address);
        Some(regions.clone())
    }

    fn stack_height(&self, function: &Function, address: u64) -> Result<Option<Height>, Error> {
        known_height(
            self.oracle.stack_height(function, address),
            "stack pointer",
            function,
            address,
        )
    }

    fn frame_height(&self, function: &Function, address: u64) -> Result<Option<Height>, Error> {
        known_height(
            self.oracle.frame_height(function, address),
            "frame pointer",
            function,
            address,
        )
    }
}

fn top(height: Height, function: &Function, push: bool) -> i64 {
    if push {
        height.height().wrapping_sub(function.word_bytes() as i64)
    } else {
        height.height()
    }
}

fn known_height(
    height: StackHeight,
    domain: &'static str,
    function: &Function,
    address: u64,
) -> Result<Option<Height>, Error> {
    match height {
        StackHeight::Value(height) => Ok(Some(height)),
        StackHeight::Bottom => Ok(None),
        StackHeight::Unanalyzed => Err(Error::Unanalyzed {
            domain,
            function: function.name(),
            address,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Region, StackHeights};
    use crate::architecture::{Amd64, X86};
    use crate::function::FunctionId;

    fn amd64_function() -> Function {
        Function::new(FunctionId::new(0), 0x1000, Amd64::new())
    }

    fn heights(function: &Function, stack: StackHeight, frame: StackHeight) -> StackHeights {
        let mut heights = StackHeights::new();
        heights.set_stack(function.id(), 0x1000, stack);
        heights.set_frame(function.id(), 0x1000, frame);
        heights
    }

    fn rsp_plus(offset: i64) -> Expression {
        Expression::add(insn::expr_reg("rsp", 64), insn::expr_imm(offset))
    }

    #[test]
    fn classify_register_widens() {
        let function = amd64_function();
        let heights = StackHeights::new();
        let converter = RegionConverter::new(&heights, Options::new());

        assert_eq!(
            converter.classify_register(&insn::reg("eax", 32), &function),
            converter.classify_register(&insn::reg("rax", 64), &function)
        );
        assert_eq!(
            converter.classify_register(&insn::reg("sp", 16), &function),
            converter.stack_pointer(&function)
        );
        assert_eq!(
            converter.classify_register(&insn::reg("rip", 64), &function),
            converter.program_counter(&function)
        );
    }

    #[test]
    fn classify_stack_slot() {
        let function = amd64_function();
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(-16, 1)),
            StackHeight::Bottom,
        );
        let converter = RegionConverter::new(&heights, Options::new());

        let region = converter.classify(&rsp_plus(8), 0x1000, &function).unwrap();
        assert_eq!(
            region.absloc(),
            &AbsLoc::StackSlot {
                height: -8,
                region: Region::new(1),
                function: function.id(),
            }
        );

        // esp is an alias of the stack pointer as well
        let esp = Expression::sub(insn::expr_reg("esp", 32), insn::expr_imm(8));
        let region = converter.classify(&esp, 0x1000, &function).unwrap();
        assert_eq!(region.absloc().height(), Some(-24));
    }

    #[test]
    fn classify_frame_before_stack() {
        let function = amd64_function();
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(-32, 1)),
            StackHeight::Value(Height::new(-16, 1)),
        );
        let converter = RegionConverter::new(&heights, Options::new());

        // [rbp - 8]
        let expression = Expression::sub(insn::expr_reg("rbp", 64), insn::expr_imm(8));
        let region = converter.classify(&expression, 0x1000, &function).unwrap();
        assert_eq!(
            region.absloc(),
            &AbsLoc::FrameSlot {
                height: -24,
                region: Region::new(1),
                function: function.id(),
            }
        );

        // [rbp + rsp] mentions both, the frame wins
        let expression = Expression::add(insn::expr_reg("rbp", 64), insn::expr_reg("rsp", 64));
        let region = converter.classify(&expression, 0x1000, &function).unwrap();
        assert!(matches!(region.absloc(), AbsLoc::FrameSlot { height: -48, .. }));
    }

    #[test]
    fn classify_unresolved_frame_is_generic_stack() {
        let function = amd64_function();
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(-32, 1)),
            StackHeight::Bottom,
        );
        let converter = RegionConverter::new(&heights, Options::new());

        let expression = Expression::sub(insn::expr_reg("rbp", 64), insn::expr_imm(8));
        let region = converter.classify(&expression, 0x1000, &function).unwrap();
        assert_eq!(region.absloc(), &AbsLoc::GenericStack);

        // [rsp + rax * 8] cannot be evaluated
        let expression = Expression::add(
            insn::expr_reg("rsp", 64),
            Expression::mul(insn::expr_reg("rax", 64), insn::expr_imm(8)),
        );
        let region = converter.classify(&expression, 0x1000, &function).unwrap();
        assert_eq!(region.absloc(), &AbsLoc::GenericStack);
    }

    #[test]
    fn classify_memory_and_heap() {
        let function = amd64_function();
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(0, 1)),
            StackHeight::Bottom,
        );
        let converter = RegionConverter::new(&heights, Options::new());

        let region = converter
            .classify(&insn::expr_imm(0x601040), 0x1000, &function)
            .unwrap();
        assert_eq!(region.absloc(), &AbsLoc::Memory(0x601040));

        // rip relative addressing binds the instruction's address
        let expression = Expression::add(insn::expr_reg("rip", 64), insn::expr_imm(0x200));
        let region = converter.classify(&expression, 0x1000, &function).unwrap();
        assert_eq!(region.absloc(), &AbsLoc::Memory(0x1200));

        let expression = Expression::add(insn::expr_reg("rdi", 64), insn::expr_imm(0x10));
        let region = converter.classify(&expression, 0x1000, &function).unwrap();
        assert_eq!(region.absloc(), &AbsLoc::GenericHeap);
    }

    #[test]
    fn classify_unanalyzed_is_error() {
        let function = amd64_function();
        let heights = StackHeights::new();
        let converter = RegionConverter::new(&heights, Options::new());

        match converter.classify(&rsp_plus(8), 0x1000, &function) {
            Err(Error::Unanalyzed { domain, address, .. }) => {
                assert_eq!(domain, "stack pointer");
                assert_eq!(address, 0x1000);
            }
            other => panic!("expected Unanalyzed, got {:?}", other),
        }
    }

    #[test]
    fn convert_operand_dereference() {
        let function = amd64_function();
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(-16, 1)),
            StackHeight::Bottom,
        );
        let converter = RegionConverter::new(&heights, Options::new());

        // [rsp + 8]
        let regions = converter
            .convert_operand(&insn::deref(rsp_plus(8), 64), 0x1000, &function)
            .unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].absloc().height(), Some(-8));
        assert_eq!(regions[1], converter.stack_pointer(&function));

        // eax
        let regions = converter
            .convert_operand(&insn::expr_reg("eax", 32), 0x1000, &function)
            .unwrap();
        assert_eq!(regions, vec![AbsRegion::new(AbsLoc::Register(insn::reg("rax", 64)))]);

        // immediates touch nothing
        let regions = converter
            .convert_operand(&insn::expr_imm(4), 0x1000, &function)
            .unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn stack_and_frame_top() {
        let function = Function::new(FunctionId::new(7), 0x1000, X86::new());
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(-12, 2)),
            StackHeight::Value(Height::new(-8, 2)),
        );
        let converter = RegionConverter::new(&heights, Options::new());

        let push = converter.stack_top(0x1000, &function, true).unwrap();
        assert_eq!(push.absloc().height(), Some(-16));
        let pop = converter.stack_top(0x1000, &function, false).unwrap();
        assert_eq!(pop.absloc().height(), Some(-12));

        let frame = converter.frame_top(0x1000, &function, false).unwrap();
        assert!(matches!(frame.absloc(), AbsLoc::FrameSlot { height: -8, .. }));
        let frame = converter.frame_top(0x1000, &function, true).unwrap();
        assert_eq!(frame.absloc().height(), Some(-12));

        let bottom = heights_bottom(&function);
        let converter = RegionConverter::new(&bottom, Options::new());
        assert_eq!(
            converter.stack_top(0x1000, &function, true).unwrap().absloc(),
            &AbsLoc::GenericStack
        );
        assert_eq!(
            converter.frame_top(0x1000, &function, false).unwrap().absloc(),
            &AbsLoc::GenericHeap
        );
    }

    #[test]
    fn stack_top_wraps() {
        let function = amd64_function();
        let heights = heights(
            &function,
            StackHeight::Value(Height::new(i64::MIN, 1)),
            StackHeight::Bottom,
        );
        let converter = RegionConverter::new(&heights, Options::new());

        let push = converter.stack_top(0x1000, &function, true).unwrap();
        assert_eq!(push.absloc().height(), Some(i64::MAX - 7));
    }

    fn heights_bottom(function: &Function) -> StackHeights {
        heights(function, StackHeight::Bottom, StackHeight::Bottom)
    }
}
