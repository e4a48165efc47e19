//! Information and types for absflow's supported architectures.

use crate::insn::Register;
use std::fmt::Debug;

/// A register name and the full-width register it aliases.
///
/// For example, `ax` is a 16-bit alias of `rax` on Amd64.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterAlias {
    name: &'static str,
    full: &'static str,
    bits: usize,
}

impl RegisterAlias {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The name of the full-width register.
    pub fn full(&self) -> &'static str {
        self.full
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn register(&self) -> Register {
        Register::new(self.name, self.bits)
    }
}

/// Every name by which the stack pointer, frame pointer and program counter
/// of an architecture may appear in decoded operands.
///
/// This is resolved once per architecture, see `Architecture::pointer_aliases`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PointerAliases {
    stack_pointer: Vec<Register>,
    frame_pointer: Vec<Register>,
    program_counter: Vec<Register>,
}

impl PointerAliases {
    pub fn new(
        stack_pointer: Vec<Register>,
        frame_pointer: Vec<Register>,
        program_counter: Vec<Register>,
    ) -> PointerAliases {
        PointerAliases {
            stack_pointer,
            frame_pointer,
            program_counter,
        }
    }

    pub fn stack_pointer(&self) -> &[Register] {
        &self.stack_pointer
    }

    pub fn frame_pointer(&self) -> &[Register] {
        &self.frame_pointer
    }

    pub fn program_counter(&self) -> &[Register] {
        &self.program_counter
    }

    pub fn is_stack_pointer(&self, register: &Register) -> bool {
        contains_name(&self.stack_pointer, register)
    }

    pub fn is_frame_pointer(&self, register: &Register) -> bool {
        contains_name(&self.frame_pointer, register)
    }

    pub fn is_program_counter(&self, register: &Register) -> bool {
        contains_name(&self.program_counter, register)
    }
}

fn contains_name(registers: &[Register], register: &Register) -> bool {
    registers.iter().any(|r| r.name() == register.name())
}

/// Necessary functions for data-flow conversion over architectures.
pub trait Architecture: Debug + Send + Sync {
    /// The name of this architecture.
    fn name(&self) -> &'static str;
    /// Get the size of a natural word for this architecture in bits.
    fn word_size(&self) -> usize;
    /// The full-width stack pointer register.
    fn stack_pointer(&self) -> Register;
    /// The full-width register conventionally used as the frame pointer.
    fn frame_pointer(&self) -> Register;
    /// The full-width program counter register.
    fn program_counter(&self) -> Register;
    /// Sub-register aliases of this architecture's registers.
    ///
    /// Registers not found in this table are their own full-width register.
    fn register_aliases(&self) -> &'static [RegisterAlias];

    /// The size of a natural word for this architecture in bytes.
    fn word_bytes(&self) -> usize {
        self.word_size() / 8
    }

    /// Normalize a register to the full-width register it aliases, so that
    /// `eax` and `rax` compare equal.
    fn full_register(&self, register: &Register) -> Register {
        self.register_aliases()
            .iter()
            .find(|alias| alias.name() == register.name())
            .map(|alias| Register::new(alias.full(), self.word_size()))
            .unwrap_or_else(|| register.clone())
    }

    /// Every name by which `full` may appear, including `full` itself.
    fn aliases(&self, full: &Register) -> Vec<Register> {
        let mut aliases = vec![full.clone()];
        aliases.extend(
            self.register_aliases()
                .iter()
                .filter(|alias| alias.full() == full.name() && alias.name() != full.name())
                .map(|alias| alias.register()),
        );
        aliases
    }

    /// Resolve the alias table for the stack pointer, frame pointer and
    /// program counter.
    fn pointer_aliases(&self) -> PointerAliases {
        PointerAliases::new(
            self.aliases(&self.stack_pointer()),
            self.aliases(&self.frame_pointer()),
            self.aliases(&self.program_counter()),
        )
    }
}

macro_rules! alias {
    ($name:expr, $full:expr, $bits:expr) => {
        RegisterAlias {
            name: $name,
            full: $full,
            bits: $bits,
        }
    };
}

#[rustfmt::skip]
const X86_ALIASES: &[RegisterAlias] = &[
    alias!("al", "eax", 8),  alias!("ah", "eax", 8),  alias!("ax", "eax", 16),
    alias!("bl", "ebx", 8),  alias!("bh", "ebx", 8),  alias!("bx", "ebx", 16),
    alias!("cl", "ecx", 8),  alias!("ch", "ecx", 8),  alias!("cx", "ecx", 16),
    alias!("dl", "edx", 8),  alias!("dh", "edx", 8),  alias!("dx", "edx", 16),
    alias!("si", "esi", 16), alias!("di", "edi", 16),
    alias!("sp", "esp", 16), alias!("bp", "ebp", 16),
    alias!("ip", "eip", 16),
];

#[rustfmt::skip]
const AMD64_ALIASES: &[RegisterAlias] = &[
    alias!("al", "rax", 8),  alias!("ah", "rax", 8),  alias!("ax", "rax", 16),  alias!("eax", "rax", 32),
    alias!("bl", "rbx", 8),  alias!("bh", "rbx", 8),  alias!("bx", "rbx", 16),  alias!("ebx", "rbx", 32),
    alias!("cl", "rcx", 8),  alias!("ch", "rcx", 8),  alias!("cx", "rcx", 16),  alias!("ecx", "rcx", 32),
    alias!("dl", "rdx", 8),  alias!("dh", "rdx", 8),  alias!("dx", "rdx", 16),  alias!("edx", "rdx", 32),
    alias!("sil", "rsi", 8), alias!("si", "rsi", 16), alias!("esi", "rsi", 32),
    alias!("dil", "rdi", 8), alias!("di", "rdi", 16), alias!("edi", "rdi", 32),
    alias!("spl", "rsp", 8), alias!("sp", "rsp", 16), alias!("esp", "rsp", 32),
    alias!("bpl", "rbp", 8), alias!("bp", "rbp", 16), alias!("ebp", "rbp", 32),
    alias!("r8b", "r8", 8),   alias!("r8w", "r8", 16),   alias!("r8d", "r8", 32),
    alias!("r9b", "r9", 8),   alias!("r9w", "r9", 16),   alias!("r9d", "r9", 32),
    alias!("r10b", "r10", 8), alias!("r10w", "r10", 16), alias!("r10d", "r10", 32),
    alias!("r11b", "r11", 8), alias!("r11w", "r11", 16), alias!("r11d", "r11", 32),
    alias!("r12b", "r12", 8), alias!("r12w", "r12", 16), alias!("r12d", "r12", 32),
    alias!("r13b", "r13", 8), alias!("r13w", "r13", 16), alias!("r13d", "r13", 32),
    alias!("r14b", "r14", 8), alias!("r14w", "r14", 16), alias!("r14d", "r14", 32),
    alias!("r15b", "r15", 8), alias!("r15w", "r15", 16), alias!("r15d", "r15", 32),
    alias!("ip", "rip", 16),  alias!("eip", "rip", 32),
];

#[rustfmt::skip]
const AARCH64_ALIASES: &[RegisterAlias] = &[
    alias!("w0", "x0", 32),   alias!("w1", "x1", 32),   alias!("w2", "x2", 32),   alias!("w3", "x3", 32),
    alias!("w4", "x4", 32),   alias!("w5", "x5", 32),   alias!("w6", "x6", 32),   alias!("w7", "x7", 32),
    alias!("w8", "x8", 32),   alias!("w9", "x9", 32),   alias!("w10", "x10", 32), alias!("w11", "x11", 32),
    alias!("w12", "x12", 32), alias!("w13", "x13", 32), alias!("w14", "x14", 32), alias!("w15", "x15", 32),
    alias!("w16", "x16", 32), alias!("w17", "x17", 32), alias!("w18", "x18", 32), alias!("w19", "x19", 32),
    alias!("w20", "x20", 32), alias!("w21", "x21", 32), alias!("w22", "x22", 32), alias!("w23", "x23", 32),
    alias!("w24", "x24", 32), alias!("w25", "x25", 32), alias!("w26", "x26", 32), alias!("w27", "x27", 32),
    alias!("w28", "x28", 32), alias!("w29", "x29", 32), alias!("w30", "x30", 32),
    alias!("fp", "x29", 64),  alias!("lr", "x30", 64),
    alias!("wsp", "sp", 32),
];

#[rustfmt::skip]
const MIPS_ALIASES: &[RegisterAlias] = &[
    alias!("$29", "$sp", 32),
    alias!("$30", "$fp", 32), alias!("$s8", "$fp", 32),
    alias!("$31", "$ra", 32),
];

/// The 64-bit X86 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Amd64 {}

impl Amd64 {
    pub fn new() -> Amd64 {
        Amd64 {}
    }
}

impl Architecture for Amd64 {
    fn name(&self) -> &'static str {
        "amd64"
    }
    fn word_size(&self) -> usize {
        64
    }
    fn stack_pointer(&self) -> Register {
        Register::new("rsp", 64)
    }
    fn frame_pointer(&self) -> Register {
        Register::new("rbp", 64)
    }
    fn program_counter(&self) -> Register {
        Register::new("rip", 64)
    }
    fn register_aliases(&self) -> &'static [RegisterAlias] {
        AMD64_ALIASES
    }
}

/// The 32-bit X86 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct X86 {}

impl X86 {
    pub fn new() -> X86 {
        X86 {}
    }
}

impl Architecture for X86 {
    fn name(&self) -> &'static str {
        "x86"
    }
    fn word_size(&self) -> usize {
        32
    }
    fn stack_pointer(&self) -> Register {
        Register::new("esp", 32)
    }
    fn frame_pointer(&self) -> Register {
        Register::new("ebp", 32)
    }
    fn program_counter(&self) -> Register {
        Register::new("eip", 32)
    }
    fn register_aliases(&self) -> &'static [RegisterAlias] {
        X86_ALIASES
    }
}

/// The 64-bit AArch64 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AArch64 {}

impl AArch64 {
    pub fn new() -> AArch64 {
        AArch64 {}
    }
}

impl Architecture for AArch64 {
    fn name(&self) -> &'static str {
        "aarch64"
    }
    fn word_size(&self) -> usize {
        64
    }
    fn stack_pointer(&self) -> Register {
        Register::new("sp", 64)
    }
    fn frame_pointer(&self) -> Register {
        Register::new("x29", 64)
    }
    fn program_counter(&self) -> Register {
        Register::new("pc", 64)
    }
    fn register_aliases(&self) -> &'static [RegisterAlias] {
        AARCH64_ALIASES
    }
}

/// The 32-bit Mips Architecture.
///
/// Endianness does not affect data-flow conversion, so this covers Mipsel as
/// well.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mips {}

impl Mips {
    pub fn new() -> Mips {
        Mips {}
    }
}

impl Architecture for Mips {
    fn name(&self) -> &'static str {
        "mips"
    }
    fn word_size(&self) -> usize {
        32
    }
    fn stack_pointer(&self) -> Register {
        Register::new("$sp", 32)
    }
    fn frame_pointer(&self) -> Register {
        Register::new("$fp", 32)
    }
    fn program_counter(&self) -> Register {
        Register::new("pc", 32)
    }
    fn register_aliases(&self) -> &'static [RegisterAlias] {
        MIPS_ALIASES
    }
}
