//! Abstract locations.
//!
//! An `AbsLoc` names one piece of storage an instruction may read or write.
//! Precise locations (a register, a stack or frame slot, an absolute memory
//! cell, the program counter) are distinguished from the generic fallbacks
//! used when an address could not be resolved, so that later passes never
//! assume two unresolved accesses are disjoint.

use crate::analysis::Region;
use crate::function::FunctionId;
use crate::insn::Register;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical identity of an abstract storage location.
///
/// Stack and frame slot heights are displacements from the stack pointer's
/// value at function entry. Slots are only meaningful within the function and
/// region they were resolved in.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AbsLoc {
    /// A full-width architecture register.
    Register(Register),
    /// A stack slot addressed relative to the stack pointer.
    StackSlot {
        height: i64,
        region: Region,
        function: FunctionId,
    },
    /// A stack slot addressed relative to the frame pointer.
    FrameSlot {
        height: i64,
        region: Region,
        function: FunctionId,
    },
    /// Some location on the stack, displacement unknown.
    GenericStack,
    /// Some location off the stack, address unknown.
    GenericHeap,
    /// A statically known absolute address.
    Memory(u64),
    /// The program counter, identified by the full-width program counter
    /// register of its architecture.
    ProgramCounter(Register),
}

impl AbsLoc {
    pub fn register(&self) -> Option<&Register> {
        match self {
            AbsLoc::Register(register) | AbsLoc::ProgramCounter(register) => Some(register),
            _ => None,
        }
    }

    /// The height of a stack or frame slot.
    pub fn height(&self) -> Option<i64> {
        match self {
            AbsLoc::StackSlot { height, .. } | AbsLoc::FrameSlot { height, .. } => Some(*height),
            _ => None,
        }
    }

    /// The function a stack or frame slot belongs to.
    pub fn function(&self) -> Option<FunctionId> {
        match self {
            AbsLoc::StackSlot { function, .. } | AbsLoc::FrameSlot { function, .. } => {
                Some(*function)
            }
            _ => None,
        }
    }

    /// True for the fallbacks `GenericStack` and `GenericHeap`.
    pub fn is_generic(&self) -> bool {
        matches!(self, AbsLoc::GenericStack | AbsLoc::GenericHeap)
    }

    /// True if this location names exactly one piece of storage.
    pub fn is_precise(&self) -> bool {
        !self.is_generic()
    }

    /// True for any location on the stack, precise or not.
    pub fn is_stack(&self) -> bool {
        matches!(
            self,
            AbsLoc::StackSlot { .. } | AbsLoc::FrameSlot { .. } | AbsLoc::GenericStack
        )
    }

    /// True for any memory location, including the stack.
    pub fn is_memory(&self) -> bool {
        self.is_stack() || matches!(self, AbsLoc::GenericHeap | AbsLoc::Memory(_))
    }
}

impl fmt::Display for AbsLoc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AbsLoc::Register(register) => write!(f, "{}", register.name()),
            AbsLoc::StackSlot {
                height,
                region,
                function,
            } => write!(f, "stack[{}]@{}:{}", height, region, function),
            AbsLoc::FrameSlot {
                height,
                region,
                function,
            } => write!(f, "frame[{}]@{}:{}", height, region, function),
            AbsLoc::GenericStack => write!(f, "stack[*]"),
            AbsLoc::GenericHeap => write!(f, "heap[*]"),
            AbsLoc::Memory(address) => write!(f, "mem[0x{:x}]", address),
            AbsLoc::ProgramCounter(register) => write!(f, "pc({})", register.name()),
        }
    }
}

/// The node identity used in assignments. Wraps exactly one `AbsLoc`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AbsRegion {
    absloc: AbsLoc,
}

impl AbsRegion {
    pub fn new(absloc: AbsLoc) -> AbsRegion {
        AbsRegion { absloc }
    }

    pub fn absloc(&self) -> &AbsLoc {
        &self.absloc
    }

    /// Returns true if the storage named by `self` and `other` may overlap.
    ///
    /// A generic stack location overlaps every stack location, and the generic
    /// heap overlaps every absolute memory cell. Stack and frame slots share a
    /// coordinate system, so a stack slot overlaps the frame slot at the same
    /// height, region and function.
    pub fn overlaps(&self, other: &AbsRegion) -> bool {
        match (&self.absloc, &other.absloc) {
            (lhs, rhs) if lhs == rhs => true,
            (AbsLoc::GenericStack, rhs) => rhs.is_stack(),
            (lhs, AbsLoc::GenericStack) => lhs.is_stack(),
            (AbsLoc::GenericHeap, AbsLoc::Memory(_)) | (AbsLoc::Memory(_), AbsLoc::GenericHeap) => {
                true
            }
            (
                AbsLoc::StackSlot {
                    height,
                    region,
                    function,
                },
                AbsLoc::FrameSlot {
                    height: rhs_height,
                    region: rhs_region,
                    function: rhs_function,
                },
            )
            | (
                AbsLoc::FrameSlot {
                    height,
                    region,
                    function,
                },
                AbsLoc::StackSlot {
                    height: rhs_height,
                    region: rhs_region,
                    function: rhs_function,
                },
            ) => height == rhs_height && region == rhs_region && function == rhs_function,
            _ => false,
        }
    }
}

impl From<AbsLoc> for AbsRegion {
    fn from(absloc: AbsLoc) -> AbsRegion {
        AbsRegion::new(absloc)
    }
}

impl fmt::Display for AbsRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.absloc.fmt(f)
    }
}
