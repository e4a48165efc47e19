//! The function model absflow needs from a control-flow recovery.
//!
//! A `Function` supplies an identity for keying caches and scoping stack
//! slots, and the architecture whose stack pointer, frame pointer and program
//! counter get special treatment.

use crate::architecture::{Architecture, PointerAliases};
use crate::RC;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies a function within one analysis.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct FunctionId(u64);

impl FunctionId {
    pub fn new(id: u64) -> FunctionId {
        FunctionId(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    id: FunctionId,
    // The address where this function was found
    address: u64,
    // The name of the function
    name: Option<String>,
    architecture: RC<dyn Architecture>,
    pointer_aliases: PointerAliases,
}

impl Function {
    pub fn new<A>(id: FunctionId, address: u64, architecture: A) -> Function
    where
        A: Architecture + 'static,
    {
        let architecture: RC<dyn Architecture> = RC::new(architecture);
        Function::with_architecture(id, address, architecture)
    }

    /// Create a function sharing an already reference-counted architecture.
    pub fn with_architecture(
        id: FunctionId,
        address: u64,
        architecture: RC<dyn Architecture>,
    ) -> Function {
        let pointer_aliases = architecture.pointer_aliases();
        Function {
            id,
            address,
            name: None,
            architecture,
            pointer_aliases,
        }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn name(&self) -> String {
        match self.name {
            Some(ref name) => name.to_string(),
            None => format!("unknown@{:08X}", self.address),
        }
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn architecture(&self) -> &dyn Architecture {
        self.architecture.as_ref()
    }

    /// The stack pointer, frame pointer and program counter aliases of this
    /// function's architecture.
    pub fn pointer_aliases(&self) -> &PointerAliases {
        &self.pointer_aliases
    }

    /// The width of an address, and of a stack push, in bytes.
    pub fn word_bytes(&self) -> usize {
        self.architecture.word_bytes()
    }
}

#[test]
fn function_name() {
    use crate::architecture::X86;

    let mut function = Function::new(FunctionId::new(3), 0x8048000, X86::new());
    assert_eq!(function.name(), "unknown@08048000");
    function.set_name(Some("main".to_string()));
    assert_eq!(function.name(), "main");
    assert_eq!(function.word_bytes(), 4);
    assert_eq!(format!("{}", function.id()), "f3");
}
