//! The interface to a stack height analysis.
//!
//! Absflow does not compute stack heights itself. A `StackHeightOracle`
//! reports, for a function and an address, the displacement of the stack
//! pointer (and separately the frame pointer) from the stack pointer's value
//! at function entry.
//!
//! The lattice is Unanalyzed/Value/Bottom. `Bottom` means there is no usable
//! stack model at this location, and classification falls back to generic
//! locations. `Unanalyzed` means the analysis never reached a fixed point
//! for this location, which is a precondition violation.

use crate::function::{Function, FunctionId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A disjoint stack addressing domain within a function.
///
/// Non-contiguous stack contexts, such as those created by tail calls or
/// signal frames, get distinct regions.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Region(u64);

impl Region {
    pub fn new(region: u64) -> Region {
        Region(region)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A resolved displacement within a region.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Height {
    height: i64,
    region: Region,
}

impl Height {
    pub fn new(height: i64, region: u64) -> Height {
        Height {
            height,
            region: Region::new(region),
        }
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

/// The height of the stack or frame pointer at one location.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StackHeight {
    /// The stack height analysis has not reached this location.
    Unanalyzed,
    Value(Height),
    /// There is no stack model here, for example before function entry.
    Bottom,
}

impl StackHeight {
    pub fn is_unanalyzed(&self) -> bool {
        matches!(self, StackHeight::Unanalyzed)
    }

    pub fn is_value(&self) -> bool {
        self.value().is_some()
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, StackHeight::Bottom)
    }

    pub fn value(&self) -> Option<Height> {
        match self {
            StackHeight::Value(height) => Some(*height),
            _ => None,
        }
    }
}

/// Reports stack and frame pointer heights for a function.
///
/// Implementations must answer consistently for a given function and address
/// for as long as a converter caching results for that function is alive.
pub trait StackHeightOracle {
    /// The height of the stack pointer before the instruction at `address`
    /// executes.
    fn stack_height(&self, function: &Function, address: u64) -> StackHeight;
    /// The height of the frame pointer before the instruction at `address`
    /// executes.
    fn frame_height(&self, function: &Function, address: u64) -> StackHeight;
}

/// A `StackHeightOracle` over precomputed heights.
///
/// Locations for which no height was recorded are `Unanalyzed`.
#[derive(Clone, Debug, Default)]
pub struct StackHeights {
    stack: FxHashMap<(FunctionId, u64), StackHeight>,
    frame: FxHashMap<(FunctionId, u64), StackHeight>,
}

impl StackHeights {
    pub fn new() -> StackHeights {
        StackHeights::default()
    }

    /// Record the stack pointer height at `address` in `function`.
    pub fn set_stack(&mut self, function: FunctionId, address: u64, height: StackHeight) {
        self.stack.insert((function, address), height);
    }

    /// Record the frame pointer height at `address` in `function`.
    pub fn set_frame(&mut self, function: FunctionId, address: u64, height: StackHeight) {
        self.frame.insert((function, address), height);
    }

    /// The number of locations with a recorded stack pointer height.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty() && self.frame.is_empty()
    }
}

impl StackHeightOracle for StackHeights {
    fn stack_height(&self, function: &Function, address: u64) -> StackHeight {
        self.stack
            .get(&(function.id(), address))
            .cloned()
            .unwrap_or(StackHeight::Unanalyzed)
    }

    fn frame_height(&self, function: &Function, address: u64) -> StackHeight {
        self.frame
            .get(&(function.id(), address))
            .cloned()
            .unwrap_or(StackHeight::Unanalyzed)
    }
}

#[test]
fn stack_heights() {
    use crate::architecture::Amd64;

    let function = Function::new(FunctionId::new(1), 0x400000, Amd64::new());
    let other = Function::new(FunctionId::new(2), 0x400100, Amd64::new());

    let mut heights = StackHeights::new();
    assert!(heights.is_empty());
    heights.set_stack(function.id(), 0x400000, StackHeight::Value(Height::new(-8, 1)));
    heights.set_frame(function.id(), 0x400000, StackHeight::Bottom);

    let stack = heights.stack_height(&function, 0x400000);
    assert!(stack.is_value());
    assert_eq!(stack.value().unwrap().height(), -8);
    assert_eq!(stack.value().unwrap().region(), Region::new(1));
    assert!(heights.frame_height(&function, 0x400000).is_bottom());

    // Nothing recorded for this address, or for this function
    assert!(heights.stack_height(&function, 0x400004).is_unanalyzed());
    assert!(heights.stack_height(&other, 0x400000).is_unanalyzed());
}
