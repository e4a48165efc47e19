//! Abstract locations, and the conversion of instructions into abstract
//! assignments.
//!
//! * `AbsLoc`/`AbsRegion` - Canonical identities of storage locations.
//! * `RegionConverter` - Resolves registers and address expressions to
//! `AbsRegion`s, using a `StackHeightOracle` for stack and frame relative
//! addresses.
//! * `AssignmentConverter` - Produces the `Assignment`s of an instruction.
//! * `ConversionCache` - Optional per-function, per-address memoization.

mod absloc;
mod assignment;
mod cache;
mod region;
mod stack_height;

pub use self::absloc::{AbsLoc, AbsRegion};
pub use self::assignment::{Assignment, AssignmentConverter};
pub use self::cache::ConversionCache;
pub use self::region::RegionConverter;
pub use self::stack_height::{Height, Region, StackHeight, StackHeightOracle, StackHeights};
