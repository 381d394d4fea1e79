//! Memory-map resolution for device descriptions.
//!
//! Device files routinely describe the same memory twice (a `FLASH` region
//! and an `NVMCTRL_FLASH` region at the same address) or describe an
//! umbrella region around the usable ones. [`resolve`] turns the raw
//! address spaces into a [`ResolvedMemoryMap`] with:
//! - no overlapping regions inside any address space,
//! - an alias table for exact duplicates,
//! - canonical flash/RAM/boot-flash/TCM picks for the linker planner.

pub mod canonical;
pub mod error;
pub mod policy;
pub mod resolve;

pub use canonical::{CanonicalPicks, CanonicalRules, CategoryRule, FlashSource};
pub use error::{MemMapError, Result};
pub use policy::{ContainmentPolicy, PartialOverlapTieBreak, ResolverConfig};
pub use resolve::{resolve, Resolution, ResolvedMemoryMap, ResolvedRegion, ResolvedSpace};
