//! Linker planning for resolved devices.
//!
//! Given a [`devmap_memmap::ResolvedMemoryMap`], [`plan`] decides which
//! region each output section lives in, where the stack and heap sit, and
//! which fixed-address regions the device's fuses need. Microprocessors whose
//! image is loaded into DDR go through [`plan_with_layout`]. The vector table and
//! peripheral base addresses are planned alongside from the device record.

pub mod bases;
pub mod error;
pub mod fuses;
pub mod plan;
pub mod reserve;
pub mod vectors;

pub use bases::{peripheral_bases, PeripheralBase};
pub use error::{LinkError, Result};
pub use fuses::{plan_fuses, FuseRegion};
pub use plan::{
    plan, plan_with_layout, CopyRange, ImageLayout, LinkerPlan, LinkerSymbol, MemoryEntry, PlanOutcome, RegionAlias,
    SectionBinding, ZeroRange,
};
pub use reserve::{reserve, ModeStack, ReservationConfig, ReservedBlock, Reservations};
pub use vectors::{plan_vector_table, VectorSlot, VectorTable};
