//! Device description data model for the devmap layout compiler.
//!
//! A device description is the normalized, per-microcontroller record set
//! produced by a device-file reader:
//! - **Memory:** address spaces and the memory regions inside them
//! - **Peripherals:** peripheral groups, their instances, register groups,
//!   registers, and bitfields
//! - **Vectors:** interrupts and event generators/users
//!
//! Everything downstream (memory-map resolution, register layout, linker
//! planning) is a pure function of a [`DeviceDescription`].

pub mod device;
pub mod diagnostic;
pub mod error;
pub mod memory;
pub mod peripheral;

pub use device::{DeviceDescription, DeviceEvent, Interrupt, Parameter, PropertyGroup};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{CoreError, Result};
pub use memory::{AddressSpace, MemoryRegion, RegionKind};
pub use peripheral::{
    BitField, PeripheralGroup, PeripheralInstance, PeripheralKind, Register, RegisterGroup,
    RegisterGroupRef, RegisterMember, SubgroupRef,
};
