//! Register-group layout for peripheral descriptions.
//!
//! Turns the member lists of a peripheral's register groups into byte-exact
//! layouts: padding gaps, arrays, embedded groups, mode unions, and the
//! position/width table of every bitfield.

pub mod error;
pub mod field;
pub mod graph;
pub mod layout;

pub use error::LayoutError;
pub use field::{derive_fields, FieldLayout};
pub use graph::GroupGraph;
pub use layout::{
    build_layout, build_peripheral, LayoutVariant, MemberSlot, PeripheralLayouts, RegisterLayout,
    RegisterWidth, SlotKind,
};
