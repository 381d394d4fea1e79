//! Bitfield positions and widths.

use devmap_core::{BitField, Parameter, Register, RegisterGroup};
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// A bitfield with its derived position and width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldLayout {
    pub name: String,
    pub caption: String,
    pub mask: u64,
    /// Index of the lowest set bit of `mask`.
    pub position: u32,
    /// Bits from the lowest to the highest set bit of `mask`, inclusive.
    pub width: u32,
    /// Mode this copy of the field belongs to.
    pub mode: Option<String>,
    pub values: Vec<Parameter>,
}

impl FieldLayout {
    /// Derive position and width from a nonzero mask.
    pub fn from_mask(name: impl Into<String>, mask: u64) -> Option<Self> {
        if mask == 0 {
            return None;
        }
        let position = mask.trailing_zeros();
        let width = u64::BITS - mask.leading_zeros() - position;
        Some(Self {
            name: name.into(),
            caption: String::new(),
            mask,
            position,
            width,
            mode: None,
            values: Vec::new(),
        })
    }

    /// Whether the set bits of the mask are adjacent.
    pub fn is_contiguous(&self) -> bool {
        (self.mask >> self.position).count_ones() == self.width
    }

    /// Shift `value` into place. `None` if it does not fit under the mask.
    pub fn insert(&self, value: u64) -> Option<u64> {
        let shifted = value.checked_shl(self.position)?;
        if shifted >> self.position != value || shifted & !self.mask != 0 {
            return None;
        }
        Some(shifted)
    }

    /// Read this field out of a register value.
    pub fn extract(&self, word: u64) -> u64 {
        (word & self.mask) >> self.position
    }
}

/// Derive the field table of one register.
///
/// A field with a mode list yields one [`FieldLayout`] per listed mode;
/// every mode must be declared by `group`. Masks must fit the register width.
pub fn derive_fields(register: &Register, group: &RegisterGroup) -> Result<Vec<FieldLayout>, Vec<LayoutError>> {
    let mut fields = Vec::new();
    let mut errors = Vec::new();
    let bits = register.size.saturating_mul(8);

    for field in &register.fields {
        let Some(base) = layout_of(field) else {
            errors.push(LayoutError::ZeroMask {
                register: register.name.clone(),
                field: field.name.clone(),
            });
            continue;
        };
        if bits < u64::from(u64::BITS) && field.mask >> bits != 0 {
            errors.push(LayoutError::FieldOutOfRange {
                register: register.name.clone(),
                field: field.name.clone(),
                mask: field.mask,
                bits,
            });
            continue;
        }

        if field.modes.is_empty() {
            fields.push(base);
            continue;
        }
        for mode in &field.modes {
            if !group.has_mode(mode) {
                errors.push(LayoutError::UnknownModeReference {
                    group: group.name.clone(),
                    member: format!("{}.{}", register.name, field.name),
                    mode: mode.clone(),
                });
                continue;
            }
            fields.push(FieldLayout {
                mode: Some(mode.clone()),
                ..base.clone()
            });
        }
    }

    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(errors)
    }
}

fn layout_of(field: &BitField) -> Option<FieldLayout> {
    let mut layout = FieldLayout::from_mask(field.name.clone(), field.mask)?;
    layout.caption = field.caption.clone();
    layout.values = field.values.clone();
    Some(layout)
}
