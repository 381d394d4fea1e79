//! Interrupt vector table planning.

use std::collections::BTreeMap;

use devmap_core::{Diagnostic, Interrupt};
use serde::{Deserialize, Serialize};

/// One entry of the vector table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VectorSlot {
    /// Slot 0 on Cortex-M: the initial stack pointer.
    InitialStackPointer,
    Handler {
        index: i32,
        name: String,
        /// Handler symbol, `<name>_Handler`.
        handler: String,
        caption: String,
    },
    Reserved { index: i32 },
}

/// The planned vector table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VectorTable {
    pub slots: Vec<VectorSlot>,
}

impl VectorTable {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handler slots only.
    pub fn handlers(&self) -> impl Iterator<Item = &VectorSlot> {
        self.slots
            .iter()
            .filter(|s| matches!(s, VectorSlot::Handler { .. }))
    }
}

/// Lay out the vector table from the lowest to the highest interrupt index.
///
/// A repeated index keeps the first interrupt and reports the rest.
pub fn plan_vector_table(interrupts: &[Interrupt]) -> (VectorTable, Vec<Diagnostic>) {
    let mut by_index: BTreeMap<i32, &Interrupt> = BTreeMap::new();
    let mut diagnostics = Vec::new();
    for intr in interrupts {
        if let Some(first) = by_index.get(&intr.index) {
            diagnostics.push(Diagnostic::warning(
                "vectors",
                "duplicate-vector",
                format!(
                    "interrupt {} reuses index {} of {}; ignored",
                    intr.name, intr.index, first.name
                ),
            ));
            continue;
        }
        by_index.insert(intr.index, intr);
    }

    let (Some(&lowest), Some(&highest)) = (by_index.keys().next(), by_index.keys().next_back()) else {
        return (VectorTable::default(), diagnostics);
    };

    let mut slots = vec![VectorSlot::InitialStackPointer];
    for index in lowest..=highest {
        slots.push(match by_index.get(&index) {
            Some(intr) => VectorSlot::Handler {
                index,
                name: intr.name.clone(),
                handler: format!("{}_Handler", intr.name),
                caption: intr.caption.clone(),
            },
            None => VectorSlot::Reserved { index },
        });
    }
    (VectorTable { slots }, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_become_reserved_slots() {
        let interrupts = vec![
            Interrupt::new("Reset", -15),
            Interrupt::new("NonMaskableInt", -14),
            Interrupt::new("HardFault", -13),
            Interrupt::new("SVCall", -5),
            Interrupt::new("PM", 0),
        ];
        let (table, diags) = plan_vector_table(&interrupts);
        assert!(diags.is_empty());
        assert_eq!(table.slots[0], VectorSlot::InitialStackPointer);
        // Initial SP plus indices -15..=0.
        assert_eq!(table.len(), 17);
        assert_eq!(table.handlers().count(), 5);
        assert_eq!(table.slots[4], VectorSlot::Reserved { index: -12 });
        assert!(matches!(
            &table.slots[16],
            VectorSlot::Handler { handler, .. } if handler == "PM_Handler"
        ));
    }

    #[test]
    fn unsorted_input_is_ordered() {
        let interrupts = vec![Interrupt::new("EIC", 3), Interrupt::new("WDT", 1)];
        let (table, _) = plan_vector_table(&interrupts);
        assert!(matches!(&table.slots[1], VectorSlot::Handler { name, .. } if name == "WDT"));
        assert_eq!(table.slots[2], VectorSlot::Reserved { index: 2 });
    }

    #[test]
    fn duplicate_index_keeps_first() {
        let interrupts = vec![Interrupt::new("SERCOM0", 9), Interrupt::new("SERCOM0_ALT", 9)];
        let (table, diags) = plan_vector_table(&interrupts);
        assert_eq!(table.len(), 2);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, "duplicate-vector");
        assert!(diags[0].message.contains("SERCOM0_ALT"));
    }

    #[test]
    fn no_interrupts_no_table() {
        let (table, diags) = plan_vector_table(&[]);
        assert!(table.is_empty());
        assert!(diags.is_empty());
    }
}
