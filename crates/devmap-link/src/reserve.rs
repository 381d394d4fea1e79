//! Top-of-RAM reservations: stack seal, mode stacks, primary stack, heap.

use serde::{Deserialize, Serialize};

use devmap_memmap::ResolvedRegion;

use crate::error::{LinkError, Result};

/// A stack for one processor execution mode (FIQ, IRQ, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModeStack {
    pub name: String,
    pub size: u64,
}

impl ModeStack {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Sizes of the blocks reserved at the top of RAM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReservationConfig {
    pub heap_size: u64,
    pub stack_size: u64,
    /// ARMv8-M stack seal; 0 disables it.
    pub stack_seal_size: u64,
    pub alignment: u64,
    /// Extra stacks, lowest first.
    pub mode_stacks: Vec<ModeStack>,
}

impl ReservationConfig {
    /// Single-stack microcontroller defaults.
    pub fn cortex_m() -> Self {
        Self {
            heap_size: 0xC00,
            stack_size: 0x400,
            stack_seal_size: 0,
            alignment: 8,
            mode_stacks: Vec::new(),
        }
    }

    /// Application processor defaults with one stack per exception mode.
    pub fn cortex_a() -> Self {
        Self {
            heap_size: 1024,
            stack_size: 4096,
            stack_seal_size: 0,
            alignment: 8,
            mode_stacks: vec![
                ModeStack::new("fiq", 512),
                ModeStack::new("irq", 512),
                ModeStack::new("svc", 4096),
                ModeStack::new("abt", 512),
                ModeStack::new("und", 512),
            ],
        }
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self::cortex_m()
    }
}

/// One reserved byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReservedBlock {
    pub name: String,
    pub start: u64,
    pub size: u64,
}

impl ReservedBlock {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

/// The reserved ranges, highest first, and the symbols derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Reservations {
    pub blocks: Vec<ReservedBlock>,
    /// Initial stack pointer: top of the primary stack.
    pub stack_top: u64,
    pub stack_limit: u64,
    pub heap_base: u64,
    pub heap_limit: u64,
}

impl Reservations {
    pub fn block(&self, name: &str) -> Option<&ReservedBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn total(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// Carve the reservations out of the top of `ram`, working downward.
pub fn reserve(device: &str, ram: &ResolvedRegion, config: &ReservationConfig) -> Result<Reservations> {
    let align = config.alignment;
    if align == 0 || !align.is_power_of_two() {
        return Err(LinkError::InvalidAlignment(align));
    }

    let mut wanted: Vec<(String, u64)> = Vec::new();
    if config.stack_seal_size > 0 {
        wanted.push(("stack-seal".into(), config.stack_seal_size));
    }
    for mode in config.mode_stacks.iter().rev() {
        wanted.push((format!("{}-stack", mode.name), mode.size));
    }
    wanted.push(("stack".into(), config.stack_size));
    wanted.push(("heap".into(), config.heap_size));

    let overflow = |required: u64| LinkError::LayoutOverflow {
        device: device.to_string(),
        region: ram.name.clone(),
        required,
        available: ram.size,
    };

    let top = ram.end() & !(align - 1);
    let mut required = ram.end() - top;
    let mut cursor = top;
    let mut blocks = Vec::with_capacity(wanted.len());
    for (name, size) in wanted {
        let size = align_up(size, align).ok_or_else(|| overflow(u64::MAX))?;
        required = required.saturating_add(size);
        if required > ram.size {
            return Err(overflow(required));
        }
        cursor -= size;
        blocks.push(ReservedBlock {
            name,
            start: cursor,
            size,
        });
    }

    let stack = blocks
        .iter()
        .find(|b| b.name == "stack")
        .map(|b| (b.end(), b.start))
        .unwrap_or((cursor, cursor));
    let heap = blocks
        .last()
        .map(|b| (b.start, b.end()))
        .unwrap_or((cursor, cursor));

    log::debug!(
        "{device}: reserved 0x{required:X} of 0x{:X} bytes at the top of {}",
        ram.size,
        ram.name
    );
    Ok(Reservations {
        blocks,
        stack_top: stack.0,
        stack_limit: stack.1,
        heap_base: heap.0,
        heap_limit: heap.1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmap_core::RegionKind;

    fn ram(start: u64, size: u64) -> ResolvedRegion {
        ResolvedRegion {
            space: "base".into(),
            name: "HSRAM".into(),
            start,
            size,
            kind: RegionKind::Ram,
            page_size: 0,
            external: false,
        }
    }

    #[test]
    fn default_fits_small_ram() {
        let r = reserve("X", &ram(0x2000_0000, 0x8000), &ReservationConfig::cortex_m()).unwrap();
        assert_eq!(r.total(), 0x1000);
        assert_eq!(r.stack_top, 0x2000_8000);
        assert_eq!(r.stack_limit, 0x2000_7C00);
        assert_eq!(r.heap_limit, 0x2000_7C00);
        assert_eq!(r.heap_base, 0x2000_7000);
        assert!(r.stack_limit >= r.heap_limit);
    }

    #[test]
    fn oversized_heap_overflows() {
        let config = ReservationConfig {
            heap_size: 0x8000,
            ..ReservationConfig::cortex_m()
        };
        let err = reserve("X", &ram(0x2000_0000, 0x8000), &config).unwrap_err();
        assert!(matches!(
            err,
            LinkError::LayoutOverflow {
                required: 0x8400,
                available: 0x8000,
                ..
            }
        ));
    }

    #[test]
    fn blocks_are_aligned_and_disjoint() {
        let config = ReservationConfig {
            stack_seal_size: 8,
            heap_size: 0x101,
            ..ReservationConfig::cortex_a()
        };
        let region = ram(0x0030_0000, 0x2_0000);
        let r = reserve("SAMA5", &region, &config).unwrap();

        let names: Vec<&str> = r.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "stack-seal",
                "und-stack",
                "abt-stack",
                "svc-stack",
                "irq-stack",
                "fiq-stack",
                "stack",
                "heap"
            ]
        );
        for pair in r.blocks.windows(2) {
            assert_eq!(pair[1].end(), pair[0].start);
        }
        for b in &r.blocks {
            assert_eq!(b.start % 8, 0);
            assert_eq!(b.size % 8, 0);
            assert!(b.start >= region.start && b.end() <= region.end());
        }
        assert_eq!(r.block("heap").unwrap().size, 0x108);
        assert!(r.total() <= region.size);
    }

    #[test]
    fn unaligned_ram_end_is_rounded_down() {
        let r = reserve("X", &ram(0x2000_0000, 0x8004), &ReservationConfig::cortex_m()).unwrap();
        assert_eq!(r.stack_top, 0x2000_8000);
    }

    #[test]
    fn bad_alignment_rejected() {
        let config = ReservationConfig {
            alignment: 6,
            ..ReservationConfig::cortex_m()
        };
        assert!(matches!(
            reserve("X", &ram(0, 0x1000), &config),
            Err(LinkError::InvalidAlignment(6))
        ));
    }

    #[test]
    fn config_from_toml_fills_defaults() {
        let config: ReservationConfig = toml::from_str(
            r#"
heap-size = 0x2000
mode-stacks = [{ name = "irq", size = 0x200 }]
"#,
        )
        .unwrap();
        assert_eq!(config.heap_size, 0x2000);
        assert_eq!(config.stack_size, 0x400);
        assert_eq!(config.mode_stacks, vec![ModeStack::new("irq", 0x200)]);
    }
}
