//! Plain-text renderings of pipeline results.
//!
//! These are reports for people, not C or linker-script text.

use std::fmt;

use devmap_link::{LinkerPlan, VectorSlot, VectorTable};
use devmap_memmap::ResolvedMemoryMap;
use devmap_regs::{PeripheralLayouts, RegisterLayout, SlotKind};

use crate::batch::BatchSummary;
use crate::process::DeviceOutput;

fn hex(value: u64) -> String {
    format!("0x{value:08X}")
}

/// Resolved regions per address space, with aliases and canonical picks.
pub struct MemoryMapReport<'a>(pub &'a ResolvedMemoryMap);

impl fmt::Display for MemoryMapReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.0;
        writeln!(f, "Memory map: {}", map.device)?;
        for space in &map.spaces {
            writeln!(
                f,
                "  space {} [{} +{}]",
                space.id,
                hex(space.start),
                hex(space.size)
            )?;
            for region in &space.regions {
                write!(
                    f,
                    "    {:<24} {} .. {}  {:<6}",
                    region.name,
                    hex(region.start),
                    hex(region.end()),
                    region.kind.as_str()
                )?;
                if let Some(aliases) = space.aliases.get(&region.name) {
                    let names: Vec<&str> = aliases.iter().map(String::as_str).collect();
                    write!(f, "  aka {}", names.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        let picks = &map.canonical;
        let name = |r: &Option<devmap_memmap::ResolvedRegion>| {
            r.as_ref().map(|r| r.name.clone()).unwrap_or_else(|| "-".into())
        };
        writeln!(f, "  flash:      {} ({})", name(&picks.flash), picks.flash_source)?;
        writeln!(f, "  ram:        {}", name(&picks.ram))?;
        writeln!(f, "  boot flash: {}", name(&picks.boot_flash))?;
        writeln!(f, "  itcm:       {}", name(&picks.itcm))?;
        write!(f, "  dtcm:       {}", name(&picks.dtcm))
    }
}

/// Register layouts of one peripheral.
pub struct LayoutReport<'a>(pub &'a PeripheralLayouts);

impl fmt::Display for LayoutReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.0;
        writeln!(f, "Peripheral {}", p.peripheral)?;
        for layout in &p.layouts {
            write_layout(f, layout)?;
        }
        for d in &p.diagnostics {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}

fn write_layout(f: &mut fmt::Formatter<'_>, layout: &RegisterLayout) -> fmt::Result {
    let shape = if layout.is_union() { "union" } else { "struct" };
    writeln!(f, "  {shape} {} (0x{:X} bytes)", layout.group, layout.size)?;
    for variant in &layout.variants {
        if let Some(mode) = &variant.mode {
            writeln!(f, "    mode {mode}:")?;
        }
        for slot in &variant.members {
            if slot.padding_before > 0 {
                writeln!(
                    f,
                    "      +0x{:04X}  reserved[0x{:X}]",
                    slot.offset - slot.padding_before,
                    slot.padding_before
                )?;
            }
            let ty = match &slot.kind {
                SlotKind::Register { width, .. } => width.c_type().to_string(),
                SlotKind::Group { group } => group.clone(),
            };
            let array = if slot.count > 0 {
                format!("[{}]", slot.count)
            } else {
                String::new()
            };
            write!(f, "      +0x{:04X}  {ty} {}{array}", slot.offset, slot.name)?;
            if !slot.aliases.is_empty() {
                write!(f, "  (also {})", slot.aliases.join(", "))?;
            }
            writeln!(f)?;
            if let SlotKind::Register { fields, .. } = &slot.kind {
                for field in fields {
                    writeln!(
                        f,
                        "                {:<16} bit {:>2} width {:>2}",
                        field.name, field.position, field.width
                    )?;
                }
            }
        }
        if variant.trailing_padding > 0 {
            writeln!(
                f,
                "      +0x{:04X}  reserved[0x{:X}]",
                variant.size - variant.trailing_padding,
                variant.trailing_padding
            )?;
        }
    }
    Ok(())
}

/// Linker plan summary: MEMORY, section bindings, reservations, symbols.
pub struct PlanReport<'a>(pub &'a LinkerPlan);

impl fmt::Display for PlanReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.0;
        writeln!(f, "Linker plan: {} ({} image)", plan.device, plan.layout)?;
        writeln!(f, "  MEMORY")?;
        for m in &plan.memory {
            writeln!(
                f,
                "    {:<24} {:<5} ORIGIN = {}, LENGTH = 0x{:X}",
                m.name,
                m.attributes.as_deref().map(|a| format!("({a})")).unwrap_or_default(),
                hex(m.origin),
                m.length
            )?;
        }
        for a in &plan.region_aliases {
            writeln!(f, "    alias {} -> {}", a.alias, a.region)?;
        }
        writeln!(f, "  SECTIONS")?;
        for s in &plan.sections {
            write!(f, "    {:<24} > {}", s.name, s.region)?;
            if let Some(load) = &s.load_region {
                write!(f, " AT > {load}")?;
            }
            if s.noload {
                write!(f, " (NOLOAD)")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  RESERVED")?;
        for b in &plan.reservations.blocks {
            writeln!(f, "    {:<24} {} .. {}", b.name, hex(b.start), hex(b.end()))?;
        }
        writeln!(f, "  SYMBOLS")?;
        for s in &plan.symbols {
            writeln!(f, "    {:<24} = 0x{:X}", s.name, s.value)?;
        }
        Ok(())
    }
}

/// The vector table, one line per slot.
pub struct VectorReport<'a>(pub &'a VectorTable);

impl fmt::Display for VectorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vectors ({} slots)", self.0.len())?;
        for slot in &self.0.slots {
            match slot {
                VectorSlot::InitialStackPointer => writeln!(f, "    {:>4}  __StackTop", "")?,
                VectorSlot::Handler { index, handler, .. } => writeln!(f, "    {index:>4}  {handler}")?,
                VectorSlot::Reserved { index } => writeln!(f, "    {index:>4}  (reserved)")?,
            }
        }
        Ok(())
    }
}

/// Short per-device status for `check`.
pub struct DeviceSummary<'a>(pub &'a DeviceOutput);

impl fmt::Display for DeviceSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.0;
        let status = if out.has_errors() { "ERRORS" } else { "ok" };
        writeln!(
            f,
            "{}: {status} ({} regions, {} fuse regions, {} warnings)",
            out.device,
            out.map.regions().count(),
            out.plan.fuses.len(),
            out.warnings().count()
        )?;
        for d in &out.diagnostics {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} device(s): {} failed, {} with errors, {} warning(s)",
            self.devices, self.failed, self.with_errors, self.warnings
        )
    }
}
