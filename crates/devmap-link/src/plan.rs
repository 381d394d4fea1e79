//! Linker MEMORY/SECTIONS planning from a resolved memory map.

use std::fmt;

use devmap_core::{Diagnostic, PeripheralGroup};
use devmap_memmap::{FlashSource, ResolvedMemoryMap, ResolvedRegion};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::fuses::{plan_fuses, FuseRegion};
use crate::reserve::{reserve, ReservationConfig, Reservations};

/// One entry of the MEMORY command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoryEntry {
    /// Lower-case region name.
    pub name: String,
    pub origin: u64,
    pub length: u64,
    /// `rx`, `rwx`, or none.
    pub attributes: Option<String>,
    /// Fixed-address fuse region.
    pub fixed: bool,
}

/// Where an output section runs and, for initialised data, where it loads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SectionBinding {
    pub name: String,
    pub region: String,
    pub load_region: Option<String>,
    pub noload: bool,
    pub align: u64,
}

impl SectionBinding {
    fn new(name: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            load_region: None,
            noload: false,
            align: 1,
        }
    }

    fn aligned(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    fn loaded_from(mut self, region: &str) -> Self {
        self.load_region = Some(region.to_string());
        self
    }

    fn noload(mut self) -> Self {
        self.noload = true;
        self
    }
}

/// How the program image sits in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageLayout {
    /// Code runs from flash; initialised data is copied into RAM at startup.
    #[default]
    ExecuteInPlace,
    /// The whole image is loaded into main memory (DDR), which also holds
    /// data, heap and stacks. On-chip RAM only receives the relocated vectors
    /// and RAM functions.
    Loaded,
}

impl fmt::Display for ImageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLayout::ExecuteInPlace => f.write_str("execute-in-place"),
            ImageLayout::Loaded => f.write_str("loaded"),
        }
    }
}

/// Sections copied from their load region into the run region by one startup loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CopyRange {
    pub load_region: String,
    pub run_region: String,
    pub sections: Vec<String>,
}

/// Sections zeroed by one startup loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ZeroRange {
    pub region: String,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkerSymbol {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAlias {
    pub alias: String,
    pub region: String,
}

/// Everything a linker script emitter needs for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LinkerPlan {
    pub device: String,
    pub layout: ImageLayout,
    pub flash: ResolvedRegion,
    pub flash_source: FlashSource,
    /// Home of data, heap and stacks.
    pub ram: ResolvedRegion,
    /// On-chip RAM for relocated code when the image is loaded into DDR.
    pub ramfunc: Option<ResolvedRegion>,
    pub boot_flash: Option<ResolvedRegion>,
    pub itcm: Option<ResolvedRegion>,
    pub dtcm: Option<ResolvedRegion>,
    pub memory: Vec<MemoryEntry>,
    pub region_aliases: Vec<RegionAlias>,
    pub sections: Vec<SectionBinding>,
    pub fuses: Vec<FuseRegion>,
    pub reservations: Reservations,
    pub copy: CopyRange,
    pub zero: ZeroRange,
    pub symbols: Vec<LinkerSymbol>,
}

impl LinkerPlan {
    pub fn section(&self, name: &str) -> Option<&SectionBinding> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.value)
    }

    pub fn memory_entry(&self, name: &str) -> Option<&MemoryEntry> {
        self.memory.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// A plan plus the warnings produced while building it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: LinkerPlan,
    pub diagnostics: Vec<Diagnostic>,
}

fn lower(region: &ResolvedRegion) -> String {
    region.name.to_ascii_lowercase()
}

fn same_region(a: &ResolvedRegion, b: &ResolvedRegion) -> bool {
    a.space == b.space && a.name == b.name
}

/// Plan the linker layout of one device whose code runs from flash.
///
/// Fails when there is no RAM to link into or the reservations do not fit;
/// a missing boot flash or TCM only omits its sections.
pub fn plan(map: &ResolvedMemoryMap, fuses: Option<&PeripheralGroup>, config: &ReservationConfig) -> Result<PlanOutcome> {
    plan_with_layout(map, fuses, config, ImageLayout::ExecuteInPlace)
}

/// Plan the linker layout of one device for the given image layout.
///
/// With [`ImageLayout::Loaded`] the canonical flash pick is the main memory
/// and must not be a RAM-only fallback; the canonical RAM pick receives
/// `.vectors` and `.ramfunc`.
pub fn plan_with_layout(
    map: &ResolvedMemoryMap,
    fuses: Option<&PeripheralGroup>,
    config: &ReservationConfig,
    layout: ImageLayout,
) -> Result<PlanOutcome> {
    let device = map.device.as_str();
    let picks = &map.canonical;

    let on_chip = picks.ram.clone().ok_or_else(|| LinkError::MissingRegion {
        device: device.to_string(),
        category: "ram".into(),
    })?;
    let (flash, flash_source) = match &picks.flash {
        Some(f) => (f.clone(), picks.flash_source),
        None => (on_chip.clone(), FlashSource::RamOnly),
    };
    let (ram, ramfunc) = match layout {
        ImageLayout::ExecuteInPlace => (on_chip, None),
        ImageLayout::Loaded if flash_source == FlashSource::RamOnly => {
            return Err(LinkError::MissingRegion {
                device: device.to_string(),
                category: "ddr".into(),
            });
        }
        ImageLayout::Loaded => (flash.clone(), Some(on_chip)),
    };

    let reservations = reserve(device, &ram, config)?;

    let flash_name = lower(&flash);
    let ram_name = lower(&ram);
    let ramfunc_name = ramfunc.as_ref().map(lower);
    let mut diagnostics = Vec::new();

    // Fuses
    let fuse_regions = match fuses {
        Some(fuses) => {
            let boot_name = picks.boot_flash.as_ref().map(lower);
            let mut protected = vec![(flash_name.as_str(), flash.start, flash.end())];
            protected.push((ram_name.as_str(), ram.start, ram.end()));
            if let (Some(name), Some(bfm)) = (&boot_name, &picks.boot_flash) {
                protected.push((name.as_str(), bfm.start, bfm.end()));
            }
            if let (Some(name), Some(fast)) = (&ramfunc_name, &ramfunc) {
                protected.push((name.as_str(), fast.start, fast.end()));
            }
            let (regions, mut diags) = plan_fuses(map, fuses, &protected);
            diagnostics.append(&mut diags);
            regions
        }
        None => Vec::new(),
    };

    // MEMORY
    let mut memory: Vec<MemoryEntry> = map
        .regions()
        .map(|region| {
            let is_code = same_region(region, &flash)
                || picks
                    .boot_flash
                    .as_ref()
                    .is_some_and(|b| same_region(region, b));
            let writable = same_region(region, &ram)
                || ramfunc.as_ref().is_some_and(|f| same_region(region, f));
            let attributes = if writable {
                Some("rwx".to_string())
            } else if is_code {
                Some("rx".to_string())
            } else {
                None
            };
            MemoryEntry {
                name: lower(region),
                origin: region.start,
                length: region.size,
                attributes,
                fixed: false,
            }
        })
        .collect();
    memory.extend(fuse_regions.iter().map(|f| MemoryEntry {
        name: f.name.clone(),
        origin: f.start,
        length: f.size,
        attributes: None,
        fixed: true,
    }));

    let region_aliases = map
        .alias_pairs()
        .map(|(region, alias)| RegionAlias {
            alias: alias.to_ascii_lowercase(),
            region: region.to_ascii_lowercase(),
        })
        .collect();

    // SECTIONS
    let mut sections = Vec::new();
    if ramfunc_name.is_none() {
        let vectors_region = picks.boot_flash.as_ref().map(lower).unwrap_or_else(|| flash_name.clone());
        sections.push(SectionBinding::new(".vectors", &vectors_region));
    }
    sections.extend([
        SectionBinding::new(".text", &flash_name),
        SectionBinding::new(".gnu.sgstubs", &flash_name).aligned(32),
        SectionBinding::new(".ARM.extab", &flash_name),
        SectionBinding::new(".ARM.exidx", &flash_name),
    ]);
    if let Some(fast) = &ramfunc_name {
        sections.extend([
            SectionBinding::new(".vectors", fast).aligned(4).loaded_from(&flash_name),
            SectionBinding::new(".ramfunc", fast).aligned(4).loaded_from(&flash_name),
        ]);
    }
    if let Some(itcm) = &picks.itcm {
        sections.push(SectionBinding::new(".itcm", &lower(itcm)).aligned(4));
    }
    if let Some(dtcm) = &picks.dtcm {
        sections.push(SectionBinding::new(".dtcm", &lower(dtcm)).aligned(4));
    }
    // A loaded image already has its data in place.
    let initialised = |name: &str| {
        let section = SectionBinding::new(name, &ram_name).aligned(4);
        if ramfunc.is_some() {
            section
        } else {
            section.loaded_from(&flash_name)
        }
    };
    sections.extend([
        initialised(".data"),
        initialised(".tdata"),
        SectionBinding::new(".tbss", &ram_name).aligned(4),
        SectionBinding::new(".bss", &ram_name).aligned(4),
        SectionBinding::new(".heap", &ram_name).aligned(config.alignment).noload(),
        SectionBinding::new(".stack", &ram_name).aligned(config.alignment).noload(),
    ]);
    if reservations.block("stack-seal").is_some() {
        sections.push(SectionBinding::new(".stackseal", &ram_name).aligned(config.alignment).noload());
    }
    sections.extend(
        fuse_regions
            .iter()
            .map(|f| SectionBinding::new(&f.section, &f.name)),
    );

    let copy = match &ramfunc_name {
        Some(fast) => CopyRange {
            load_region: flash_name.clone(),
            run_region: fast.clone(),
            sections: vec![".vectors".into(), ".ramfunc".into()],
        },
        None => CopyRange {
            load_region: flash_name.clone(),
            run_region: ram_name.clone(),
            sections: vec![".data".into(), ".tdata".into()],
        },
    };
    let zero = ZeroRange {
        region: ram_name.clone(),
        sections: vec![".tbss".into(), ".bss".into()],
    };

    let symbols = symbols(&flash, &ram, &reservations, config);

    log::info!(
        "{device}: {layout} image, code in {} ({flash_source}), data in {}, {} fuse region(s)",
        flash.name,
        ram.name,
        fuse_regions.len()
    );

    Ok(PlanOutcome {
        plan: LinkerPlan {
            device: device.to_string(),
            layout,
            flash,
            flash_source,
            ram,
            ramfunc,
            boot_flash: picks.boot_flash.clone(),
            itcm: picks.itcm.clone(),
            dtcm: picks.dtcm.clone(),
            memory,
            region_aliases,
            sections,
            fuses: fuse_regions,
            reservations,
            copy,
            zero,
            symbols,
        },
        diagnostics,
    })
}

fn symbols(
    flash: &ResolvedRegion,
    ram: &ResolvedRegion,
    reservations: &Reservations,
    config: &ReservationConfig,
) -> Vec<LinkerSymbol> {
    let block_size = |name: &str| reservations.block(name).map(|b| b.size).unwrap_or(0);
    let mut symbols = vec![
        ("__ROM_BASE".to_string(), flash.start),
        ("__ROM_SIZE".to_string(), flash.size),
        ("__RAM_BASE".to_string(), ram.start),
        ("__RAM_SIZE".to_string(), ram.size),
        ("__STACK_SIZE".to_string(), block_size("stack")),
        ("__HEAP_SIZE".to_string(), block_size("heap")),
        ("__STACKSEAL_SIZE".to_string(), block_size("stack-seal")),
    ];
    for mode in &config.mode_stacks {
        symbols.push((
            format!("__{}_STACK_SIZE", mode.name.to_ascii_uppercase()),
            block_size(&format!("{}-stack", mode.name)),
        ));
    }
    symbols.extend([
        ("__StackTop".to_string(), reservations.stack_top),
        ("__StackLimit".to_string(), reservations.stack_limit),
        ("__HeapBase".to_string(), reservations.heap_base),
        ("__HeapLimit".to_string(), reservations.heap_limit),
    ]);
    symbols
        .into_iter()
        .map(|(name, value)| LinkerSymbol { name, value })
        .collect()
}
