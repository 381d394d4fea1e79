//! Address spaces and memory regions.
//!
//! Region offsets are relative to their owning address space; use
//! [`AddressSpace::absolute_start`] to get a bus address.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a memory region is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegionKind {
    Flash,
    Ram,
    Io,
    /// Anything else (fuses, user page, signatures, EEPROM, ...).
    Other,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Flash => "flash",
            RegionKind::Ram => "ram",
            RegionKind::Io => "io",
            RegionKind::Other => "other",
        }
    }
}

impl From<String> for RegionKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "flash" => RegionKind::Flash,
            "ram" => RegionKind::Ram,
            "io" => RegionKind::Io,
            _ => RegionKind::Other,
        }
    }
}

impl From<RegionKind> for String {
    fn from(kind: RegionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named sub-range of an address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoryRegion {
    /// Region name (e.g., "FLASH", "HSRAM", "BKUPRAM").
    pub name: String,
    /// Start offset relative to the owning address space.
    pub start: u64,
    /// Size in bytes.
    pub size: u64,
    pub kind: RegionKind,
    /// Erase page size; nonzero for flash only.
    #[serde(default)]
    pub page_size: u64,
    /// Whether the region sits behind an external memory interface.
    #[serde(default)]
    pub external: bool,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, start: u64, size: u64, kind: RegionKind) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind,
            page_size: 0,
            external: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }
}

/// A based, sized span of addressable memory containing regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddressSpace {
    pub id: String,
    /// Absolute start address.
    pub start: u64,
    pub size: u64,
    /// Regions in source order.
    #[serde(default)]
    pub regions: Vec<MemoryRegion>,
}

impl AddressSpace {
    pub fn new(id: impl Into<String>, start: u64, size: u64) -> Self {
        Self {
            id: id.into(),
            start,
            size,
            regions: Vec::new(),
        }
    }

    pub fn with_region(mut self, region: MemoryRegion) -> Self {
        self.regions.push(region);
        self
    }

    /// Absolute `[start, end)` of a region inside this space.
    pub fn absolute_span(&self, region: &MemoryRegion) -> (u64, u64) {
        let start = self.start.saturating_add(region.start);
        (start, start.saturating_add(region.size))
    }

    /// Absolute start address of a region inside this space.
    pub fn absolute_start(&self, region: &MemoryRegion) -> u64 {
        self.absolute_span(region).0
    }

    /// Look up a region by exact name.
    pub fn region(&self, name: &str) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.name == name)
    }
}
