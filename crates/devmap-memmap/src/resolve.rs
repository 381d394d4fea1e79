//! Per-address-space overlap removal and alias detection.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use devmap_core::{AddressSpace, Diagnostic, MemoryRegion, RegionKind};
use serde::{Deserialize, Serialize};

use crate::canonical::{self, CanonicalPicks};
use crate::error::{MemMapError, Result};
use crate::policy::{ContainmentPolicy, PartialOverlapTieBreak, ResolverConfig};

/// A surviving region with its absolute bus address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedRegion {
    /// Owning address space id.
    pub space: String,
    pub name: String,
    /// Absolute start address.
    pub start: u64,
    pub size: u64,
    pub kind: RegionKind,
    pub page_size: u64,
    pub external: bool,
}

impl ResolvedRegion {
    fn from_region(space: &AddressSpace, region: &MemoryRegion) -> Self {
        Self {
            space: space.id.clone(),
            name: region.name.clone(),
            start: space.absolute_start(region),
            size: region.size,
            kind: region.kind,
            page_size: region.page_size,
            external: region.external,
        }
    }

    /// Exclusive end address.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    /// Whether `[start, start + size)` intersects this region.
    pub fn overlaps(&self, start: u64, size: u64) -> bool {
        start < self.end() && self.start < start.saturating_add(size)
    }
}

/// One address space after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedSpace {
    pub id: String,
    pub start: u64,
    pub size: u64,
    /// Non-overlapping regions sorted by absolute start.
    pub regions: Vec<ResolvedRegion>,
    /// Canonical region name to the names of its exact duplicates.
    pub aliases: BTreeMap<String, BTreeSet<String>>,
}

/// The de-overlapped, alias-aware memory map of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedMemoryMap {
    pub device: String,
    pub spaces: Vec<ResolvedSpace>,
    pub canonical: CanonicalPicks,
}

impl ResolvedMemoryMap {
    /// All surviving regions, space by space.
    pub fn regions(&self) -> impl Iterator<Item = &ResolvedRegion> {
        self.spaces.iter().flat_map(|s| s.regions.iter())
    }

    /// Look up a region by name or by one of its aliases.
    pub fn region(&self, name: &str) -> Option<&ResolvedRegion> {
        let canonical = self.canonical_of(name)?;
        self.regions().find(|r| r.name == canonical)
    }

    pub fn aliases_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.spaces.iter().find_map(|s| s.aliases.get(name))
    }

    /// The surviving region name that `name` refers to.
    pub fn canonical_of<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.regions().any(|r| r.name == name) {
            return Some(name);
        }
        self.spaces
            .iter()
            .flat_map(|s| s.aliases.iter())
            .find(|(_, aliases)| aliases.contains(name))
            .map(|(canonical, _)| canonical.as_str())
    }

    /// Regions intersecting `[start, start + size)`.
    pub fn overlapping(&self, start: u64, size: u64) -> Vec<&ResolvedRegion> {
        self.regions().filter(|r| r.overlaps(start, size)).collect()
    }

    pub fn find_space(&self, id: &str) -> Option<&ResolvedSpace> {
        self.spaces.iter().find(|s| s.id == id)
    }

    /// Every `(canonical, alias)` pair in name order.
    pub fn alias_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.spaces.iter().flat_map(|s| {
            s.aliases
                .iter()
                .flat_map(|(c, set)| set.iter().map(move |a| (c.as_str(), a.as_str())))
        })
    }
}

/// A resolved map plus the warnings produced on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub map: ResolvedMemoryMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve the address spaces of `device` into a [`ResolvedMemoryMap`].
///
/// Fails only when the map is unusable: no RAM region, or two address
/// spaces with the same id.
pub fn resolve(device: &str, address_spaces: &[AddressSpace], config: &ResolverConfig) -> Result<Resolution> {
    let mut seen = HashSet::new();
    for space in address_spaces {
        if !seen.insert(space.id.as_str()) {
            return Err(MemMapError::DuplicateSpace {
                device: device.to_string(),
                id: space.id.clone(),
            });
        }
    }

    let mut diagnostics = Vec::new();
    let spaces: Vec<ResolvedSpace> = address_spaces
        .iter()
        .map(|space| resolve_space(space, config, &mut diagnostics))
        .collect();

    let canonical = canonical::select(device, &spaces, &config.canonical)?;
    log::debug!(
        "{device}: flash={:?} ({}), ram={:?}",
        canonical.flash.as_ref().map(|r| &r.name),
        canonical.flash_source,
        canonical.ram.as_ref().map(|r| &r.name)
    );

    Ok(Resolution {
        map: ResolvedMemoryMap {
            device: device.to_string(),
            spaces,
            canonical,
        },
        diagnostics,
    })
}

fn resolve_space(space: &AddressSpace, config: &ResolverConfig, diagnostics: &mut Vec<Diagnostic>) -> ResolvedSpace {
    let regions: Vec<&MemoryRegion> = space
        .regions
        .iter()
        .filter(|r| {
            let excluded = config.is_excluded(&r.name);
            if excluded {
                log::debug!("{}: dropping excluded region {}", space.id, r.name);
            }
            !excluded
        })
        .collect();
    let spans: Vec<(u64, u64)> = regions.iter().map(|r| space.absolute_span(r)).collect();

    let n = regions.len();
    let mut removed = vec![false; n];
    let mut alias_of: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if removed[i] {
                break;
            }
            if removed[j] {
                continue;
            }
            let (si, ei) = spans[i];
            let (sj, ej) = spans[j];
            let (a, b) = (regions[i], regions[j]);

            if si == sj && ei == ej {
                log::debug!("{}: {} is an alias of {}", space.id, b.name, a.name);
                alias_of[j] = Some(i);
                removed[j] = true;
            } else if si >= sj && ei <= ej {
                let victim = match config.containment {
                    ContainmentPolicy::KeepEnclosing => i,
                    ContainmentPolicy::KeepContained => j,
                };
                report_containment(space, a, b, regions[victim], config.containment, diagnostics);
                removed[victim] = true;
            } else if sj >= si && ej <= ei {
                let victim = match config.containment {
                    ContainmentPolicy::KeepEnclosing => j,
                    ContainmentPolicy::KeepContained => i,
                };
                report_containment(space, b, a, regions[victim], config.containment, diagnostics);
                removed[victim] = true;
            } else if si < ej && sj < ei {
                let victim = match config.partial_overlap {
                    PartialOverlapTieBreak::KeepLarger if b.size > a.size => i,
                    PartialOverlapTieBreak::KeepLarger => j,
                    PartialOverlapTieBreak::KeepFirst => j,
                    PartialOverlapTieBreak::KeepEarlierStart if sj < si => i,
                    PartialOverlapTieBreak::KeepEarlierStart => j,
                };
                let keeper = if victim == i { b } else { a };
                let message = format!(
                    "regions {} [0x{si:08X}, 0x{ei:08X}) and {} [0x{sj:08X}, 0x{ej:08X}) partially overlap; kept {} ({})",
                    a.name, b.name, keeper.name, config.partial_overlap
                );
                log::warn!("{}: {message}", space.id);
                diagnostics.push(Diagnostic::warning(&space.id, "overlap-ambiguity", message));
                removed[victim] = true;
            }
        }
    }

    let mut aliases: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (j, canonical) in alias_of.iter().enumerate() {
        if let Some(i) = *canonical {
            if removed[i] {
                log::debug!(
                    "{}: dropping alias {} of removed region {}",
                    space.id,
                    regions[j].name,
                    regions[i].name
                );
                continue;
            }
            aliases
                .entry(regions[i].name.clone())
                .or_default()
                .insert(regions[j].name.clone());
        }
    }

    let mut survivors: Vec<ResolvedRegion> = regions
        .iter()
        .zip(&removed)
        .filter(|(_, gone)| !**gone)
        .map(|(r, _)| ResolvedRegion::from_region(space, r))
        .collect();
    survivors.sort_by_key(|r| r.start);

    ResolvedSpace {
        id: space.id.clone(),
        start: space.start,
        size: space.size,
        regions: survivors,
        aliases,
    }
}

/// Containment is silent unless the two regions disagree on kind.
fn report_containment(
    space: &AddressSpace,
    inner: &MemoryRegion,
    outer: &MemoryRegion,
    victim: &MemoryRegion,
    policy: ContainmentPolicy,
    diagnostics: &mut Vec<Diagnostic>,
) {
    log::debug!(
        "{}: {} lies inside {}; removing {} ({policy})",
        space.id,
        inner.name,
        outer.name,
        victim.name
    );
    if inner.kind != outer.kind {
        let message = format!(
            "{} region {} lies inside {} region {}; removed {} ({policy})",
            inner.kind, inner.name, outer.kind, outer.name, victim.name
        );
        log::warn!("{}: {message}", space.id);
        diagnostics.push(Diagnostic::warning(&space.id, "overlap-ambiguity", message));
    }
}
