//! Canonical region selection.
//!
//! Device files name their main memories inconsistently (`FLASH`, `IFLASH`,
//! `HSRAM`, `HMCRAMC0`, `DDR_CS`, ...), so each category is picked by a
//! [`CategoryRule`]: filter candidates by kind, external flag and name
//! tokens, then take an exact priority-list match, else the first match on a
//! name token, else the largest candidate. Picking only labels regions; it never
//! removes anything from the map.

use std::collections::BTreeSet;
use std::fmt;

use devmap_core::RegionKind;
use serde::{Deserialize, Serialize};

use crate::error::{MemMapError, Result};
use crate::resolve::{ResolvedRegion, ResolvedSpace};

/// Candidate filter and preference order for one canonical category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CategoryRule {
    /// Accepted region kinds; empty accepts any kind.
    pub kinds: Vec<RegionKind>,
    /// Required value of the external flag; `None` accepts both.
    pub external: Option<bool>,
    /// Lower-case token the region name must contain.
    pub required_token: Option<String>,
    /// Lower-case tokens the region name must not contain.
    pub excluded_tokens: Vec<String>,
    /// Preferred names, most preferred first. Aliases count as names.
    pub priority: Vec<String>,
    /// Name fragments tried after the exact names, in order; empty reuses `priority`.
    pub tokens: Vec<String>,
    /// Do not fall back to the largest candidate when no priority name matches.
    pub priority_only: bool,
}

impl CategoryRule {
    pub fn of_kind(kind: RegionKind) -> Self {
        Self {
            kinds: vec![kind],
            external: Some(false),
            ..Self::default()
        }
    }

    pub fn requiring(mut self, token: &str) -> Self {
        self.required_token = Some(token.to_ascii_lowercase());
        self
    }

    pub fn excluding(mut self, tokens: &[&str]) -> Self {
        self.excluded_tokens = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
        self
    }

    pub fn preferring(mut self, names: &[&str]) -> Self {
        self.priority = names.iter().map(|n| n.to_ascii_lowercase()).collect();
        self
    }

    pub fn matching(mut self, tokens: &[&str]) -> Self {
        self.tokens = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
        self
    }

    /// Whether a region passes the kind, external and token filters.
    pub fn admits(&self, region: &ResolvedRegion) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&region.kind) {
            return false;
        }
        if self.external.is_some_and(|ext| ext != region.external) {
            return false;
        }
        let name = region.name.to_ascii_lowercase();
        if let Some(token) = &self.required_token {
            if !name.contains(&token.to_ascii_lowercase()) {
                return false;
            }
        }
        !self
            .excluded_tokens
            .iter()
            .any(|t| name.contains(&t.to_ascii_lowercase()))
    }

    /// Pick the canonical region for this category across all spaces.
    pub fn pick(&self, spaces: &[ResolvedSpace]) -> Option<ResolvedRegion> {
        let candidates: Vec<(&ResolvedRegion, Vec<String>)> = spaces
            .iter()
            .flat_map(|space| {
                space
                    .regions
                    .iter()
                    .map(move |r| (r, candidate_names(r, space.aliases.get(&r.name))))
            })
            .filter(|(r, _)| self.admits(r))
            .collect();

        let priority: Vec<String> = self.priority.iter().map(|p| p.to_ascii_lowercase()).collect();

        for wanted in &priority {
            if let Some((region, _)) = candidates
                .iter()
                .find(|(_, names)| names.iter().any(|n| n == wanted))
            {
                log::debug!("canonical pick {} by exact name '{wanted}'", region.name);
                return Some((*region).clone());
            }
        }
        let tokens: Vec<String> = if self.tokens.is_empty() {
            priority.clone()
        } else {
            self.tokens.iter().map(|t| t.to_ascii_lowercase()).collect()
        };
        for wanted in &tokens {
            if let Some((region, _)) = candidates
                .iter()
                .find(|(_, names)| names.iter().any(|n| n.contains(wanted.as_str())))
            {
                log::debug!("canonical pick {} by name token '{wanted}'", region.name);
                return Some((*region).clone());
            }
        }
        if self.priority_only {
            return None;
        }

        let mut biggest: Option<&ResolvedRegion> = None;
        for region in candidates.iter().map(|(r, _)| *r) {
            if biggest.map_or(true, |b| region.size > b.size) {
                biggest = Some(region);
            }
        }
        biggest.cloned()
    }
}

fn candidate_names(region: &ResolvedRegion, aliases: Option<&BTreeSet<String>>) -> Vec<String> {
    let mut names = vec![region.name.to_ascii_lowercase()];
    if let Some(aliases) = aliases {
        names.extend(aliases.iter().map(|a| a.to_ascii_lowercase()));
    }
    names
}

/// Per-category selection rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CanonicalRules {
    pub flash: CategoryRule,
    pub ram: CategoryRule,
    pub boot_flash: CategoryRule,
    pub itcm: CategoryRule,
    pub dtcm: CategoryRule,
}

impl CanonicalRules {
    /// Microcontroller rules: the largest internal flash and RAM win, boot
    /// flash is marked `bfm`, TCMs are RAM regions marked `itcm`/`dtcm`.
    pub fn cortex_m() -> Self {
        Self {
            flash: CategoryRule::of_kind(RegionKind::Flash).excluding(&["bfm"]),
            ram: CategoryRule::of_kind(RegionKind::Ram).excluding(&["itcm", "dtcm"]),
            boot_flash: CategoryRule::of_kind(RegionKind::Flash).requiring("bfm"),
            itcm: CategoryRule::of_kind(RegionKind::Ram).requiring("itcm"),
            dtcm: CategoryRule::of_kind(RegionKind::Ram).requiring("dtcm"),
        }
    }

    /// Microprocessor rules: the image lives in DDR, on-chip SRAM holds
    /// relocated code. Both are found by known names only.
    pub fn mpu() -> Self {
        let by_name = |names: &[&str], tokens: &[&str]| CategoryRule {
            priority_only: true,
            ..CategoryRule::default().preferring(names).matching(tokens)
        };
        Self {
            flash: by_name(&["ddr_cs", "ebi_mpddr"], &["ddr"]),
            ram: by_name(&["sram0", "iram"], &["sram", "iram"]),
            boot_flash: by_name(&[], &[]),
            itcm: by_name(&[], &[]),
            dtcm: by_name(&[], &[]),
        }
    }
}

impl Default for CanonicalRules {
    fn default() -> Self {
        Self::cortex_m()
    }
}

/// Where the canonical flash pick came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlashSource {
    #[default]
    Internal,
    External,
    /// No flash at all; code is linked into RAM.
    RamOnly,
}

impl fmt::Display for FlashSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashSource::Internal => f.write_str("internal"),
            FlashSource::External => f.write_str("external"),
            FlashSource::RamOnly => f.write_str("ram-only"),
        }
    }
}

/// The labelled regions the linker planner builds on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CanonicalPicks {
    pub flash: Option<ResolvedRegion>,
    pub flash_source: FlashSource,
    pub ram: Option<ResolvedRegion>,
    pub boot_flash: Option<ResolvedRegion>,
    pub itcm: Option<ResolvedRegion>,
    pub dtcm: Option<ResolvedRegion>,
}

/// Apply `rules` to the resolved spaces of `device`.
///
/// RAM is mandatory. Flash falls back to external flash, then to the RAM pick.
pub fn select(device: &str, spaces: &[ResolvedSpace], rules: &CanonicalRules) -> Result<CanonicalPicks> {
    let ram = rules.ram.pick(spaces).ok_or_else(|| MemMapError::MissingRegion {
        device: device.to_string(),
        category: "ram".into(),
    })?;

    let external_rule = CategoryRule {
        external: Some(true),
        ..rules.flash.clone()
    };
    let (flash, flash_source) = match rules.flash.pick(spaces) {
        Some(f) if f.external => (f, FlashSource::External),
        Some(f) => (f, FlashSource::Internal),
        None => match external_rule.pick(spaces) {
            Some(f) => (f, FlashSource::External),
            None => {
                log::warn!("{device}: no flash region, linking code into {}", ram.name);
                (ram.clone(), FlashSource::RamOnly)
            }
        },
    };

    Ok(CanonicalPicks {
        flash: Some(flash),
        flash_source,
        ram: Some(ram),
        boot_flash: rules.boot_flash.pick(spaces),
        itcm: rules.itcm.pick(spaces),
        dtcm: rules.dtcm.pick(spaces),
    })
}
