//! Overlap resolution policies.
//!
//! Both policies are plain configuration so a project can override the
//! heuristics per vendor from `devmap.toml`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalRules;

/// Which region survives when one region is fully inside another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainmentPolicy {
    /// Keep the enclosing region, drop the contained one.
    #[default]
    KeepEnclosing,
    /// Keep the contained region, drop the umbrella region.
    KeepContained,
}

/// Which region survives when two regions overlap without nesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialOverlapTieBreak {
    /// Keep the larger region; equal sizes keep the first seen.
    #[default]
    KeepLarger,
    /// Keep whichever region appears first in source order.
    KeepFirst,
    /// Keep the region with the lower start address.
    KeepEarlierStart,
}

impl fmt::Display for ContainmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainmentPolicy::KeepEnclosing => f.write_str("keep-enclosing"),
            ContainmentPolicy::KeepContained => f.write_str("keep-contained"),
        }
    }
}

impl fmt::Display for PartialOverlapTieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialOverlapTieBreak::KeepLarger => f.write_str("keep-larger"),
            PartialOverlapTieBreak::KeepFirst => f.write_str("keep-first"),
            PartialOverlapTieBreak::KeepEarlierStart => f.write_str("keep-earlier-start"),
        }
    }
}

/// Everything [`crate::resolve`] can be told.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolverConfig {
    pub containment: ContainmentPolicy,
    pub partial_overlap: PartialOverlapTieBreak,
    /// Region names (case-insensitive) dropped before overlap resolution.
    pub excluded_regions: Vec<String>,
    pub canonical: CanonicalRules,
}

impl ResolverConfig {
    pub fn is_excluded(&self, region_name: &str) -> bool {
        self.excluded_regions
            .iter()
            .any(|n| n.eq_ignore_ascii_case(region_name))
    }
}
