//! `devmap.toml` project configuration.
//!
//! Every section is optional. Values left out fall back to the preset of the
//! device class, which is either set explicitly or detected from the CPU
//! name of each device.

use std::path::{Path, PathBuf};

use devmap_link::{ImageLayout, ModeStack, ReservationConfig};
use devmap_memmap::{CanonicalRules, ContainmentPolicy, PartialOverlapTieBreak, ResolverConfig};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Region names every microprocessor resolves without: umbrella regions
/// spanning all on-chip memories.
const MPU_EXCLUDED_REGIONS: &[&str] = &["IMEMORIES"];

/// Name of the configuration file searched for.
pub const CONFIG_FILE: &str = "devmap.toml";

/// Broad device class selecting the canonical-region rules and stack presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    /// Microcontroller: internal flash and SRAM, one stack.
    #[default]
    Mcu,
    /// Microprocessor: code in DDR, one stack per exception mode.
    Mpu,
}

impl DeviceClass {
    /// Guess the class from a CPU name such as `cortex-m4` or `cortex-a5`.
    pub fn detect(cpu: &str) -> Self {
        let cpu = cpu.to_ascii_lowercase();
        if cpu.contains("cortex-a") || cpu.starts_with("arm9") {
            DeviceClass::Mpu
        } else {
            DeviceClass::Mcu
        }
    }

    /// Where the program image lives for this class.
    pub fn image_layout(self) -> ImageLayout {
        match self {
            DeviceClass::Mcu => ImageLayout::ExecuteInPlace,
            DeviceClass::Mpu => ImageLayout::Loaded,
        }
    }
}

/// `[reservations]`: overrides on top of the class preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReservationOverrides {
    pub heap_size: Option<u64>,
    pub stack_size: Option<u64>,
    pub stack_seal_size: Option<u64>,
    pub alignment: Option<u64>,
    pub mode_stacks: Option<Vec<ModeStack>>,
}

/// `[resolver]`: overlap policies and regions to ignore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolverOverrides {
    pub containment: Option<ContainmentPolicy>,
    pub partial_overlap: Option<PartialOverlapTieBreak>,
    /// Region names dropped before resolution (case-insensitive).
    pub excluded_regions: Vec<String>,
}

/// `[batch]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BatchConfig {
    /// Worker count; 0 or absent means one per available CPU.
    pub jobs: Option<usize>,
}

impl BatchConfig {
    pub fn jobs(&self) -> usize {
        match self.jobs {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// The whole `devmap.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DevmapConfig {
    /// Forces a device class instead of detecting it per device.
    pub class: Option<DeviceClass>,
    pub reservations: ReservationOverrides,
    pub resolver: ResolverOverrides,
    pub batch: BatchConfig,
}

impl DevmapConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(devmap_core::CoreError::from)?;
        Self::from_toml(&content).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Search `start_dir` and its ancestors for `devmap.toml`.
    ///
    /// Returns the configuration and the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                log::debug!("using {}", candidate.display());
                return Ok(Some((config, dir)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// The class used for a device with the given CPU.
    pub fn class_for(&self, cpu: &str) -> DeviceClass {
        self.class.unwrap_or_else(|| DeviceClass::detect(cpu))
    }

    pub fn reservation_config(&self, class: DeviceClass) -> ReservationConfig {
        let preset = match class {
            DeviceClass::Mcu => ReservationConfig::cortex_m(),
            DeviceClass::Mpu => ReservationConfig::cortex_a(),
        };
        let o = &self.reservations;
        ReservationConfig {
            heap_size: o.heap_size.unwrap_or(preset.heap_size),
            stack_size: o.stack_size.unwrap_or(preset.stack_size),
            stack_seal_size: o.stack_seal_size.unwrap_or(preset.stack_seal_size),
            alignment: o.alignment.unwrap_or(preset.alignment),
            mode_stacks: o.mode_stacks.clone().unwrap_or(preset.mode_stacks),
        }
    }

    /// Resolver settings: the class rules plus `[resolver]`. Microprocessors
    /// always drop their umbrella regions on top of the configured exclusions.
    pub fn resolver_config(&self, class: DeviceClass) -> ResolverConfig {
        let mut excluded_regions = self.resolver.excluded_regions.clone();
        let canonical = match class {
            DeviceClass::Mcu => CanonicalRules::cortex_m(),
            DeviceClass::Mpu => {
                for name in MPU_EXCLUDED_REGIONS {
                    if !excluded_regions.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                        excluded_regions.push(name.to_string());
                    }
                }
                CanonicalRules::mpu()
            }
        };
        ResolverConfig {
            containment: self.resolver.containment.unwrap_or_default(),
            partial_overlap: self.resolver.partial_overlap.unwrap_or_default(),
            excluded_regions,
            canonical,
        }
    }
}
