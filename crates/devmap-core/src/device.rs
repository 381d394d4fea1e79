//! The root device description record.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::memory::AddressSpace;
use crate::peripheral::{PeripheralGroup, PeripheralKind};

/// A named value attached to a device, instance, or bitfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub caption: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            caption: String::new(),
        }
    }

    /// Parse the value as an integer, accepting `0x` hex.
    pub fn as_u64(&self) -> Option<u64> {
        let v = self.value.trim();
        match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => v.parse().ok(),
        }
    }
}

/// A named bag of device properties (e.g., electrical characteristics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PropertyGroup {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Parameter>,
}

/// An interrupt line. Arm system exceptions use negative indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Interrupt {
    pub name: String,
    pub index: i32,
    #[serde(default)]
    pub module_instance: String,
    #[serde(default)]
    pub caption: String,
}

impl Interrupt {
    pub fn new(name: impl Into<String>, index: i32) -> Self {
        Self {
            name: name.into(),
            index,
            module_instance: String::new(),
            caption: String::new(),
        }
    }
}

/// An event system generator or user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceEvent {
    pub name: String,
    pub index: u32,
    #[serde(default)]
    pub module_instance: String,
}

/// Everything known about one microcontroller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceDescription {
    /// Part name (e.g., "ATSAME54P20A").
    pub name: String,
    /// CPU core (e.g., "cortex-m4").
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub pin_count: u32,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub property_groups: Vec<PropertyGroup>,
    #[serde(default)]
    pub address_spaces: Vec<AddressSpace>,
    #[serde(default)]
    pub peripherals: Vec<PeripheralGroup>,
    #[serde(default)]
    pub interrupts: Vec<Interrupt>,
    #[serde(default)]
    pub event_generators: Vec<DeviceEvent>,
    #[serde(default)]
    pub event_users: Vec<DeviceEvent>,
}

impl DeviceDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu: String::new(),
            family: String::new(),
            series: String::new(),
            pin_count: 0,
            parameters: Vec::new(),
            property_groups: Vec::new(),
            address_spaces: Vec::new(),
            peripherals: Vec::new(),
            interrupts: Vec::new(),
            event_generators: Vec::new(),
            event_users: Vec::new(),
        }
    }

    /// Trim record names and tag every peripheral with its [`PeripheralKind`].
    ///
    /// Idempotent. Downstream stages rely on `kind` and never re-derive it.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        for space in &mut self.address_spaces {
            space.id = space.id.trim().to_string();
            for region in &mut space.regions {
                region.name = region.name.trim().to_string();
            }
        }
        for peripheral in &mut self.peripherals {
            peripheral.name = peripheral.name.trim().to_string();
            peripheral.id = peripheral.id.trim().to_string();
            peripheral.kind = PeripheralKind::classify(&peripheral.name, &peripheral.id);
            for group in &mut peripheral.register_groups {
                group.name = group.name.trim().to_string();
                group.modes.retain(|m| !m.trim().is_empty());
            }
        }
        log::debug!(
            "normalized {}: {} address spaces, {} peripherals",
            self.name,
            self.address_spaces.len(),
            self.peripherals.len()
        );
    }

    /// Consume and return the normalized description.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn address_space(&self, id: &str) -> Option<&AddressSpace> {
        self.address_spaces.iter().find(|s| s.id == id)
    }

    /// Like [`Self::address_space`] but reports a missing space as an error.
    pub fn require_address_space(&self, id: &str) -> Result<&AddressSpace> {
        self.address_space(id)
            .ok_or_else(|| CoreError::UnknownAddressSpace {
                device: self.name.clone(),
                id: id.to_string(),
            })
    }

    /// The fuses peripheral, if the device has one.
    pub fn fuses(&self) -> Option<&PeripheralGroup> {
        self.peripherals_of_kind(PeripheralKind::Fuses).next()
    }

    pub fn peripherals_of_kind(
        &self,
        kind: PeripheralKind,
    ) -> impl Iterator<Item = &PeripheralGroup> {
        self.peripherals.iter().filter(move |p| p.kind == kind)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryRegion, RegionKind};

    fn sample() -> DeviceDescription {
        let mut dev = DeviceDescription::new("  ATSAMD21G18A ");
        dev.address_spaces.push(
            AddressSpace::new("base", 0, 0x1_0000_0000)
                .with_region(MemoryRegion::new(" FLASH ", 0, 0x4_0000, RegionKind::Flash)),
        );
        let mut fuses = PeripheralGroup::new("FUSES", "U2401");
        fuses.kind = PeripheralKind::Normal;
        dev.peripherals.push(fuses);
        dev.peripherals.push(PeripheralGroup::new("SysTick", ""));
        dev.peripherals.push(PeripheralGroup::new("SERCOM", "U2201"));
        dev
    }

    #[test]
    fn normalize_trims_and_classifies() {
        let dev = sample().normalized();
        assert_eq!(dev.name, "ATSAMD21G18A");
        assert_eq!(dev.address_spaces[0].regions[0].name, "FLASH");
        assert_eq!(dev.fuses().map(|p| p.name.as_str()), Some("FUSES"));
        assert_eq!(dev.peripherals_of_kind(PeripheralKind::Core).count(), 1);
        assert_eq!(dev.peripherals_of_kind(PeripheralKind::Normal).count(), 1);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = sample().normalized();
        let twice = once.clone().normalized();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_address_space_is_reported() {
        let dev = sample().normalized();
        assert!(dev.address_space("base").is_some());
        let err = dev.require_address_space("data").unwrap_err();
        assert!(err.to_string().contains("'data'"));
        assert!(err.to_string().contains("ATSAMD21G18A"));
    }

    #[test]
    fn parameter_parses_hex_and_decimal() {
        assert_eq!(Parameter::new("NVMCTRL_PAGES", "4096").as_u64(), Some(4096));
        assert_eq!(Parameter::new("BASE", "0x41004000").as_u64(), Some(0x4100_4000));
        assert_eq!(Parameter::new("MODE", "fast").as_u64(), None);
    }

    #[test]
    fn description_deserializes_from_toml() {
        let toml_str = r#"
name = "ATSAML10E16A"
cpu = "cortex-m23"

[[address-spaces]]
id = "base"
start = 0
size = 4294967296

[[address-spaces.regions]]
name = "FLASH"
start = 0
size = 65536
kind = "flash"
page-size = 256

[[interrupts]]
name = "NonMaskableInt"
index = -14
"#;
        let dev: DeviceDescription = toml::from_str(toml_str).unwrap();
        assert_eq!(dev.cpu, "cortex-m23");
        assert_eq!(dev.address_spaces[0].regions[0].page_size, 256);
        assert_eq!(dev.interrupts[0].index, -14);
    }
}
