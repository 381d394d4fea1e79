//! Absolute base addresses of peripheral instances.

use devmap_core::{DeviceDescription, Diagnostic, PeripheralKind};
use serde::{Deserialize, Serialize};

/// Where one register group of one peripheral instance lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralBase {
    pub peripheral: String,
    pub instance: String,
    /// Register group name in the peripheral module.
    pub group: String,
    pub address: u64,
}

/// Base address of every register-group binding of every normal peripheral.
///
/// Fuses and core peripherals are skipped: fuses get linker regions, core
/// peripherals come from the CPU headers.
pub fn peripheral_bases(device: &DeviceDescription) -> (Vec<PeripheralBase>, Vec<Diagnostic>) {
    let mut bases = Vec::new();
    let mut diagnostics = Vec::new();

    for peripheral in device.peripherals_of_kind(PeripheralKind::Normal) {
        for instance in &peripheral.instances {
            for group_ref in &instance.register_groups {
                let space = match device.require_address_space(&group_ref.address_space) {
                    Ok(space) => space,
                    Err(e) => {
                        diagnostics.push(Diagnostic::warning(
                            format!("{}/{}", peripheral.name, instance.name),
                            "unknown-address-space",
                            e.to_string(),
                        ));
                        continue;
                    }
                };
                bases.push(PeripheralBase {
                    peripheral: peripheral.name.clone(),
                    instance: group_ref.instance_name.clone(),
                    group: group_ref.module_name.clone(),
                    address: space.start.saturating_add(group_ref.offset),
                });
            }
        }
    }

    bases.sort_by_key(|b| b.address);
    (bases, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmap_core::{AddressSpace, PeripheralGroup, PeripheralInstance, RegisterGroupRef};

    fn instance(name: &str, space: &str, offset: u64) -> PeripheralInstance {
        PeripheralInstance {
            name: name.into(),
            register_groups: vec![RegisterGroupRef {
                instance_name: name.into(),
                module_name: "SERCOM".into(),
                address_space: space.into(),
                offset,
            }],
            parameters: Vec::new(),
        }
    }

    #[test]
    fn bases_add_space_start_and_skip_special_kinds() {
        let mut dev = DeviceDescription::new("ATSAMD21G18A");
        dev.address_spaces.push(AddressSpace::new("base", 0x4000_0000, 0x1000_0000));
        dev.peripherals.push(
            PeripheralGroup::new("SERCOM", "U2201")
                .with_instance(instance("SERCOM1", "base", 0x200_0800))
                .with_instance(instance("SERCOM0", "base", 0x200_0400)),
        );
        dev.peripherals
            .push(PeripheralGroup::new("FUSES", "U2401").with_instance(instance("FUSES", "base", 0)));
        dev.peripherals
            .push(PeripheralGroup::new("NVIC", "").with_instance(instance("NVIC", "base", 0)));
        let dev = dev.normalized();

        let (bases, diags) = peripheral_bases(&dev);
        assert!(diags.is_empty());
        let got: Vec<(&str, u64)> = bases.iter().map(|b| (b.instance.as_str(), b.address)).collect();
        assert_eq!(got, vec![("SERCOM0", 0x4200_0400), ("SERCOM1", 0x4200_0800)]);
    }

    #[test]
    fn unknown_space_is_a_warning() {
        let mut dev = DeviceDescription::new("X");
        dev.peripherals
            .push(PeripheralGroup::new("ADC", "U2500").with_instance(instance("ADC0", "io", 0)));
        let (bases, diags) = peripheral_bases(&dev);
        assert!(bases.is_empty());
        assert_eq!(diags[0].kind, "unknown-address-space");
        assert_eq!(diags[0].context, "ADC/ADC0");
    }
}
