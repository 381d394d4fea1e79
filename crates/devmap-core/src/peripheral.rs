//! Peripheral groups, register groups, registers, and bitfields.

use serde::{Deserialize, Serialize};

use crate::device::Parameter;

/// How downstream stages treat a peripheral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeripheralKind {
    /// Ordinary memory-mapped peripheral.
    #[default]
    Normal,
    /// Device configuration fuses that must be placed at fixed flash addresses.
    Fuses,
    /// Core peripheral (SysTick, NVIC, ...) already described by the CPU headers.
    Core,
}

impl PeripheralKind {
    /// Classify a peripheral from its name and module id.
    ///
    /// Fuses are the peripheral literally named "fuses". Core peripherals
    /// carry no id or an id mentioning `system_ip`.
    pub fn classify(name: &str, id: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("fuses") {
            PeripheralKind::Fuses
        } else if id.trim().is_empty() || id.to_ascii_lowercase().contains("system_ip") {
            PeripheralKind::Core
        } else {
            PeripheralKind::Normal
        }
    }
}

/// A single bitfield inside a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BitField {
    pub name: String,
    #[serde(default)]
    pub caption: String,
    pub mask: u64,
    /// Modes this field applies to; empty means always.
    #[serde(default)]
    pub modes: Vec<String>,
    /// Named values the field can take.
    #[serde(default)]
    pub values: Vec<Parameter>,
}

impl BitField {
    pub fn new(name: impl Into<String>, mask: u64) -> Self {
        Self {
            name: name.into(),
            caption: String::new(),
            mask,
            modes: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modes = modes.into_iter().map(Into::into).collect();
        self
    }
}

/// A hardware register inside a register group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Register {
    pub name: String,
    /// Byte offset from the start of the group.
    pub offset: u64,
    /// Size in bytes: 1, 2, 4 or 8.
    pub size: u64,
    /// Array length; 0 means a single register.
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub reset_value: u64,
    #[serde(default)]
    pub fields: Vec<BitField>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub caption: String,
}

impl Register {
    pub fn new(name: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            count: 0,
            reset_value: 0,
            fields: Vec::new(),
            mode: None,
            caption: String::new(),
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_field(mut self, field: BitField) -> Self {
        self.fields.push(field);
        self
    }
}

/// A member that places another register group (or an array of them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubgroupRef {
    pub name: String,
    /// Name of the referenced register group within the same peripheral.
    pub group: String,
    pub offset: u64,
    /// Size of one element; 0 means "use the target's declared size".
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub mode: Option<String>,
}

impl SubgroupRef {
    pub fn new(name: impl Into<String>, group: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            offset,
            size,
            count: 0,
            mode: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }
}

/// A member of a register group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RegisterMember {
    Register(Register),
    Subgroup(SubgroupRef),
}

impl RegisterMember {
    pub fn name(&self) -> &str {
        match self {
            RegisterMember::Register(r) => &r.name,
            RegisterMember::Subgroup(s) => &s.name,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            RegisterMember::Register(r) => r.offset,
            RegisterMember::Subgroup(s) => s.offset,
        }
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> u64 {
        match self {
            RegisterMember::Register(r) => r.size,
            RegisterMember::Subgroup(s) => s.size,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            RegisterMember::Register(r) => r.count,
            RegisterMember::Subgroup(s) => s.count,
        }
    }

    pub fn mode(&self) -> Option<&str> {
        match self {
            RegisterMember::Register(r) => r.mode.as_deref(),
            RegisterMember::Subgroup(s) => s.mode.as_deref(),
        }
        .filter(|m| !m.is_empty())
    }

    /// Whether this member is laid out in the given mode variant.
    pub fn applies_to(&self, mode: Option<&str>) -> bool {
        match (self.mode(), mode) {
            (None, _) => true,
            (Some(own), Some(current)) => own == current,
            (Some(_), None) => false,
        }
    }
}

impl From<Register> for RegisterMember {
    fn from(r: Register) -> Self {
        RegisterMember::Register(r)
    }
}

impl From<SubgroupRef> for RegisterMember {
    fn from(s: SubgroupRef) -> Self {
        RegisterMember::Subgroup(s)
    }
}

/// A named set of registers belonging to one peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegisterGroup {
    pub name: String,
    #[serde(default)]
    pub caption: String,
    /// Declared total size in bytes; 0 when the source gives none.
    #[serde(default)]
    pub size: u64,
    /// Mutually exclusive hardware modes; empty when the layout never varies.
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub members: Vec<RegisterMember>,
}

impl RegisterGroup {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            caption: String::new(),
            size,
            modes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn with_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modes = modes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_member(mut self, member: impl Into<RegisterMember>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn has_mode(&self, mode: &str) -> bool {
        self.modes.iter().any(|m| m == mode)
    }

    /// Registers of this group, skipping subgroup references.
    pub fn registers(&self) -> impl Iterator<Item = &Register> {
        self.members.iter().filter_map(|m| match m {
            RegisterMember::Register(r) => Some(r),
            RegisterMember::Subgroup(_) => None,
        })
    }
}

/// Binds one register group of a peripheral instance to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegisterGroupRef {
    /// Name used for this instance (e.g., "SERCOM0").
    pub instance_name: String,
    /// Name of the register group in the peripheral module.
    pub module_name: String,
    pub address_space: String,
    /// Offset within the address space.
    pub offset: u64,
}

/// One instance of a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralInstance {
    pub name: String,
    #[serde(default)]
    pub register_groups: Vec<RegisterGroupRef>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// A group of peripherals of the same type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralGroup {
    /// Name used in code, e.g. "ADC" or "SERCOM".
    pub name: String,
    /// Module id distinguishing variants of the same peripheral.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub instances: Vec<PeripheralInstance>,
    #[serde(default)]
    pub register_groups: Vec<RegisterGroup>,
    /// Set by [`crate::DeviceDescription::normalize`].
    #[serde(default)]
    pub kind: PeripheralKind,
}

impl PeripheralGroup {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        let name = name.into();
        let id = id.into();
        let kind = PeripheralKind::classify(&name, &id);
        Self {
            name,
            id,
            version: String::new(),
            instances: Vec::new(),
            register_groups: Vec::new(),
            kind,
        }
    }

    pub fn with_group(mut self, group: RegisterGroup) -> Self {
        self.register_groups.push(group);
        self
    }

    pub fn with_instance(mut self, instance: PeripheralInstance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn register_group(&self, name: &str) -> Option<&RegisterGroup> {
        self.register_groups.iter().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_special_peripherals() {
        assert_eq!(PeripheralKind::classify("FUSES", "U2402"), PeripheralKind::Fuses);
        assert_eq!(PeripheralKind::classify("fuses", ""), PeripheralKind::Fuses);
        assert_eq!(PeripheralKind::classify("SysTick", ""), PeripheralKind::Core);
        assert_eq!(
            PeripheralKind::classify("NVIC", "SYSTEM_IP_NVIC"),
            PeripheralKind::Core
        );
        assert_eq!(PeripheralKind::classify("SERCOM", "U2201"), PeripheralKind::Normal);
    }

    #[test]
    fn member_mode_inclusion() {
        let plain: RegisterMember = Register::new("CTRLA", 0, 4).into();
        let spi: RegisterMember = Register::new("BAUD", 0xC, 1).with_mode("SPI").into();

        assert!(plain.applies_to(None));
        assert!(plain.applies_to(Some("SPI")));
        assert!(spi.applies_to(Some("SPI")));
        assert!(!spi.applies_to(Some("I2CM")));
        assert!(!spi.applies_to(None));
    }

    #[test]
    fn empty_mode_string_is_no_mode() {
        let mut reg = Register::new("CTRLA", 0, 4);
        reg.mode = Some(String::new());
        let member: RegisterMember = reg.into();
        assert_eq!(member.mode(), None);
    }

    #[test]
    fn member_serde_is_tagged() {
        let json = r#"[
            { "type": "register", "name": "CTRLA", "offset": 0, "size": 4 },
            { "type": "subgroup", "name": "GROUP", "group": "PORT_GROUP", "offset": 0, "size": 128, "count": 4 }
        ]"#;
        let members: Vec<RegisterMember> = serde_json::from_str(json).unwrap();
        assert!(matches!(members[0], RegisterMember::Register(_)));
        assert_eq!(members[1].count(), 4);
        assert_eq!(members[1].size(), 128);
    }

    #[test]
    fn new_peripheral_is_classified() {
        let p = PeripheralGroup::new("FUSES", "");
        assert_eq!(p.kind, PeripheralKind::Fuses);
    }
}
