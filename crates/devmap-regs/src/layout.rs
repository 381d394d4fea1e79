//! Byte-level layout of register groups.
//!
//! Each group is walked once per declared mode (or once when it declares
//! none). The walk keeps a cursor: a member past the cursor gets a padding
//! gap before it, a member at the cursor is placed directly, and a member
//! behind the cursor is either a read/write alias of the previous slot or an
//! overlap error. Groups with several modes become a union of equally sized
//! variants.

use std::collections::HashMap;

use devmap_core::{Diagnostic, PeripheralGroup, Register, RegisterGroup, RegisterMember};
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::field::{derive_fields, FieldLayout};
use crate::graph::GroupGraph;

/// Access width of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegisterWidth {
    U8,
    U16,
    U32,
    U64,
}

impl RegisterWidth {
    pub fn from_size(size: u64) -> Option<Self> {
        match size {
            1 => Some(RegisterWidth::U8),
            2 => Some(RegisterWidth::U16),
            4 => Some(RegisterWidth::U32),
            8 => Some(RegisterWidth::U64),
            _ => None,
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            RegisterWidth::U8 => 1,
            RegisterWidth::U16 => 2,
            RegisterWidth::U32 => 4,
            RegisterWidth::U64 => 8,
        }
    }

    /// The C99 fixed-width type of this width.
    pub fn c_type(self) -> &'static str {
        match self {
            RegisterWidth::U8 => "uint8_t",
            RegisterWidth::U16 => "uint16_t",
            RegisterWidth::U32 => "uint32_t",
            RegisterWidth::U64 => "uint64_t",
        }
    }
}

/// What occupies a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SlotKind {
    Register {
        width: RegisterWidth,
        reset_value: u64,
        fields: Vec<FieldLayout>,
    },
    /// An embedded register group, already resolved through wrappers.
    Group { group: String },
}

/// One placed member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemberSlot {
    pub name: String,
    pub caption: String,
    pub offset: u64,
    /// Gap between the previous slot's end and `offset`.
    pub padding_before: u64,
    /// Size of one element.
    pub element_size: u64,
    /// Array length; 0 for a scalar.
    pub count: u64,
    pub kind: SlotKind,
    /// Other members placed at the same offset with the same footprint.
    pub aliases: Vec<String>,
}

impl MemberSlot {
    /// Bytes covered by this slot.
    pub fn footprint(&self) -> u64 {
        self.element_size.saturating_mul(self.count.max(1))
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.footprint())
    }
}

/// The layout of a group under one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LayoutVariant {
    pub mode: Option<String>,
    pub members: Vec<MemberSlot>,
    pub trailing_padding: u64,
    pub size: u64,
}

/// The layout of one register group, with one variant per mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegisterLayout {
    pub group: String,
    pub caption: String,
    pub size: u64,
    pub variants: Vec<LayoutVariant>,
}

impl RegisterLayout {
    /// Whether the group is emitted as a union of mode variants.
    pub fn is_union(&self) -> bool {
        self.variants.len() > 1
    }

    pub fn variant(&self, mode: Option<&str>) -> Option<&LayoutVariant> {
        self.variants.iter().find(|v| v.mode.as_deref() == mode)
    }
}

/// Sizes of groups laid out so far, used for subgroups without an element size.
type SizeCache = HashMap<String, u64>;

/// Lay out one register group.
pub fn build_layout(group: &RegisterGroup, graph: &GroupGraph<'_>) -> Result<RegisterLayout, Vec<LayoutError>> {
    build_with_cache(group, graph, &mut SizeCache::new())
}

fn build_with_cache(
    group: &RegisterGroup,
    graph: &GroupGraph<'_>,
    sizes: &mut SizeCache,
) -> Result<RegisterLayout, Vec<LayoutError>> {
    check_member_modes(group)?;

    let modes: Vec<Option<&str>> = if group.modes.is_empty() {
        vec![None]
    } else {
        group.modes.iter().map(|m| Some(m.as_str())).collect()
    };

    let mut variants = Vec::new();
    let mut errors = Vec::new();
    for mode in modes {
        match walk(group, mode, graph, sizes) {
            Ok(v) => variants.push(v),
            Err(mut e) => errors.append(&mut e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    // An unsized group takes the size of its largest variant.
    let size = if group.size == 0 {
        variants.iter().map(|v| v.size).max().unwrap_or(0)
    } else {
        group.size
    };
    for v in &mut variants {
        v.trailing_padding += size - v.size;
        v.size = size;
    }

    sizes.insert(group.name.clone(), size);
    log::debug!(
        "laid out {} ({} bytes, {} variant(s))",
        group.name,
        size,
        variants.len()
    );
    Ok(RegisterLayout {
        group: group.name.clone(),
        caption: group.caption.clone(),
        size,
        variants,
    })
}

fn check_member_modes(group: &RegisterGroup) -> Result<(), Vec<LayoutError>> {
    let errors: Vec<LayoutError> = group
        .members
        .iter()
        .filter_map(|m| {
            let mode = m.mode()?;
            (!group.has_mode(mode)).then(|| LayoutError::UnknownModeReference {
                group: group.name.clone(),
                member: m.name().to_string(),
                mode: mode.to_string(),
            })
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn walk(
    group: &RegisterGroup,
    mode: Option<&str>,
    graph: &GroupGraph<'_>,
    sizes: &mut SizeCache,
) -> Result<LayoutVariant, Vec<LayoutError>> {
    let mut slots: Vec<MemberSlot> = Vec::new();
    let mut errors = Vec::new();
    let mut cursor = 0u64;

    for member in group.members.iter().filter(|m| m.applies_to(mode)) {
        let placed = match member {
            RegisterMember::Register(r) => register_slot(r, group, mode),
            RegisterMember::Subgroup(s) => {
                let Some(target) = graph.resolve(&s.group) else {
                    errors.push(LayoutError::UnknownGroupReference {
                        group: group.name.clone(),
                        member: s.name.clone(),
                        target: s.group.clone(),
                    });
                    continue;
                };
                let element_size = if s.size > 0 {
                    s.size
                } else {
                    match group_size(target, graph, sizes) {
                        Ok(size) => size,
                        Err(mut e) => {
                            errors.append(&mut e);
                            continue;
                        }
                    }
                };
                Ok((element_size, SlotKind::Group {
                    group: target.name.clone(),
                }))
            }
        };
        let (element_size, kind) = match placed {
            Ok(p) => p,
            Err(mut e) => {
                errors.append(&mut e);
                continue;
            }
        };

        let offset = member.offset();
        let slot = MemberSlot {
            name: member.name().to_string(),
            caption: match member {
                RegisterMember::Register(r) => r.caption.clone(),
                RegisterMember::Subgroup(_) => String::new(),
            },
            offset,
            padding_before: offset.saturating_sub(cursor),
            element_size,
            count: member.count(),
            kind,
            aliases: Vec::new(),
        };

        if offset < cursor {
            match slots.last_mut() {
                Some(last) if last.offset == offset && last.footprint() == slot.footprint() => {
                    log::debug!("{}: {} aliases {}", group.name, slot.name, last.name);
                    last.aliases.push(slot.name);
                }
                _ => errors.push(LayoutError::MemberOverlap {
                    group: group.name.clone(),
                    member: slot.name,
                    offset,
                    cursor,
                }),
            }
            continue;
        }

        cursor = slot.end();
        slots.push(slot);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let trailing_padding = if group.size == 0 || group.size >= cursor {
        group.size.saturating_sub(cursor)
    } else {
        return Err(vec![LayoutError::LayoutOverflow {
            group: group.name.clone(),
            mode: mode.map(str::to_string),
            declared: group.size,
            required: cursor,
        }]);
    };

    Ok(LayoutVariant {
        mode: mode.map(str::to_string),
        members: slots,
        trailing_padding,
        size: cursor + trailing_padding,
    })
}

fn register_slot(
    register: &Register,
    group: &RegisterGroup,
    mode: Option<&str>,
) -> Result<(u64, SlotKind), Vec<LayoutError>> {
    let Some(width) = RegisterWidth::from_size(register.size) else {
        return Err(vec![LayoutError::InvalidRegisterSize {
            register: register.name.clone(),
            size: register.size,
        }]);
    };
    let fields = derive_fields(register, group)?
        .into_iter()
        .filter(|f| match (&f.mode, mode) {
            (None, _) => true,
            (Some(own), Some(current)) => own == current,
            (Some(_), None) => false,
        })
        .collect();
    Ok((width.bytes(), SlotKind::Register {
        width,
        reset_value: register.reset_value,
        fields,
    }))
}

/// Size of an embedded group: declared, cached, or computed on demand.
fn group_size(target: &RegisterGroup, graph: &GroupGraph<'_>, sizes: &mut SizeCache) -> Result<u64, Vec<LayoutError>> {
    if target.size > 0 {
        return Ok(target.size);
    }
    if let Some(size) = sizes.get(&target.name) {
        return Ok(*size);
    }
    build_with_cache(target, graph, sizes).map(|l| l.size)
}

/// All layouts of one peripheral plus the problems found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralLayouts {
    pub peripheral: String,
    /// Empty when any group failed.
    pub layouts: Vec<RegisterLayout>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PeripheralLayouts {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn layout(&self, group: &str) -> Option<&RegisterLayout> {
        self.layouts.iter().find(|l| l.group == group)
    }
}

/// Lay out every non-wrapper register group of a peripheral.
///
/// Any error drops all layouts of the peripheral; the errors are returned as
/// diagnostics with `<peripheral>/<group>` context.
pub fn build_peripheral(peripheral: &PeripheralGroup) -> PeripheralLayouts {
    let fail = |errors: Vec<(String, LayoutError)>| {
        let diagnostics = errors
            .into_iter()
            .map(|(context, e)| {
                log::warn!("{}/{context}: {e}", peripheral.name);
                Diagnostic::error(context, e.kind(), e.to_string()).within(&peripheral.name)
            })
            .collect();
        PeripheralLayouts {
            peripheral: peripheral.name.clone(),
            layouts: Vec::new(),
            diagnostics,
        }
    };

    let graph = match GroupGraph::build(&peripheral.register_groups) {
        Ok(g) => g,
        Err(errors) => return fail(errors.into_iter().map(|e| (String::new(), e)).collect()),
    };

    let mut sizes = SizeCache::new();
    let mut layouts = Vec::new();
    let mut errors = Vec::new();
    // Wrappers get no layout of their own but their member modes still count.
    for group in peripheral.register_groups.iter().filter(|g| graph.is_wrapper(&g.name)) {
        if let Err(e) = check_member_modes(group) {
            errors.extend(e.into_iter().map(|e| (group.name.clone(), e)));
        }
    }
    for group in graph.layout_order() {
        match build_with_cache(group, &graph, &mut sizes) {
            Ok(layout) => layouts.push(layout),
            Err(e) => errors.extend(e.into_iter().map(|e| (group.name.clone(), e))),
        }
    }
    if !errors.is_empty() {
        return fail(errors);
    }

    // Keep source order for consumers.
    layouts.sort_by_key(|l| {
        peripheral
            .register_groups
            .iter()
            .position(|g| g.name == l.group)
            .unwrap_or(usize::MAX)
    });
    PeripheralLayouts {
        peripheral: peripheral.name.clone(),
        layouts,
        diagnostics: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmap_core::{BitField, SubgroupRef};

    fn layout_of(group: &RegisterGroup) -> Result<RegisterLayout, Vec<LayoutError>> {
        let groups = std::slice::from_ref(group);
        let graph = GroupGraph::build(groups).unwrap();
        build_layout(group, &graph)
    }

    fn assert_monotone(layout: &RegisterLayout) {
        for v in &layout.variants {
            let mut cursor = 0;
            for slot in &v.members {
                assert!(slot.offset >= cursor, "{} goes backwards", slot.name);
                assert_eq!(slot.offset - cursor, slot.padding_before);
                cursor = slot.end();
            }
            assert!(cursor <= v.size);
            assert_eq!(cursor + v.trailing_padding, v.size);
        }
    }

    #[test]
    fn padding_and_trailing_padding() {
        let group = RegisterGroup::new("WDT", 0x10)
            .with_member(Register::new("CTRLA", 0x0, 1))
            .with_member(Register::new("CONFIG", 0x1, 1))
            .with_member(Register::new("INTFLAG", 0x6, 1))
            .with_member(Register::new("SYNCBUSY", 0x8, 4));
        let layout = layout_of(&group).unwrap();
        assert!(!layout.is_union());
        let v = &layout.variants[0];
        let pads: Vec<u64> = v.members.iter().map(|m| m.padding_before).collect();
        assert_eq!(pads, vec![0, 0, 4, 1]);
        assert_eq!(v.trailing_padding, 4);
        assert_eq!(layout.size, 0x10);
        assert_monotone(&layout);
    }

    #[test]
    fn mode_variants_form_a_union() {
        let group = RegisterGroup::new("SERCOM", 8)
            .with_modes(["SPI", "I2C"])
            .with_member(Register::new("BAUD", 4, 4).with_mode("SPI"))
            .with_member(Register::new("ADDR", 4, 4).with_mode("I2C"));
        let layout = layout_of(&group).unwrap();
        assert!(layout.is_union());
        for mode in ["SPI", "I2C"] {
            let v = layout.variant(Some(mode)).unwrap();
            assert_eq!(v.members.len(), 1);
            assert_eq!(v.members[0].padding_before, 4);
            assert_eq!(v.members[0].element_size, 4);
            assert_eq!(v.size, 8);
        }
        assert_monotone(&layout);
    }

    #[test]
    fn unconditional_members_appear_in_every_variant() {
        let group = RegisterGroup::new("SERCOM", 0x10)
            .with_modes(["SPI", "USART"])
            .with_member(Register::new("CTRLA", 0, 4))
            .with_member(Register::new("BAUD", 0xC, 2).with_mode("USART"))
            .with_member(Register::new("BAUD", 0xC, 1).with_mode("SPI"));
        let layout = layout_of(&group).unwrap();
        assert_eq!(layout.variant(Some("USART")).unwrap().members[0].name, "CTRLA");
        assert_eq!(layout.variant(Some("SPI")).unwrap().members[0].name, "CTRLA");
        assert_eq!(layout.variant(Some("SPI")).unwrap().trailing_padding, 3);
    }

    #[test]
    fn arrays_stride_by_element_size() {
        let group = RegisterGroup::new("EVSYS", 0x20)
            .with_member(Register::new("CHANNEL", 0x0, 4).with_count(4))
            .with_member(Register::new("USER", 0x10, 1).with_count(3));
        let layout = layout_of(&group).unwrap();
        let v = &layout.variants[0];
        assert_eq!(v.members[0].footprint(), 16);
        assert_eq!(v.members[1].end(), 0x13);
        assert_eq!(v.trailing_padding, 0x20 - 0x13);
    }

    #[test]
    fn overflow_is_reported() {
        let group = RegisterGroup::new("TINY", 4)
            .with_member(Register::new("A", 0, 4))
            .with_member(Register::new("B", 4, 4));
        let errors = layout_of(&group).unwrap_err();
        assert_eq!(
            errors,
            vec![LayoutError::LayoutOverflow {
                group: "TINY".into(),
                mode: None,
                declared: 4,
                required: 8,
            }]
        );
    }

    #[test]
    fn unsized_group_takes_cursor() {
        let group = RegisterGroup::new("FREE", 0)
            .with_modes(["A", "B"])
            .with_member(Register::new("X", 0, 4).with_mode("A"))
            .with_member(Register::new("Y", 0, 8).with_mode("B"));
        let layout = layout_of(&group).unwrap();
        assert_eq!(layout.size, 8);
        assert_eq!(layout.variant(Some("A")).unwrap().trailing_padding, 4);
        assert_eq!(layout.variant(Some("B")).unwrap().size, 8);
    }

    #[test]
    fn same_slot_members_fold_into_aliases() {
        let group = RegisterGroup::new("TC", 0x10)
            .with_member(Register::new("DATA_IN", 0x4, 4))
            .with_member(Register::new("DATA_OUT", 0x4, 4))
            .with_member(Register::new("STATUS", 0x8, 1));
        let layout = layout_of(&group).unwrap();
        let v = &layout.variants[0];
        assert_eq!(v.members.len(), 2);
        assert_eq!(v.members[0].aliases, vec!["DATA_OUT"]);
    }

    #[test]
    fn overlapping_members_are_errors() {
        let group = RegisterGroup::new("BAD", 0x10)
            .with_member(Register::new("WIDE", 0x0, 4))
            .with_member(Register::new("NARROW", 0x2, 2));
        let errors = layout_of(&group).unwrap_err();
        assert!(matches!(
            &errors[0],
            LayoutError::MemberOverlap { member, cursor: 4, .. } if member == "NARROW"
        ));
    }

    #[test]
    fn invalid_register_size() {
        let group = RegisterGroup::new("ODD", 0x10).with_member(Register::new("R", 0, 3));
        let errors = layout_of(&group).unwrap_err();
        assert!(matches!(errors[0], LayoutError::InvalidRegisterSize { size: 3, .. }));
    }

    #[test]
    fn unknown_member_mode() {
        let group = RegisterGroup::new("SERCOM", 8)
            .with_modes(["SPI"])
            .with_member(Register::new("ADDR", 4, 4).with_mode("I2C"));
        let errors = layout_of(&group).unwrap_err();
        assert_eq!(errors[0].kind(), "unknown-mode-reference");

        let modeless = RegisterGroup::new("PLAIN", 8).with_member(Register::new("R", 0, 4).with_mode("SPI"));
        assert!(layout_of(&modeless).is_err());
    }

    #[test]
    fn fields_follow_variant_mode() {
        let group = RegisterGroup::new("TCC", 0x8)
            .with_modes(["DITH4", "DITH5"])
            .with_member(
                Register::new("PER", 0x4, 4)
                    .with_field(BitField::new("DITHER", 0xF).with_modes(["DITH4"]))
                    .with_field(BitField::new("DITHER", 0x1F).with_modes(["DITH5"]))
                    .with_field(BitField::new("PER", 0xFFFF_FFE0)),
            );
        let layout = layout_of(&group).unwrap();
        let fields_in = |mode: &str| match &layout.variant(Some(mode)).unwrap().members[0].kind {
            SlotKind::Register { fields, .. } => fields.iter().map(|f| f.mask).collect::<Vec<_>>(),
            SlotKind::Group { .. } => panic!("expected a register"),
        };
        assert_eq!(fields_in("DITH4"), vec![0xF, 0xFFFF_FFE0]);
        assert_eq!(fields_in("DITH5"), vec![0x1F, 0xFFFF_FFE0]);
    }

    #[test]
    fn peripheral_layouts_in_source_order() {
        let peripheral = PeripheralGroup::new("PORT", "U2210")
            .with_group(
                RegisterGroup::new("PORT", 0).with_member(SubgroupRef::new("GROUP", "PORT_GROUP", 0, 0).with_count(2)),
            )
            .with_group(
                RegisterGroup::new("PORT_GROUP", 0x80)
                    .with_member(Register::new("DIR", 0, 4))
                    .with_member(Register::new("PINCFG", 0x40, 1).with_count(32)),
            );
        let out = build_peripheral(&peripheral);
        assert!(out.is_ok());
        let names: Vec<&str> = out.layouts.iter().map(|l| l.group.as_str()).collect();
        assert_eq!(names, vec!["PORT", "PORT_GROUP"]);

        let port = out.layout("PORT").unwrap();
        assert_eq!(port.size, 0x100);
        assert_eq!(port.variants[0].members[0].element_size, 0x80);
        assert_eq!(
            port.variants[0].members[0].kind,
            SlotKind::Group {
                group: "PORT_GROUP".into()
            }
        );
    }

    #[test]
    fn wrapper_groups_get_no_layout() {
        let peripheral = PeripheralGroup::new("GMAC", "U2046")
            .with_group(
                RegisterGroup::new("GMAC", 0x100)
                    .with_member(Register::new("NCR", 0, 4))
                    .with_member(SubgroupRef::new("SA", "GMAC_SA_WRAP", 0x88, 8).with_count(4)),
            )
            .with_group(RegisterGroup::new("GMAC_SA_WRAP", 8).with_member(SubgroupRef::new("SA", "GMAC_SA", 0, 8)))
            .with_group(
                RegisterGroup::new("GMAC_SA", 8)
                    .with_member(Register::new("SAB", 0, 4))
                    .with_member(Register::new("SAT", 4, 4)),
            );
        let out = build_peripheral(&peripheral);
        assert!(out.layout("GMAC_SA_WRAP").is_none());
        let gmac = out.layout("GMAC").unwrap();
        assert_eq!(
            gmac.variants[0].members[1].kind,
            SlotKind::Group { group: "GMAC_SA".into() }
        );
    }

    #[test]
    fn wrapper_member_modes_are_checked() {
        let peripheral = PeripheralGroup::new("GMAC", "U2046")
            .with_group(
                RegisterGroup::new("GMAC", 0x100)
                    .with_member(SubgroupRef::new("SA", "GMAC_SA_WRAP", 0x88, 8)),
            )
            .with_group(
                RegisterGroup::new("GMAC_SA_WRAP", 8)
                    .with_member(SubgroupRef::new("SA", "GMAC_SA", 0, 8).with_mode("MII")),
            )
            .with_group(RegisterGroup::new("GMAC_SA", 8).with_member(Register::new("SAB", 0, 4)));
        let out = build_peripheral(&peripheral);
        assert!(!out.is_ok());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].context, "GMAC/GMAC_SA_WRAP");
        assert_eq!(out.diagnostics[0].kind, "unknown-mode-reference");
    }

    #[test]
    fn field_wider_than_register_fails_the_peripheral() {
        let peripheral = PeripheralGroup::new("RTC", "U2250").with_group(
            RegisterGroup::new("RTC", 4)
                .with_member(Register::new("COUNT", 0, 4).with_field(BitField::new("COUNT", 0x1_FFFF_FFFF))),
        );
        let out = build_peripheral(&peripheral);
        assert!(out.layouts.is_empty());
        assert_eq!(out.diagnostics[0].kind, "field-out-of-range");
        assert_eq!(out.diagnostics[0].context, "RTC/RTC");
    }

    #[test]
    fn one_bad_group_fails_the_peripheral() {
        let peripheral = PeripheralGroup::new("ADC", "U2500")
            .with_group(RegisterGroup::new("ADC", 4).with_member(Register::new("CTRL", 0, 8)))
            .with_group(RegisterGroup::new("ADC_OK", 4).with_member(Register::new("CTRL", 0, 4)));
        let out = build_peripheral(&peripheral);
        assert!(!out.is_ok());
        assert!(out.layouts.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].context, "ADC/ADC");
        assert_eq!(out.diagnostics[0].kind, "layout-overflow");
    }
}
