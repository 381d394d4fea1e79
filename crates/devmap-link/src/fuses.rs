//! Fixed-address regions for device configuration fuses.
//!
//! Every fuse word is individually programmable, so each register (and each
//! element of a register array) gets its own MEMORY region and output
//! section at its exact hardware address.

use devmap_core::{Diagnostic, PeripheralGroup, RegisterMember};
use devmap_memmap::ResolvedMemoryMap;
use serde::{Deserialize, Serialize};

/// One fuse word placed at a fixed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FuseRegion {
    /// Lower-case region name, `<instance>_<register>[<index>]`.
    pub name: String,
    pub start: u64,
    pub size: u64,
    /// Output section name, `.<name>`.
    pub section: String,
}

impl FuseRegion {
    fn new(name: String, start: u64, size: u64) -> Self {
        let section = format!(".{name}");
        Self {
            name,
            start,
            size,
            section,
        }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start < end && start < self.end()
    }
}

/// Plan one region per fuse register element.
///
/// `protected` holds the `[start, end)` ranges code and data are linked into;
/// a fuse landing there, or on an earlier fuse, is reported and dropped.
pub fn plan_fuses(
    map: &ResolvedMemoryMap,
    fuses: &PeripheralGroup,
    protected: &[(&str, u64, u64)],
) -> (Vec<FuseRegion>, Vec<Diagnostic>) {
    let mut regions: Vec<FuseRegion> = Vec::new();
    let mut diagnostics = Vec::new();

    for instance in &fuses.instances {
        for group_ref in &instance.register_groups {
            let Some(space) = map.find_space(&group_ref.address_space) else {
                diagnostics.push(Diagnostic::warning(
                    &instance.name,
                    "unknown-address-space",
                    format!(
                        "register group {} is bound to unknown address space '{}'",
                        group_ref.module_name, group_ref.address_space
                    ),
                ));
                continue;
            };
            let Some(group) = fuses.register_group(&group_ref.module_name) else {
                diagnostics.push(Diagnostic::warning(
                    &instance.name,
                    "unknown-group",
                    format!("fuse register group '{}' not found", group_ref.module_name),
                ));
                continue;
            };

            let base = space.start.saturating_add(group_ref.offset);
            let prefix = group_ref.instance_name.to_ascii_lowercase();
            for member in &group.members {
                let RegisterMember::Register(reg) = member else {
                    log::debug!("{}: skipping fuse subgroup {}", fuses.name, member.name());
                    continue;
                };
                let name = format!("{prefix}_{}", reg.name.to_ascii_lowercase());
                let start = base.saturating_add(reg.offset);

                let candidates: Vec<FuseRegion> = if reg.count > 0 {
                    (0..reg.count)
                        .map(|i| {
                            FuseRegion::new(
                                format!("{name}{i}"),
                                start.saturating_add(reg.size.saturating_mul(i)),
                                reg.size,
                            )
                        })
                        .collect()
                } else {
                    vec![FuseRegion::new(name, start, reg.size)]
                };

                for fuse in candidates {
                    if let Some(clash) = clash_with(&fuse, &regions, protected) {
                        let message = format!(
                            "fuse {} at 0x{:08X} overlaps {clash}; dropped",
                            fuse.name, fuse.start
                        );
                        log::warn!("{}: {message}", fuses.name);
                        diagnostics.push(Diagnostic::warning(
                            &fuses.name,
                            "overlap-ambiguity",
                            message,
                        ));
                        continue;
                    }
                    regions.push(fuse);
                }
            }
        }
    }

    (regions, diagnostics)
}

fn clash_with(fuse: &FuseRegion, placed: &[FuseRegion], protected: &[(&str, u64, u64)]) -> Option<String> {
    if let Some((name, _, _)) = protected.iter().find(|(_, s, e)| fuse.overlaps(*s, *e)) {
        return Some(format!("region {name}"));
    }
    placed
        .iter()
        .find(|p| fuse.overlaps(p.start, p.end()))
        .map(|p| format!("fuse {}", p.name))
}
