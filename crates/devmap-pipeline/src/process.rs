//! The per-device pipeline: resolve, lay out, plan.

use devmap_core::{DeviceDescription, Diagnostic, PeripheralKind};
use devmap_link::{
    peripheral_bases, plan_vector_table, plan_with_layout, LinkerPlan, PeripheralBase, VectorTable,
};
use devmap_memmap::{resolve, Resolution, ResolvedMemoryMap};
use devmap_regs::build_peripheral;
use serde::{Deserialize, Serialize};

use crate::config::{DevmapConfig, DeviceClass};
use crate::error::Result;

/// Every decision derived for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceOutput {
    pub device: String,
    pub class: DeviceClass,
    pub map: ResolvedMemoryMap,
    /// One entry per non-core peripheral, in description order.
    pub layouts: Vec<devmap_regs::PeripheralLayouts>,
    pub plan: LinkerPlan,
    pub vectors: VectorTable,
    pub peripheral_bases: Vec<PeripheralBase>,
    /// All problems, with `<device>/...` context.
    pub diagnostics: Vec<Diagnostic>,
}

impl DeviceOutput {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn layouts_of(&self, peripheral: &str) -> Option<&devmap_regs::PeripheralLayouts> {
        self.layouts.iter().find(|l| l.peripheral == peripheral)
    }
}

/// Run the whole pipeline on one description.
///
/// Only device-fatal conditions (no RAM, reservations overflowing RAM,
/// duplicate address spaces) are errors; everything else ends up in
/// [`DeviceOutput::diagnostics`].
pub fn process_device(device: &DeviceDescription, config: &DevmapConfig) -> Result<DeviceOutput> {
    let device = device.clone().normalized();
    let name = device.name.clone();
    let class = config.class_for(&device.cpu);
    log::info!("{name}: processing as {class:?}");

    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    let resolution = resolve(&name, &device.address_spaces, &config.resolver_config(class))?;
    diagnostics.extend(scoped(resolution.diagnostics, &name));
    let map = resolution.map;

    let mut layouts = Vec::new();
    for peripheral in device.peripherals.iter().filter(|p| p.kind != PeripheralKind::Core) {
        let mut laid_out = build_peripheral(peripheral);
        laid_out.diagnostics = scoped(laid_out.diagnostics, &name).collect();
        diagnostics.extend(laid_out.diagnostics.iter().cloned());
        layouts.push(laid_out);
    }

    let outcome = plan_with_layout(
        &map,
        device.fuses(),
        &config.reservation_config(class),
        class.image_layout(),
    )?;
    diagnostics.extend(scoped(outcome.diagnostics, &name));

    let (vectors, vector_diags) = plan_vector_table(&device.interrupts);
    diagnostics.extend(scoped(vector_diags, &name));

    let (bases, base_diags) = peripheral_bases(&device);
    diagnostics.extend(scoped(base_diags, &name));

    let failed = layouts.iter().filter(|l| !l.is_ok()).count();
    if failed > 0 {
        log::warn!("{name}: {failed} peripheral(s) without register layouts");
    }
    log::info!(
        "{name}: {} regions, {} peripherals laid out, {} diagnostics",
        map.regions().count(),
        layouts.len() - failed,
        diagnostics.len()
    );

    Ok(DeviceOutput {
        device: name,
        class,
        map,
        layouts,
        plan: outcome.plan,
        vectors,
        peripheral_bases: bases,
        diagnostics,
    })
}

/// Only the memory-map stage, with diagnostics scoped to the device.
pub fn resolve_device(device: &DeviceDescription, config: &DevmapConfig) -> Result<Resolution> {
    let device = device.clone().normalized();
    let class = config.class_for(&device.cpu);
    let resolution = resolve(&device.name, &device.address_spaces, &config.resolver_config(class))?;
    Ok(Resolution {
        diagnostics: scoped(resolution.diagnostics, &device.name).collect(),
        map: resolution.map,
    })
}

fn scoped(found: Vec<Diagnostic>, device: &str) -> impl Iterator<Item = Diagnostic> + '_ {
    found.into_iter().map(move |d| d.within(device))
}
