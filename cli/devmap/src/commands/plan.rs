//! `devmap plan`: linker plan and vector table of one device.

use std::path::Path;

use anyhow::{Context, Result};
use devmap_pipeline::report::{PlanReport, VectorReport};
use devmap_pipeline::{load_device, process_device, DevmapConfig};

use super::{render, OutputFormat};

pub fn run(path: &Path, config: &DevmapConfig, format: OutputFormat) -> Result<()> {
    println!("{}", output(path, config, format)?);
    Ok(())
}

pub fn output(path: &Path, config: &DevmapConfig, format: OutputFormat) -> Result<String> {
    let device = load_device(path).with_context(|| format!("loading {}", path.display()))?;
    let out = process_device(&device, config)?;

    let mut text = format!("{}\n{}", PlanReport(&out.plan), VectorReport(&out.vectors));
    for d in &out.diagnostics {
        text.push_str(&format!("\n  {d}"));
    }
    let json = serde_json::json!({
        "plan": out.plan,
        "vectors": out.vectors,
        "peripheral-bases": out.peripheral_bases,
        "diagnostics": out.diagnostics,
    });
    render(&json, text, format)
}
