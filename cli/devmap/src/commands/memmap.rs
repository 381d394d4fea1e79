//! `devmap memmap`: resolved memory map of one device.

use std::path::Path;

use anyhow::{Context, Result};
use devmap_pipeline::report::MemoryMapReport;
use devmap_pipeline::{load_device, resolve_device, DevmapConfig};

use super::{render, OutputFormat};

pub fn run(path: &Path, config: &DevmapConfig, format: OutputFormat) -> Result<()> {
    println!("{}", output(path, config, format)?);
    Ok(())
}

pub fn output(path: &Path, config: &DevmapConfig, format: OutputFormat) -> Result<String> {
    let device = load_device(path).with_context(|| format!("loading {}", path.display()))?;
    let resolution = resolve_device(&device, config)?;

    let mut text = MemoryMapReport(&resolution.map).to_string();
    for d in &resolution.diagnostics {
        text.push_str(&format!("\n  {d}"));
    }
    render(&resolution, text, format)
}
