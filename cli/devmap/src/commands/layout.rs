//! `devmap layout`: register-group layouts of one device.

use std::path::Path;

use anyhow::{bail, Context, Result};
use devmap_pipeline::report::LayoutReport;
use devmap_pipeline::{load_device, process_device, DevmapConfig};

use super::{render, OutputFormat};

pub fn run(path: &Path, peripheral: Option<&str>, config: &DevmapConfig, format: OutputFormat) -> Result<()> {
    println!("{}", output(path, peripheral, config, format)?);
    Ok(())
}

/// Layouts of every peripheral, or of one when `peripheral` is given.
pub fn output(
    path: &Path,
    peripheral: Option<&str>,
    config: &DevmapConfig,
    format: OutputFormat,
) -> Result<String> {
    let device = load_device(path).with_context(|| format!("loading {}", path.display()))?;
    let out = process_device(&device, config)?;

    let selected: Vec<_> = match peripheral {
        Some(name) => match out.layouts.iter().find(|l| l.peripheral.eq_ignore_ascii_case(name)) {
            Some(l) => vec![l],
            None => bail!("device {} has no peripheral '{name}'", out.device),
        },
        None => out.layouts.iter().collect(),
    };

    let text = selected
        .iter()
        .map(|l| LayoutReport(l).to_string())
        .collect::<Vec<_>>()
        .join("\n");
    render(&selected, text, format)
}
